use std::path::Path;

use anyhow::{anyhow, Context, Result};
use blob_store::BlobStorageConfig;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::{catalog::DEFAULT_PAGE_SIZE, index::DEFAULT_INDEX_NAMESPACE};

/// Settings shared by every command.
///
/// Sources, lowest precedence first: built-in defaults, the YAML file passed
/// with `--config`, `SKW_*` environment variables (`__` separates nested
/// keys, e.g. `SKW_BLOB_STORAGE__PATH`), then command line flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkwConfig {
    #[serde(default)]
    pub blob_storage: BlobStorageConfig,
    pub index_namespace: String,
    pub page_size: usize,
    pub structured_logging: bool,
}

impl Default for SkwConfig {
    fn default() -> Self {
        SkwConfig {
            blob_storage: BlobStorageConfig::default(),
            index_namespace: DEFAULT_INDEX_NAMESPACE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            structured_logging: false,
        }
    }
}

impl SkwConfig {
    pub fn load(path: Option<&Path>) -> Result<SkwConfig> {
        let config_str = match path {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?,
            None => String::new(),
        };
        Self::extract(Self::figment(&config_str).merge(Env::prefixed("SKW_").split("__")))
    }

    fn figment(yaml: &str) -> Figment {
        let figment = Figment::from(Serialized::defaults(SkwConfig::default()));
        if yaml.trim().is_empty() {
            return figment;
        }
        figment.merge(Yaml::string(yaml))
    }

    fn extract(figment: Figment) -> Result<SkwConfig> {
        let config: SkwConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the `--bucket` flag on top of the loaded settings.
    pub fn with_bucket(mut self, bucket: Option<String>) -> Self {
        if let Some(bucket) = bucket {
            self.blob_storage.path = Some(bucket);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.index_namespace.is_empty() || self.index_namespace.contains('/') {
            return Err(anyhow!(
                "invalid index namespace: {:?}, it must be a single non-empty path segment",
                self.index_namespace
            ));
        }
        if self.page_size == 0 {
            return Err(anyhow!("page_size must be greater than 0"));
        }
        Ok(())
    }
}
