use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod catalog;
mod config;
mod error;
mod index;
mod paths;
mod storage;
#[cfg(test)]
mod testing;
mod tracing;
mod transfer;

use config::SkwConfig;
use error::StorageError;
use storage::{Storage, StorageOptions};
use tracing::setup_tracing;

#[derive(Parser)]
#[command(name = "skw", version, about = "Sky Warehouse: a key and tag indexed file cache on cloud storage", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        global = true,
        env = "SKW_BUCKET",
        help = "Bucket URL, e.g. gs://my-bucket or s3://my-bucket/base"
    )]
    bucket: Option<String>,

    #[arg(short, long, global = true, help = "Debug logging and full error chains")]
    verbose: bool,

    #[arg(short, long, global = true, value_name = "config file", help = "Path to config file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files to cloud storage and register them under a key and tags
    Upload {
        #[arg(required = true, value_name = "PATHS_OR_GLOB")]
        paths_or_glob: Vec<String>,

        #[arg(short, long)]
        key: String,

        #[arg(short = 't', long = "tag", value_name = "TAG", default_value = "latest")]
        tags: Vec<String>,

        #[arg(short, long, help = "Prefix path in the bucket")]
        prefix: Option<String>,
    },
    /// Download the files registered under a key and tag
    Download {
        #[arg(value_name = "DEST", help = "Download destination local path")]
        path: PathBuf,

        #[arg(short, long)]
        key: String,

        #[arg(short, long)]
        tag: String,
    },
    /// List registered keys
    Keys {
        #[arg(short, long, help = "Key name prefix to filter output")]
        prefix: Option<String>,
    },
    /// List the tags of a key, most recently updated first
    Tags { key: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match SkwConfig::load(cli.config.as_deref()) {
        Ok(config) => config.with_bucket(cli.bucket.clone()),
        Err(err) => {
            eprintln!("Failed to load config. Error: {:?}", err);
            return ExitCode::FAILURE;
        }
    };
    setup_tracing(&config, cli.verbose);

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if cli.verbose {
                eprintln!("{:?}", err);
            } else {
                eprintln!("{:#}", err);
                let user_error = err
                    .downcast_ref::<StorageError>()
                    .is_some_and(StorageError::is_user_error);
                if !user_error {
                    eprintln!("Run again with --verbose for the full error chain.");
                }
            }
            ExitCode::FAILURE
        }
    }
}

async fn connect(config: &SkwConfig) -> Result<Storage> {
    let options = StorageOptions::from_config(config).with_working_dir(std::env::current_dir()?);
    Ok(Storage::connect(&config.blob_storage, options).await?)
}

async fn run(command: Commands, config: &SkwConfig) -> Result<()> {
    match command {
        Commands::Upload {
            paths_or_glob,
            key,
            tags,
            prefix,
        } => {
            let blobs = async {
                connect(config)
                    .await?
                    .upload(&paths_or_glob, &key, &tags, prefix.as_deref())
                    .await
                    .map_err(anyhow::Error::from)
            }
            .await
            .with_context(|| format!("Failed upload {:?}. Error", paths_or_glob))?;
            let names: Vec<&str> = blobs.iter().map(|blob| blob.name.as_str()).collect();
            println!("Success upload to remote: {:?}", names);
        }
        Commands::Download { path, key, tag } => {
            let paths = async {
                connect(config)
                    .await?
                    .download(&path, &key, &tag)
                    .await
                    .map_err(anyhow::Error::from)
            }
            .await
            .with_context(|| format!("Failed download key: {}, tag: {}. Error", key, tag))?;
            println!("Success download key: {}, tag: {}", key, tag);
            println!("Download to: {:?}", paths);
        }
        Commands::Keys { prefix } => {
            let keys = async {
                connect(config)
                    .await?
                    .list_keys(prefix.as_deref())
                    .await
                    .map_err(anyhow::Error::from)
            }
            .await
            .context("Failed list keys. Error")?;
            for key in keys {
                println!("{}", key);
            }
        }
        Commands::Tags { key } => {
            let tags = async {
                connect(config)
                    .await?
                    .list_tags(&key)
                    .await
                    .map_err(anyhow::Error::from)
            }
            .await
            .context("Failed list tags. Error")?;
            for tag in tags {
                println!("{}", tag);
            }
        }
    }
    Ok(())
}
