//! Command-line front end
//!
//! ```bash
//! cloudrm buckets
//! cloudrm put ./report.csv s3://bucket/2024/ --folder archive/
//! cloudrm cat s3://bucket/notes.txt
//! cloudrm presign s3://bucket/key --expires 3600
//! cloudrm instance-status i-0abc123
//! ```
//!
//! Provider failures are logged by the handlers and do not change the exit
//! status; only configuration and argument problems do.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};

use crate::client::ClientFactory;
use crate::compute::ComputeHandler;
use crate::config;
use crate::logger::{OperationLogger, TracingLogger};
use crate::storage::StorageHandler;
use crate::warehouse::WarehouseHandler;
use anyhow::{Context, Result};
use commands::*;
use std::sync::Arc;
use tracing::debug;

/// Load configuration, connect the handler the command needs and run it
pub async fn run(cli: Cli) -> Result<()> {
    let mut loaded = config::load_config(cli.config.as_deref(), cli.profile.as_deref())?;
    if cli.insecure {
        loaded.config.transport.insecure_tls = true;
    }

    let factory = ClientFactory::from_config(&loaded.config);
    let credentials = &loaded.credentials;
    let logger: Arc<dyn OperationLogger> = Arc::new(TracingLogger);

    debug!("Running {:?}", cli.command);

    match &cli.command {
        Commands::InstanceStatus { instance_id } => {
            let handler = ComputeHandler::connect(credentials, &factory)
                .context("Failed to create compute client")?
                .with_logger(logger);
            if let Some(status) = handler.get_instance_status(instance_id).await {
                println!("{}", status);
            }
            return Ok(());
        }
        Commands::Clusters => {
            let handler = WarehouseHandler::connect(credentials, &factory)
                .context("Failed to create warehouse client")?
                .with_logger(logger);
            if let Some(clusters) = handler.list_clusters().await {
                for cluster in clusters {
                    println!("{}", cluster);
                }
            }
            return Ok(());
        }
        _ => {}
    }

    let handler = StorageHandler::connect(credentials, &factory)
        .context("Failed to create storage client")?
        .with_logger(logger);

    match cli.command {
        Commands::Buckets => cmd_buckets(&handler).await,
        Commands::Mb { bucket } => cmd_mb(&handler, &bucket).await,
        Commands::Rb { bucket } => cmd_rb(&handler, &bucket).await,
        Commands::Ls { path } => cmd_ls(&handler, &path).await,
        Commands::Exists { path } => cmd_exists(&handler, &path).await,
        Commands::Put { file, dest, folder } => cmd_put(&handler, &file, &dest, &folder).await,
        Commands::Get { path, dest } => cmd_get(&handler, &path, &dest).await,
        Commands::Cat { path } => cmd_cat(&handler, &path).await,
        Commands::Rm { path } => cmd_rm(&handler, &path).await,
        Commands::Cp { source, dest } => cmd_cp(&handler, &source, &dest, false).await,
        Commands::Mv { source, dest } => cmd_cp(&handler, &source, &dest, true).await,
        Commands::Presign { path, expires } => cmd_presign(&handler, &path, expires).await,
        Commands::Stat { path } => cmd_stat(&handler, &path).await,
        Commands::Acl { path, policy } => cmd_acl(&handler, &path, policy).await,
        Commands::Versioning {
            bucket,
            enable,
            suspend,
        } => {
            let change = match (enable, suspend) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            cmd_versioning(&handler, &bucket, change).await
        }
        Commands::Cors { bucket, set } => cmd_cors(&handler, &bucket, set.as_deref()).await,
        Commands::Encryption { bucket } => cmd_encryption(&handler, &bucket).await,
        Commands::Restore { path, days } => cmd_restore(&handler, &path, days).await,
        Commands::InstanceStatus { .. } | Commands::Clusters => Ok(()),
    }
}
