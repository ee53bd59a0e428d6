//! One function per storage subcommand
//!
//! Handlers never fail; each command prints what it got and leaves failure
//! reporting to the handler's logger. Only local argument problems return
//! an error.

use crate::cli::args::{parse_bucket, parse_object_path, parse_s3_path};
use crate::storage::{CannedAcl, CorsRule, ReadOutcome, StorageApi, StorageHandler};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

fn print_lines(lines: &[String]) -> Result<()> {
    // Buffer stdout to avoid per-line flushes on large listings
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::with_capacity(64 * 1024, stdout.lock());
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    out.flush()?;
    Ok(())
}

pub async fn cmd_buckets<A: StorageApi>(handler: &StorageHandler<A>) -> Result<()> {
    if let Some(buckets) = handler.list_containers().await {
        print_lines(&buckets)?;
    }
    Ok(())
}

pub async fn cmd_mb<A: StorageApi>(handler: &StorageHandler<A>, bucket: &str) -> Result<()> {
    let bucket = parse_bucket(bucket)?;
    handler.create_container(&bucket).await;
    Ok(())
}

pub async fn cmd_rb<A: StorageApi>(handler: &StorageHandler<A>, bucket: &str) -> Result<()> {
    let bucket = parse_bucket(bucket)?;
    handler.delete_container(&bucket).await;
    Ok(())
}

pub async fn cmd_ls<A: StorageApi>(handler: &StorageHandler<A>, path: &str) -> Result<()> {
    let (bucket, prefix) = parse_s3_path(path)?;
    let keys = match prefix {
        Some(prefix) => handler.list_objects_with_prefix(&bucket, &prefix).await,
        None => handler.list_objects(&bucket).await,
    };
    if let Some(keys) = keys {
        print_lines(&keys)?;
    }
    Ok(())
}

pub async fn cmd_exists<A: StorageApi>(handler: &StorageHandler<A>, path: &str) -> Result<()> {
    let (bucket, key) = parse_object_path(path)?;
    println!("{}", handler.object_exists(&bucket, &key).await);
    Ok(())
}

pub async fn cmd_put<A: StorageApi>(
    handler: &StorageHandler<A>,
    file: &Path,
    dest: &str,
    folder: &str,
) -> Result<()> {
    let (bucket, key) = parse_s3_path(dest)?;
    let key = match key {
        Some(key) if !key.ends_with('/') => key,
        prefix => {
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .context("Cannot derive an object key from the file name")?;
            format!("{}{}", prefix.unwrap_or_default(), name)
        }
    };

    let data = match tokio::fs::read(file).await {
        Ok(data) => data,
        Err(e) => {
            tracing::error!("Failed to read {}: {}", file.display(), e);
            return Ok(());
        }
    };
    handler.upload(&bucket, &key, data, folder).await;
    Ok(())
}

pub async fn cmd_get<A: StorageApi>(
    handler: &StorageHandler<A>,
    path: &str,
    dest: &Path,
) -> Result<()> {
    let (bucket, key) = parse_object_path(path)?;
    handler.download(&bucket, &key, dest).await;
    Ok(())
}

pub async fn cmd_cat<A: StorageApi>(handler: &StorageHandler<A>, path: &str) -> Result<()> {
    let (bucket, key) = parse_object_path(path)?;
    match handler.read(&bucket, &key).await {
        ReadOutcome::Found(content) => print!("{}", content),
        ReadOutcome::NotPresent => println!("{}", ReadOutcome::NOT_PRESENT),
        ReadOutcome::Failed(_) => {}
    }
    Ok(())
}

pub async fn cmd_rm<A: StorageApi>(handler: &StorageHandler<A>, path: &str) -> Result<()> {
    let (bucket, key) = parse_object_path(path)?;
    println!("{}", handler.delete_and_report(&bucket, &key).await);
    Ok(())
}

pub async fn cmd_cp<A: StorageApi>(
    handler: &StorageHandler<A>,
    source: &str,
    dest: &str,
    remove_source: bool,
) -> Result<()> {
    let (src_bucket, src_key) = parse_object_path(source)?;
    let (dst_bucket, dst_key) = parse_s3_path(dest)?;
    // Copying into a bucket keeps the key
    let dst_key = dst_key.unwrap_or_else(|| src_key.clone());

    if remove_source {
        handler
            .move_object(&src_bucket, &src_key, &dst_bucket, &dst_key)
            .await;
    } else {
        handler
            .copy(&src_bucket, &src_key, &dst_bucket, &dst_key)
            .await;
    }
    Ok(())
}

pub async fn cmd_presign<A: StorageApi>(
    handler: &StorageHandler<A>,
    path: &str,
    expires: u64,
) -> Result<()> {
    let (bucket, key) = parse_object_path(path)?;
    if let Some(url) = handler
        .generate_temporary_access_url(&bucket, &key, expires)
        .await
    {
        println!("{}", url);
    }
    Ok(())
}

pub async fn cmd_stat<A: StorageApi>(handler: &StorageHandler<A>, path: &str) -> Result<()> {
    let (bucket, key) = parse_object_path(path)?;
    if let Some(metadata) = handler.get_object_metadata(&bucket, &key).await {
        print_json(&metadata)?;
    }
    Ok(())
}

pub async fn cmd_acl<A: StorageApi>(
    handler: &StorageHandler<A>,
    path: &str,
    policy: CannedAcl,
) -> Result<()> {
    let (bucket, key) = parse_object_path(path)?;
    handler.set_access_control(&bucket, &key, policy).await;
    Ok(())
}

pub async fn cmd_versioning<A: StorageApi>(
    handler: &StorageHandler<A>,
    bucket: &str,
    enable: Option<bool>,
) -> Result<()> {
    let bucket = parse_bucket(bucket)?;
    match enable {
        Some(enabled) => {
            handler.set_versioning(&bucket, enabled).await;
        }
        None => {
            if let Some(status) = handler.get_versioning(&bucket).await {
                println!("{}", status);
            }
        }
    }
    Ok(())
}

pub async fn cmd_cors<A: StorageApi>(
    handler: &StorageHandler<A>,
    bucket: &str,
    rules_file: Option<&Path>,
) -> Result<()> {
    let bucket = parse_bucket(bucket)?;
    match rules_file {
        Some(file) => {
            let content = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read CORS rules: {:?}", file))?;
            let rules: Vec<CorsRule> =
                serde_json::from_str(&content).context("Failed to parse CORS rules")?;
            handler.set_cors_policy(&bucket, &rules).await;
        }
        None => {
            if let Some(rules) = handler.get_cors_policy(&bucket).await {
                print_json(&rules)?;
            }
        }
    }
    Ok(())
}

pub async fn cmd_encryption<A: StorageApi>(handler: &StorageHandler<A>, bucket: &str) -> Result<()> {
    let bucket = parse_bucket(bucket)?;
    if let Some(config) = handler.get_encryption_config(&bucket).await {
        print_json(&config)?;
    }
    Ok(())
}

pub async fn cmd_restore<A: StorageApi>(
    handler: &StorageHandler<A>,
    path: &str,
    days: u32,
) -> Result<()> {
    let (bucket, key) = parse_object_path(path)?;
    handler.restore_archived_object_for(&bucket, &key, days).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LocationConstraint;
    use crate::storage::MemoryStorage;

    fn handler(store: MemoryStorage) -> StorageHandler<MemoryStorage> {
        StorageHandler::new(store, Some(LocationConstraint::new("eu-west-1")))
    }

    #[tokio::test]
    async fn test_put_defaults_key_to_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.csv");
        std::fs::write(&file, "a,b\n").unwrap();

        let handler = handler(MemoryStorage::new().with_bucket("b"));
        cmd_put(&handler, &file, "s3://b", "2024/").await.unwrap();
        assert_eq!(handler.api().object("b", "2024/report.csv").unwrap(), "a,b\n");
    }

    #[tokio::test]
    async fn test_put_into_prefix_appends_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.csv");
        std::fs::write(&file, "a,b\n").unwrap();

        let handler = handler(MemoryStorage::new().with_bucket("bucket"));
        cmd_put(&handler, &file, "s3://bucket/2024/", "archive/")
            .await
            .unwrap();

        assert_eq!(
            handler.list_objects("bucket").await,
            Some(vec!["archive/2024/report.csv".to_string()])
        );
    }

    #[tokio::test]
    async fn test_put_explicit_key() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.csv");
        std::fs::write(&file, "x").unwrap();

        let handler = handler(MemoryStorage::new().with_bucket("bucket"));
        cmd_put(&handler, &file, "s3://bucket/renamed.csv", "").await.unwrap();
        assert_eq!(handler.api().object("bucket", "renamed.csv").unwrap(), "x");
    }

    #[tokio::test]
    async fn test_cp_into_bucket_keeps_key() {
        let handler = handler(
            MemoryStorage::new()
                .with_object("src", "k.txt", "v")
                .with_bucket("dst"),
        );
        cmd_cp(&handler, "s3://src/k.txt", "s3://dst", true).await.unwrap();

        assert!(handler.api().object("dst", "k.txt").is_some());
        assert!(handler.api().object("src", "k.txt").is_none());
    }

    #[tokio::test]
    async fn test_cors_rules_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cors.json");
        std::fs::write(
            &file,
            r#"[{"allowed_origins":["*"],"allowed_methods":["GET"],"max_age_seconds":300}]"#,
        )
        .unwrap();

        let handler = handler(MemoryStorage::new().with_bucket("b"));
        cmd_cors(&handler, "s3://b", Some(file.as_path())).await.unwrap();

        let rules = handler.api().cors("b").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].max_age_seconds, Some(300));
    }

    #[tokio::test]
    async fn test_bad_paths_are_argument_errors() {
        let handler = handler(MemoryStorage::new());
        assert!(cmd_cat(&handler, "b/k").await.is_err());
        assert!(cmd_rm(&handler, "s3://b").await.is_err());
        assert!(cmd_mb(&handler, "").await.is_err());
        assert_eq!(handler.api().total_calls(), 0);
    }
}
