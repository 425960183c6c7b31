//! Walks through the three common overwrite patterns against an in-memory
//! store: reformatting JSON in place, flipping an object to public-read, and
//! stamping a batch of log files.
//!
//! ```text
//! RUST_LOG=object_overwrite=debug cargo run --example format_json -- --max-size 1048576
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use object_overwrite::{
    CannedAcl, Grantee, MemoryObjectStore, OverwriteConfig, OverwriteDecision, OverwriteOutcome,
    OverwriteService, Permission, StoredObject, models::acl::AUTHENTICATED_USERS_GROUP,
};
use std::{fs, io::Write, path::PathBuf, sync::Arc};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Attribute-preserving overwrite walkthrough")]
struct Args {
    #[arg(long, default_value = "my-bucket")]
    bucket: String,

    /// JSON object to pretty-print.
    #[arg(long, default_value = "data/config.json")]
    key: String,

    /// Object switched to public-read.
    #[arg(long, default_value = "public/data.json")]
    public_key: String,

    /// Objects larger than this are skipped.
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    max_size: i64,
}

const LOG_KEYS: [&str; 3] = ["logs/app.log", "logs/empty.log", "logs/worker.log"];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let store = Arc::new(MemoryObjectStore::new());
    seed(&store, &args);

    let service = OverwriteService::new(store.clone(), OverwriteConfig::from_env()?);

    format_json(&service, &args).await?;
    println!("Successfully formatted JSON file");

    match make_public(&service, &args).await {
        Ok(()) => println!("Successfully made file public"),
        Err(err) => eprintln!("Error making file public: {:#}", err),
    }

    process_logs(&service, &store, &args.bucket).await;

    let formatted = store
        .object(&args.bucket, &args.key)
        .context("formatted object vanished")?;
    println!(
        "{} now has {} grants, tags {:?}, metadata {:?}",
        args.key,
        formatted.grants.len(),
        formatted.tags,
        formatted.metadata
    );
    Ok(())
}

fn seed(store: &MemoryObjectStore, args: &Args) {
    let owner = store.owner_id().to_string();
    store.insert_object(
        &args.bucket,
        &args.key,
        StoredObject::new(r#"{"name":"demo","features":["a","b"],"enabled":true}"#)
            .with_content_type("application/json")
            .with_metadata("source", "seed")
            .with_tag("env", "demo")
            .with_grant(Grantee::canonical_user(owner.clone()), Permission::FullControl)
            .with_grant(Grantee::group(AUTHENTICATED_USERS_GROUP), Permission::Write),
    );
    store.insert_object(
        &args.bucket,
        &args.public_key,
        StoredObject::new(r#"{"public":true}"#)
            .with_content_type("application/json")
            .with_tag("visibility", "pending"),
    );
    store.insert_object(&args.bucket, LOG_KEYS[0], StoredObject::new("started\nstopped\n"));
    store.insert_object(&args.bucket, LOG_KEYS[1], StoredObject::new(""));
    store.insert_object(&args.bucket, LOG_KEYS[2], StoredObject::new("job 1 done\n"));
}

/// Write `content` to a fresh temp file that outlives its handle.
fn scratch_file(prefix: &str, suffix: &str, content: &[u8]) -> Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile()?;
    file.write_all(content)?;
    Ok(file.into_temp_path().keep()?)
}

async fn format_json(service: &OverwriteService<Arc<MemoryObjectStore>>, args: &Args) -> Result<()> {
    let max_size = args.max_size;
    service
        .overwrite_preserving_acl(&args.bucket, &args.key, |snapshot, local, mut metadata| {
            let size = snapshot.content_length.unwrap_or_default();
            println!("Processing: {}/{} (size: {} bytes)", snapshot.bucket, snapshot.key, size);

            if size > max_size {
                println!("Skipping: file too large");
                return Ok(OverwriteDecision::skip());
            }

            let data = fs::read(local)?;
            let json: serde_json::Value =
                serde_json::from_slice(&data).context("invalid JSON")?;
            let formatted = serde_json::to_vec_pretty(&json)?;

            metadata.insert("formatted".into(), "true".into());
            metadata.insert("formatted-at".into(), Utc::now().to_rfc3339());

            let path = scratch_file("formatted-", ".json", &formatted)?;
            Ok(OverwriteDecision::replace_and_dispose(path, metadata))
        })
        .await?;
    Ok(())
}

async fn make_public(service: &OverwriteService<Arc<MemoryObjectStore>>, args: &Args) -> Result<()> {
    service
        .overwrite_with_simple_acl(
            &args.bucket,
            &args.public_key,
            CannedAcl::PublicRead,
            |snapshot, local, mut metadata| {
                println!("Making public: {}/{}", snapshot.bucket, snapshot.key);
                metadata.insert("made-public".into(), Utc::now().to_rfc3339());
                Ok(OverwriteDecision::keep_content(local, metadata))
            },
        )
        .await?;
    Ok(())
}

async fn process_logs(
    service: &OverwriteService<Arc<MemoryObjectStore>>,
    store: &MemoryObjectStore,
    bucket: &str,
) {
    for key in LOG_KEYS {
        let empty = store
            .object(bucket, key)
            .is_none_or(|object| object.content.is_empty());
        if empty {
            continue;
        }

        let result = service
            .overwrite_preserving_acl(bucket, key, |_, local, metadata| {
                let content = fs::read(local)?;
                let mut stamped =
                    format!("# Processed at {}\n", Utc::now().to_rfc3339()).into_bytes();
                stamped.extend_from_slice(&content);

                let path = scratch_file("processed-", ".log", &stamped)?;
                Ok(OverwriteDecision::replace_and_dispose(path, metadata))
            })
            .await;

        match result {
            Ok(OverwriteOutcome::Written { .. }) => println!("Processed: {}", key),
            Ok(OverwriteOutcome::Skipped) => println!("Left unchanged: {}", key),
            Err(err) => eprintln!("Error processing {}: {}", key, err),
        }
    }
}
