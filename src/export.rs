//! S3 export of aggregated results.

use anyhow::Result;
use aws_sdk_s3::primitives::ByteStream;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::io::Write;
use tracing::info;

/// Serializes a value to JSON and uploads it to an S3 bucket with
/// `application/json` content type.
pub async fn write_json_to_s3(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    value: &impl Serialize,
) -> Result<()> {
    let body = serde_json::to_vec(value)?;

    client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(body.into())
        .content_type("application/json")
        .send()
        .await?;

    Ok(())
}

/// Gzip-compresses a local CSV file and uploads it under `<key>.gz`.
pub async fn upload_gzipped_csv(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    path: &str,
) -> Result<()> {
    let contents = std::fs::read(path)?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&contents)?;
    let compressed = encoder.finish()?;

    let gz_key = format!("{key}.gz");
    client
        .put_object()
        .bucket(bucket)
        .key(&gz_key)
        .body(ByteStream::from(compressed))
        .content_type("application/gzip")
        .send()
        .await?;

    info!(bucket, key = %gz_key, "Gzipped CSV uploaded");
    Ok(())
}
