use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use sha2::{Digest, Sha256};
use tracing::{error, info};

use super::{Artifact, ArtifactStore, StorageError};
use crate::config::StorageConfig;

const SIGNED_HEADERS: &str = "content-type;host;x-amz-content-sha256;x-amz-date";

/// Uploads artifacts with a SigV4-signed `PUT` object request.
pub struct S3ArtifactStore {
    client: reqwest::Client,
    access_key: String,
    secret_key: String,
    region: String,
    bucket: String,
    folder: String,
    endpoint: Option<String>,
}

impl S3ArtifactStore {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
            region: config.region.clone(),
            bucket: config.bucket.clone(),
            folder: config.folder.clone(),
            endpoint: config
                .endpoint
                .as_deref()
                .map(|value| value.trim_end_matches('/').to_string()),
        })
    }

    /// Virtual-hosted URL on AWS, path-style against a custom endpoint.
    pub fn object_url(&self, key: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{endpoint}/{}/{key}", self.bucket),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{key}",
                self.bucket, self.region
            ),
        }
    }

    fn authorization(
        &self,
        request: &SignedRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        sign_put(
            &self.access_key,
            &self.secret_key,
            &self.region,
            request,
            now,
        )
    }
}

pub(crate) struct SignedRequest<'a> {
    pub host: &'a str,
    pub path: &'a str,
    pub content_type: &'a str,
    pub payload_hash: &'a str,
}

fn hmac(key: &[u8], data: &str) -> Result<Vec<u8>, StorageError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|_| StorageError::Signing)?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Authorization header value for an S3 `PUT` signed with AWS Signature V4.
pub(crate) fn sign_put(
    access_key: &str,
    secret_key: &str,
    region: &str,
    request: &SignedRequest<'_>,
    now: DateTime<Utc>,
) -> Result<String, StorageError> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let scope = format!("{date}/{region}/s3/aws4_request");

    let canonical_request = format!(
        "PUT\n{path}\n\ncontent-type:{content_type}\nhost:{host}\nx-amz-content-sha256:{hash}\nx-amz-date:{amz_date}\n\n{SIGNED_HEADERS}\n{hash}",
        path = request.path,
        content_type = request.content_type,
        host = request.host,
        hash = request.payload_hash,
    );
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );

    let k_date = hmac(format!("AWS4{secret_key}").as_bytes(), &date)?;
    let k_region = hmac(&k_date, region)?;
    let k_service = hmac(&k_region, "s3")?;
    let k_signing = hmac(&k_service, "aws4_request")?;
    let signature = hex::encode(hmac(&k_signing, &string_to_sign)?);

    Ok(format!(
        "AWS4-HMAC-SHA256 Credential={access_key}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}"
    ))
}

/// Splits `https://host/path` into host and absolute path.
fn host_and_path(url: &str) -> (&str, &str) {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    match without_scheme.find('/') {
        Some(index) => (&without_scheme[..index], &without_scheme[index..]),
        None => (without_scheme, "/"),
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn upload(&self, artifact: Artifact) -> Result<String, StorageError> {
        let key = artifact.object_key(&self.folder);
        let url = self.object_url(&key);
        let (host, path) = host_and_path(&url);
        let payload_hash = sha256_hex(&artifact.bytes);
        let now = Utc::now();

        let authorization = self.authorization(
            &SignedRequest {
                host,
                path,
                content_type: artifact.content_type,
                payload_hash: &payload_hash,
            },
            now,
        )?;

        let response = self
            .client
            .put(&url)
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_TYPE, artifact.content_type)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", now.format("%Y%m%dT%H%M%SZ").to_string())
            .body(artifact.bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, key = %key, "artifact upload rejected");
            return Err(StorageError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(key = %key, "artifact uploaded");
        Ok(url)
    }
}
