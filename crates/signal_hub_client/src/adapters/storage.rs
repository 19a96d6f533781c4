//! crates/signal_hub_client/src/adapters/storage.rs
//!
//! Storage adapter: blob upload/delete, signed URLs, and listing against
//! the hosted service's object endpoints. Every failure is reported as a
//! storage error carrying the attempted path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use signal_hub_core::ports::{GatewayError, GatewayResult, StorageGateway};

use super::http::{self, HttpGateway};

pub struct RestStorageGateway {
    http: Arc<HttpGateway>,
}

impl RestStorageGateway {
    pub fn new(http: Arc<HttpGateway>) -> Self {
        Self { http }
    }
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

#[derive(Deserialize)]
struct ObjectEntry {
    name: String,
}

/// Re-labels any gateway error as a storage failure at `path`.
fn at_path(path: &str) -> impl FnOnce(GatewayError) -> GatewayError + '_ {
    move |err| match err {
        storage @ GatewayError::Storage { .. } => storage,
        other => GatewayError::Storage {
            path: path.to_string(),
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl StorageGateway for RestStorageGateway {
    async fn upload(&self, bucket: &str, path: &str, data: Bytes) -> GatewayResult<String> {
        self.http
            .execute(
                self.http
                    .client()
                    .post(self.http.storage_url(&format!("object/{bucket}/{path}")))
                    .header("x-upsert", "true")
                    .header("cache-control", "3600")
                    .body(data),
            )
            .await
            .map_err(at_path(path))?;
        Ok(path.to_string())
    }

    async fn delete(&self, bucket: &str, path: &str) -> GatewayResult<()> {
        self.http
            .execute(
                self.http
                    .client()
                    .delete(self.http.storage_url(&format!("object/{bucket}/{path}"))),
            )
            .await
            .map_err(at_path(path))?;
        Ok(())
    }

    async fn signed_url(&self, bucket: &str, path: &str, ttl: Duration) -> GatewayResult<String> {
        let response = self
            .http
            .execute(
                self.http
                    .client()
                    .post(self.http.storage_url(&format!("object/sign/{bucket}/{path}")))
                    .json(&json!({ "expiresIn": ttl.as_secs() })),
            )
            .await
            .map_err(at_path(path))?;
        let signed: SignedUrlResponse = response
            .json()
            .await
            .map_err(http::network)
            .map_err(at_path(path))?;
        Ok(format!(
            "{}/storage/v1{}",
            self.http.base_url(),
            signed.signed_url
        ))
    }

    async fn signed_download_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
    ) -> GatewayResult<String> {
        let url = self.signed_url(bucket, path, ttl).await?;
        // The signed URL already carries a token query parameter.
        Ok(format!("{url}&download="))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> GatewayResult<Vec<String>> {
        let response = self
            .http
            .execute(
                self.http
                    .client()
                    .post(self.http.storage_url(&format!("object/list/{bucket}")))
                    .json(&json!({ "prefix": prefix })),
            )
            .await
            .map_err(at_path(prefix))?;
        let entries: Vec<ObjectEntry> = response
            .json()
            .await
            .map_err(http::network)
            .map_err(at_path(prefix))?;
        Ok(entries.into_iter().map(|entry| entry.name).collect())
    }
}
