//! Media store - transient attachments hosted for the gateway to download.
//!
//! Once an item carrying media has been sent, its upload is no longer needed. Deletion
//! is best-effort; callers log failures and move on.

use crate::config::settings::MediaConfig;
use crate::entities::MediaType;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// A store that hosts uploaded media
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Deletes the asset identified by `handle`.
    async fn delete(&self, handle: &str, kind: MediaType) -> Result<()>;
}

/// Used when no media store is configured; deletion does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledMediaStore;

#[async_trait]
impl MediaStore for DisabledMediaStore {
    async fn delete(&self, handle: &str, _kind: MediaType) -> Result<()> {
        debug!(handle, "Media store disabled, keeping asset");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Cloudinary upload API client
#[derive(Debug, Clone)]
pub struct CloudinaryStore {
    cloud_name: String,
    api_key: String,
    api_secret: String,
    client: reqwest::Client,
}

impl CloudinaryStore {
    /// Creates a client from configured credentials.
    #[must_use]
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn sign(&self, public_id: &str, timestamp: i64) -> String {
        let payload = format!(
            "public_id={public_id}&timestamp={timestamp}{}",
            self.api_secret
        );
        format!("{:x}", Sha256::digest(payload.as_bytes()))
    }

    fn destroy_url(&self, kind: MediaType) -> String {
        let resource_type = match kind {
            MediaType::Image => "image",
            MediaType::Video => "video",
        };
        format!(
            "{CLOUDINARY_API_BASE}/{}/{resource_type}/destroy",
            self.cloud_name
        )
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn delete(&self, handle: &str, kind: MediaType) -> Result<()> {
        let timestamp = Utc::now().timestamp();
        let signature = self.sign(handle, timestamp);
        let timestamp = timestamp.to_string();

        let response = self
            .client
            .post(self.destroy_url(kind))
            .form(&[
                ("public_id", handle),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.api_key.as_str()),
                ("signature", signature.as_str()),
                ("signature_algorithm", "sha256"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Media {
                message: format!("destroy of '{handle}' failed ({status}): {body}"),
            });
        }

        let outcome: DestroyResponse = response.json().await?;
        if outcome.result != "ok" {
            return Err(Error::Media {
                message: format!("destroy of '{handle}' returned '{}'", outcome.result),
            });
        }
        debug!(handle, "Deleted media asset");
        Ok(())
    }
}

/// Picks the Cloudinary store when credentials are present.
#[must_use]
pub fn media_store_from_config(config: &MediaConfig) -> Arc<dyn MediaStore> {
    if config.is_configured() {
        Arc::new(CloudinaryStore::new(config))
    } else {
        Arc::new(DisabledMediaStore)
    }
}
