//! One-shot HTTP classification of a stored image, plus the service health
//! check. Independent of the live session and its pacing.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use inference_common::classification::ClassificationResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ClientConfig;

/// Shown in place of any transport or decoding failure.
pub const UPLOAD_FAILED_MESSAGE: &str = "Failed to upload image";
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub device: String,
    /// Seconds since the epoch, as reported by the service.
    #[serde(default)]
    pub timestamp: f64,
}

pub struct UploadClient {
    client: reqwest::Client,
    upload_url: String,
    health_url: String,
}

impl UploadClient {
    pub fn new(config: &ClientConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            upload_url: config.upload_url(),
            health_url: config.health_url(),
        }
    }

    pub async fn check_health(&self) -> Result<HealthStatus> {
        let response = self
            .client
            .get(&self.health_url)
            .send()
            .await
            .context("Failed to reach classification service")?;
        let status = response.status();
        anyhow::ensure!(status.is_success(), "Health check returned {status}");
        response.json().await.context("Failed to parse health response")
    }

    /// Uploads `path` as multipart field `file`. Error bodies (4xx/5xx) carry
    /// the regular result shape and are returned as results, not errors.
    pub async fn classify_file(&self, path: &Path) -> Result<ClassificationResult> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {path:?}"))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.jpg".to_string());

        let form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name));
        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .context("Failed to send upload request")?;

        let status = response.status();
        let result: ClassificationResult = response
            .json()
            .await
            .with_context(|| format!("Failed to parse upload response ({status})"))?;
        debug!("Upload of {path:?} answered {status}");
        Ok(result)
    }

    /// Like [`classify_file`](Self::classify_file), but any failure becomes
    /// the generic upload error result.
    pub async fn classify(&self, path: &Path) -> ClassificationResult {
        match self.classify_file(path).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Upload failed: {e:#}");
                ClassificationResult::failure(UPLOAD_FAILED_MESSAGE)
            }
        }
    }
}
