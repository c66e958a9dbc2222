use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "live_classify.toml";
const ENV_PREFIX: &str = "LIVE_CLASSIFY";

/// Client configuration. Layered as: defaults, then the TOML file, then
/// `LIVE_CLASSIFY_*` environment variables; the CLI overrides on top.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Origin of the classification service, e.g. `http://localhost:5000`.
    pub server_url: String,
    pub capture_interval_ms: u64,
    /// JPEG quality for outbound frames, 1-100.
    pub jpeg_quality: u8,
    pub reconnect_delay_ms: u64,
    /// Abandon a request that got no result after this long. Unset keeps a
    /// silent service stalling the sampler until it is restarted.
    pub result_timeout_ms: Option<u64>,
    pub font_path: Option<PathBuf>,
    /// Annotated copy of the latest classified frame is written here.
    pub overlay_output: Option<PathBuf>,
    /// JSON-lines file receiving every classification result.
    pub result_log: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".to_string(),
            capture_interval_ms: 500,
            jpeg_quality: 80,
            reconnect_delay_ms: 2000,
            result_timeout_ms: None,
            font_path: Some(PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf")),
            overlay_output: None,
            result_log: None,
            log_file: None,
        }
    }
}

impl ClientConfig {
    /// Loads the layered configuration. An explicitly given file must exist;
    /// the default `live_classify.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (file, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };

        let config: Self = config::Config::builder()
            .add_source(config::File::from(file).required(required))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("Failed to load configuration from {file:?}"))?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.capture_interval_ms > 0, "capture_interval_ms must be positive");
        anyhow::ensure!(
            (1..=100).contains(&self.jpeg_quality),
            "jpeg_quality must be within 1..=100, got {}",
            self.jpeg_quality
        );
        anyhow::ensure!(
            self.server_url.starts_with("http://") || self.server_url.starts_with("https://"),
            "server_url must be an http(s) origin, got {:?}",
            self.server_url
        );
        Ok(())
    }

    fn origin(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    /// Session endpoint derived from the service origin.
    pub fn websocket_url(&self) -> String {
        let origin = self.origin();
        let ws_origin = match origin.strip_prefix("https://") {
            Some(rest) => format!("wss://{rest}"),
            None => format!("ws://{}", origin.trim_start_matches("http://")),
        };
        format!("{ws_origin}/ws")
    }

    pub fn upload_url(&self) -> String {
        format!("{}/api/classify-upload", self.origin())
    }

    pub fn health_url(&self) -> String {
        format!("{}/api/health", self.origin())
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn result_timeout(&self) -> Option<Duration> {
        self.result_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_follow_origin() {
        let mut config = ClientConfig::default();
        assert_eq!(config.websocket_url(), "ws://localhost:5000/ws");
        assert_eq!(config.upload_url(), "http://localhost:5000/api/classify-upload");

        config.server_url = "https://classify.example.org/".into();
        assert_eq!(config.websocket_url(), "wss://classify.example.org/ws");
        assert_eq!(config.health_url(), "https://classify.example.org/api/health");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(
            &path,
            concat!(
                "server_url = \"http://10.0.0.5:5000\"\n",
                "capture_interval_ms = 250\n",
                "result_timeout_ms = 3000\n"
            ),
        )
        .unwrap();

        let config = ClientConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server_url, "http://10.0.0.5:5000");
        assert_eq!(config.capture_interval(), Duration::from_millis(250));
        assert_eq!(config.result_timeout(), Some(Duration::from_secs(3)));
        // untouched keys keep their defaults
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.reconnect_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ClientConfig::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = ClientConfig::default();
        assert!(config.validate().is_ok());

        config.jpeg_quality = 0;
        assert!(config.validate().is_err());

        config.jpeg_quality = 80;
        config.capture_interval_ms = 0;
        assert!(config.validate().is_err());

        config.capture_interval_ms = 500;
        config.server_url = "ftp://localhost".into();
        assert!(config.validate().is_err());
    }
}
