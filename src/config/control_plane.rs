//! Control-plane endpoint configuration

use super::{ConfigError, StreamConfig};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Where the control plane lives and how long REST calls may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// Base URL of the control plane (http, https, ws or wss)
    pub url: String,
    /// Timeout for each REST request
    pub timeout_seconds: u64,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl ControlPlaneConfig {
    /// Base URL for REST calls, without a trailing slash.
    pub fn http_base(&self) -> Result<String, ConfigError> {
        let mut url = self.parse_url()?;
        match url.scheme() {
            "http" | "https" => {}
            "ws" => set_scheme(&mut url, "http")?,
            "wss" => set_scheme(&mut url, "https")?,
            other => return Err(invalid_scheme(other)),
        }
        Ok(url.as_str().trim_end_matches('/').to_string())
    }

    /// Event feed URL: the base URL with a websocket scheme and the stream path appended.
    pub fn feed_url(&self, stream: &StreamConfig) -> Result<String, ConfigError> {
        let mut url = self.parse_url()?;
        match url.scheme() {
            "ws" | "wss" => {}
            "http" => set_scheme(&mut url, "ws")?,
            "https" => set_scheme(&mut url, "wss")?,
            other => return Err(invalid_scheme(other)),
        }
        let base_path = url.path().trim_end_matches('/').to_string();
        let stream_path = stream.path.trim_start_matches('/');
        url.set_path(&format!("{}/{}", base_path, stream_path));
        Ok(url.to_string())
    }

    fn parse_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.url).map_err(|e| ConfigError::invalid("control_plane.url", e.to_string()))
    }
}

fn set_scheme(url: &mut Url, scheme: &str) -> Result<(), ConfigError> {
    url.set_scheme(scheme).map_err(|_| {
        ConfigError::invalid("control_plane.url", format!("cannot switch scheme to {}", scheme))
    })
}

fn invalid_scheme(scheme: &str) -> ConfigError {
    ConfigError::invalid("control_plane.url", format!("unsupported scheme '{}'", scheme))
}
