//! Session configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::sync::RoomCode;

/// Environment variable overriding the relay server URL.
pub const SERVER_URL_ENV: &str = "SKETCHROOM_SERVER";

/// Relay address used when nothing else is configured.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8080";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid server URL {url}: {reason}")]
    InvalidServerUrl { url: String, reason: String },
    #[error("Invalid view config: {0}")]
    InvalidView(String),
    #[error("Config parse error: {0}")]
    Parse(String),
}

/// Pan/zoom limits for the canvas view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub zoom_step: f64,
    pub initial_zoom: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.1,
            max_zoom: 5.0,
            zoom_step: 0.1,
            initial_zoom: 1.0,
        }
    }
}

impl ViewConfig {
    /// Check that the bounds and step describe a usable zoom range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_zoom.is_finite() && self.min_zoom > 0.0) {
            return Err(ConfigError::InvalidView(format!(
                "min_zoom must be positive, got {}",
                self.min_zoom
            )));
        }
        if !self.max_zoom.is_finite() || self.max_zoom < self.min_zoom {
            return Err(ConfigError::InvalidView(format!(
                "max_zoom {} is below min_zoom {}",
                self.max_zoom, self.min_zoom
            )));
        }
        if !(self.zoom_step.is_finite() && self.zoom_step > 0.0) {
            return Err(ConfigError::InvalidView(format!(
                "zoom_step must be positive, got {}",
                self.zoom_step
            )));
        }
        if !self.initial_zoom.is_finite() {
            return Err(ConfigError::InvalidView("initial_zoom must be finite".to_string()));
        }
        Ok(())
    }
}

/// Configuration for a drawing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base WebSocket URL of the relay, without the room path.
    pub server_url: String,
    /// Pan/zoom limits.
    pub view: ViewConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            view: ViewConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Defaults, with the server URL taken from `SKETCHROOM_SERVER` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(SERVER_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                config.server_url = url.to_string();
            }
        }
        config
    }

    /// Parse a JSON config document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.view.validate()?;
        Ok(config)
    }

    /// Build the room-scoped channel address: `<server_url>/ws/<code>`.
    ///
    /// Only `ws://` is accepted; the native transport is built without TLS.
    pub fn room_url(&self, room: &RoomCode) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidServerUrl {
            url: self.server_url.clone(),
            reason,
        };

        let mut url = Url::parse(&self.server_url).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "ws" => {}
            "wss" => return Err(invalid("TLS is not supported, use ws://".to_string())),
            other => return Err(invalid(format!("unsupported scheme {}", other))),
        }

        url.path_segments_mut()
            .map_err(|()| invalid("URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push("ws")
            .push(room.as_str());
        Ok(url)
    }
}
