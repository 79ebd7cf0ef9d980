//! Editor configuration, loadable from TOML.
//!
//! ```toml
//! [client]
//! base_url = "http://127.0.0.1:5000"
//!
//! [autosave]
//! debounce_ms = 2000
//! max_retries = 3
//! retry_backoff_ms = 1000
//!
//! [geometry]
//! anchor_offset_x = -150.0
//! anchor_offset_y = -40.0
//! ```
//!
//! Every field is optional; missing ones take the defaults shown above.

use pt_client::ClientConfig;
use pt_core::AnchorOffset;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid editor config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub client: ClientConfig,
    pub autosave: AutosaveConfig,
    pub geometry: GeometryConfig,
}

impl EditorConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    /// Quiescence window after the last edit to a tour before it is saved.
    pub debounce_ms: u64,
    /// Retries after a failed save; 0 disables retrying.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            max_retries: 3,
            retry_backoff_ms: 1000,
        }
    }
}

impl AutosaveConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Delay before retry number `attempt` (1-based), doubling each time.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub anchor_offset_x: f64,
    pub anchor_offset_y: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        let anchor = AnchorOffset::default();
        Self {
            anchor_offset_x: anchor.x,
            anchor_offset_y: anchor.y,
        }
    }
}

impl GeometryConfig {
    pub fn anchor(&self) -> AnchorOffset {
        AnchorOffset {
            x: self.anchor_offset_x,
            y: self.anchor_offset_y,
        }
    }
}
