use std::env;

use cluster::ClusterOptions;
use model::dedup::DedupConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::viewport::Viewport;

pub const DEFAULT_API_URL: &str = "https://api.monkemaps.com/monkemaps";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    pub api_url: String,
    pub cluster: ClusterOptions,
    pub dedup: DedupConfig,
    pub default_viewport: Viewport,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            cluster: ClusterOptions::default(),
            dedup: DedupConfig::default(),
            default_viewport: Viewport::default(),
        }
    }
}

impl SyncConfig {
    /// Defaults overlaid with `MAPSYNC_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env()
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validated()
    }

    /// Applies `MAPSYNC_*` overrides on top of `self`. Unparsable values are
    /// ignored.
    pub fn with_env(mut self) -> Result<Self, ConfigError> {
        self.api_url = env::var("MAPSYNC_API_URL").unwrap_or(self.api_url);
        self.cluster.radius = env_var_f64("MAPSYNC_CLUSTER_RADIUS", self.cluster.radius);
        self.cluster.max_zoom = env_var_u8("MAPSYNC_MAX_ZOOM", self.cluster.max_zoom);
        self.dedup.pin_scale = env_var_f64("MAPSYNC_PIN_SCALE", self.dedup.pin_scale);
        self.dedup.member_scale = env_var_f64("MAPSYNC_MEMBER_SCALE", self.dedup.member_scale);
        self.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "apiUrl",
                message: "must not be empty".to_string(),
            });
        }
        if self.cluster.max_zoom > cluster::MAX_SUPPORTED_ZOOM {
            return Err(ConfigError::Invalid {
                key: "cluster.max_zoom",
                message: format!("must be at most {}", cluster::MAX_SUPPORTED_ZOOM),
            });
        }
        if !(self.cluster.radius.is_finite() && self.cluster.radius >= 0.0) {
            return Err(ConfigError::Invalid {
                key: "cluster.radius",
                message: "must be a non-negative number".to_string(),
            });
        }
        for (key, scale) in [
            ("dedup.pin_scale", self.dedup.pin_scale),
            ("dedup.member_scale", self.dedup.member_scale),
        ] {
            if !(scale.is_finite() && scale >= 0.0) {
                return Err(ConfigError::Invalid {
                    key,
                    message: "must be a non-negative number".to_string(),
                });
            }
        }
        Ok(self)
    }
}

fn env_var_u8(key: &str, default: u8) -> u8 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, SyncConfig, DEFAULT_API_URL};
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let c = SyncConfig::default();
        assert_eq!(c.api_url, DEFAULT_API_URL);
        assert_eq!(c.cluster.radius, 20.0);
        assert_eq!(c.cluster.max_zoom, 16);
        assert_eq!(c.dedup.pin_scale, 1e-4);
        assert_eq!(c.default_viewport.zoom, 9.0);
    }

    #[test]
    fn json_overrides_only_named_fields() {
        let c = SyncConfig::from_json_str(
            r#"{ "apiUrl": "http://localhost:8080", "cluster": { "radius": 40 }, "dedup": { "member_scale": 0.001 } }"#,
        )
        .expect("config");
        assert_eq!(c.api_url, "http://localhost:8080");
        assert_eq!(c.cluster.radius, 40.0);
        assert_eq!(c.cluster.max_zoom, 16);
        assert_eq!(c.dedup.member_scale, 0.001);
        assert_eq!(c.dedup.pin_scale, 1e-4);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            SyncConfig::from_json_str(r#"{ "cluster": { "max_zoom": 31 } }"#),
            Err(ConfigError::Invalid { key: "cluster.max_zoom", .. })
        ));
        assert!(matches!(
            SyncConfig::from_json_str(r#"{ "apiUrl": "" }"#),
            Err(ConfigError::Invalid { key: "apiUrl", .. })
        ));
        assert!(matches!(
            SyncConfig::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
