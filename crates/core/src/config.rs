//! Host configuration.
//!
//! Configuration can come from code, from a TOML/JSON file, or both — file
//! values first, explicit overrides deep-merged on top (later values win).

use std::path::Path;

use {
    bramble_common::{Context, deep_merge, error, types::UserId},
    rand::Rng,
    serde::{Deserialize, Serialize},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

/// Connection and identity settings for one host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// The bot's own user identifier.
    pub user_id: UserId,
    /// Server access token.
    #[serde(default)]
    pub access_token: String,
    /// Chat server base URL.
    #[serde(default)]
    pub base_url: String,
    /// Device identifier for this instance; generated randomly when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings consumed by [`init_logging`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum visibility level (an `EnvFilter` directive, e.g. `info` or
    /// `bramble_core=debug`).
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl HostConfig {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            access_token: String::new(),
            base_url: String::new(),
            device_id: None,
            logging: LoggingConfig::default(),
        }
    }

    /// Load config from `path` (TOML or JSON, by extension).
    pub fn from_file(path: &Path) -> error::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        match ext {
            "toml" => toml::from_str(&raw).map_err(|e| error::Error::parse("toml", e)),
            "json" => serde_json::from_str(&raw).map_err(|e| error::Error::parse("json", e)),
            _ => Err(error::Error::message(format!(
                "unsupported config format: .{ext}"
            ))),
        }
    }

    /// Deep-merge `overrides` over this config; later values win, objects
    /// merge key-wise, neither input is mutated.
    pub fn with_overrides(&self, overrides: &serde_json::Value) -> error::Result<Self> {
        let base = serde_json::to_value(self).map_err(|e| error::Error::parse("json", e))?;
        let merged = deep_merge(&base, overrides);
        serde_json::from_value(merged).map_err(|e| error::Error::parse("json", e))
    }

    /// A random device identifier, hex-encoded.
    #[must_use]
    pub fn generate_device_id() -> String {
        format!("{:06x}", rand::rng().random_range(0..0x100_0000))
    }
}

/// Install a global `tracing` subscriber honoring `RUST_LOG` when set and
/// falling back to the configured level. Safe to call more than once; later
/// calls are no-ops.
pub fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::io::Write};

    #[test]
    fn from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "user_id = \"@bot:example.org\"\naccess_token = \"secret\"\nbase_url = \"https://example.org\""
        )
        .unwrap();

        let config = HostConfig::from_file(file.path()).unwrap();
        assert_eq!(config.user_id.as_str(), "@bot:example.org");
        assert_eq!(config.access_token, "secret");
        assert!(config.device_id.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn from_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            "{}",
            serde_json::json!({
                "user_id": "@bot:example.org",
                "device_id": "abc123",
                "logging": {"level": "debug"},
            })
        )
        .unwrap();

        let config = HostConfig::from_file(file.path()).unwrap();
        assert_eq!(config.device_id.as_deref(), Some("abc123"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn unsupported_format_is_rejected() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(HostConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn overrides_win_and_merge_key_wise() {
        let config = HostConfig::new("@bot:example.org");
        let merged = config
            .with_overrides(&serde_json::json!({
                "base_url": "https://example.org",
                "logging": {"level": "trace"},
            }))
            .unwrap();
        assert_eq!(merged.user_id.as_str(), "@bot:example.org");
        assert_eq!(merged.base_url, "https://example.org");
        assert_eq!(merged.logging.level, "trace");
    }

    #[test]
    fn generated_device_ids_are_short_hex() {
        let id = HostConfig::generate_device_id();
        assert_eq!(id.len(), 6);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
