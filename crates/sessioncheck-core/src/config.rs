//! Harness configuration: where the SUT lives, the shared secret, and where
//! the upstream mock must listen.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_base_url() -> String {
    "http://localhost:8080/endpoint".to_string()
}

fn default_mock_addr() -> String {
    "127.0.0.1:8888".to_string()
}

const fn default_timeout() -> u64 {
    10
}

const fn default_true() -> bool {
    true
}

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SUT endpoint receiving the LOGIN/ACTION/LOGOUT posts
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Shared secret expected in the `X-Api-Key` header
    pub api_key: String,

    /// Listen address for the upstream mock. Must be the exact host:port the
    /// SUT is configured to call for `/auth` and `/doAction`, a
    /// test-environment contract the harness cannot infer.
    #[serde(default = "default_mock_addr")]
    pub mock_addr: String,

    /// Per-request client deadline in seconds. Exceeding it is reported as a
    /// harness-level timeout failure, never a hang.
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Write a `report.json` after the run
    #[serde(default)]
    pub report: bool,

    /// Directory for report files (default: ".sessioncheck")
    #[serde(default)]
    pub report_dir: Option<PathBuf>,

    /// Mask the `X-Api-Key` value in report files
    #[serde(default = "default_true")]
    pub mask_secrets: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: "qazWSXedc".to_string(),
            mock_addr: default_mock_addr(),
            request_timeout_secs: default_timeout(),
            report: false,
            report_dir: None,
            mask_secrets: true,
        }
    }
}

impl Config {
    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Load from default location (.sessioncheck.toml)
    pub fn load_default() -> Result<Self, ConfigError> {
        let candidates = [".sessioncheck.toml", ".sessioncheck.json", "sessioncheck.toml"];

        for name in candidates {
            let path = Path::new(name);
            if path.exists() {
                return Self::load(path);
            }
        }

        // No config file, return default
        Ok(Self::default())
    }

    /// Create example config file
    pub fn example() -> &'static str {
        r#"# sessioncheck configuration

# SUT endpoint receiving the LOGIN/ACTION/LOGOUT posts
base_url = "http://localhost:8080/endpoint"

# Shared secret expected in the X-Api-Key header
api_key = "change-me"

# Listen address for the upstream mock. Must match the host:port the SUT
# calls for /auth and /doAction.
mock_addr = "127.0.0.1:8888"

# Per-request client deadline in seconds
# request_timeout_secs = 10

# Write report.json after the run (default: false)
# report = true
# report_dir = ".sessioncheck"

# Mask the X-Api-Key value in report files (default: true)
# mask_secrets = false
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
}
