//! Runtime configuration.
//!
//! `ArrasConfig` is read from a TOML document.  Every field has a default so
//! an empty document is a valid configuration that uses the in-process mock
//! timestamp authority.
//!
//! ```toml
//! [tsa]
//! provider = "example-qtsp"
//! endpoint = "https://tsa.example.eu/v1/timestamp"
//! api_key_env = "ARRAS_TSA_API_KEY"
//! timeout_secs = 20
//!
//! [persistence]
//! max_attempts = 5
//! backoff_ms = 200
//!
//! [pii]
//! normalization_version = "pii-norm-v2"
//! ```

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ArrasError, ArrasResult},
    pii::NormalizationVersion,
};

/// Shortest timeout the timestamp client accepts.
pub const MIN_TSA_TIMEOUT_SECS: u64 = 10;
/// Longest timeout the timestamp client accepts.
pub const MAX_TSA_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrasConfig {
    pub tsa: TsaConfig,
    pub persistence: RetryPolicy,
    pub pii: PiiConfig,
}

impl ArrasConfig {
    /// Parse `s` as TOML configuration.
    ///
    /// Returns `ArrasError::Config` if the document is malformed or fails
    /// validation.
    pub fn from_toml_str(s: &str) -> ArrasResult<Self> {
        let config: ArrasConfig = toml::from_str(s).map_err(|e| ArrasError::Config {
            reason: format!("failed to parse configuration TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse the TOML file at `path`.
    pub fn from_file(path: &Path) -> ArrasResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ArrasError::Config {
            reason: format!("failed to read configuration file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> ArrasResult<()> {
        if self.persistence.max_attempts == 0 {
            return Err(ArrasError::Config {
                reason: "persistence.max_attempts must be at least 1".to_string(),
            });
        }
        if let Some(endpoint) = &self.tsa.endpoint {
            if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
                return Err(ArrasError::Config {
                    reason: format!("tsa.endpoint '{}' is not an http(s) URL", endpoint),
                });
            }
        }
        Ok(())
    }
}

/// Connection settings for the qualified timestamp authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TsaConfig {
    /// Provider name recorded on every seal.
    pub provider: String,
    /// When absent, the mock authority is used.
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the bearer API key.
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
}

impl TsaConfig {
    /// The request timeout, clamped to the supported 10–30 s window.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeout_secs
                .clamp(MIN_TSA_TIMEOUT_SECS, MAX_TSA_TIMEOUT_SECS),
        )
    }
}

impl Default for TsaConfig {
    fn default() -> Self {
        Self {
            provider: "mock-tsa".to_string(),
            endpoint: None,
            api_key_env: None,
            timeout_secs: 20,
        }
    }
}

/// How often persistence is retried after a seal has been issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled after every failure.
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 0,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(10);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PiiConfig {
    pub normalization_version: NormalizationVersion,
}
