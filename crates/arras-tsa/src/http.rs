//! HTTP/JSON timestamp authority.
//!
//! Wire format:
//!
//! ```text
//! POST <endpoint>
//! Authorization: Bearer <key>            (when configured)
//! {"hash": "<hex>", "hash_algorithm": "sha256"}
//!
//! 200 {"provider": "...", "mark": "...", "token": "<base64>",
//!      "issued_at": "<rfc3339>", "serial_number": "...", "hash": "<hex>", ...}
//! ```
//!
//! Status and body classification live in pure functions so they can be
//! tested without a network.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use arras_contracts::{
    config::TsaConfig,
    error::{ArrasError, ArrasResult},
    seal::TimestampFailureKind,
};
use arras_core::traits::{TimestampAuthority, TimestampFailure, TimestampRequest, TimestampResponse};

/// Longest body excerpt copied into a failure message.
const EXCERPT_LEN: usize = 200;

pub struct HttpTimestampAuthority {
    provider: String,
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpTimestampAuthority {
    pub fn new(
        provider: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> ArrasResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("arras-tsa/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ArrasError::Config {
                reason: format!("failed to build timestamp HTTP client: {}", e),
            })?;
        Ok(Self {
            provider: provider.into(),
            endpoint: endpoint.into(),
            api_key,
            client,
        })
    }

    /// Build from `[tsa]` configuration.
    ///
    /// Requires `endpoint`.  When `api_key_env` is set the named environment
    /// variable must be present.
    pub fn from_config(config: &TsaConfig) -> ArrasResult<Self> {
        let endpoint = config.endpoint.as_deref().ok_or_else(|| ArrasError::Config {
            reason: "tsa.endpoint is required for the HTTP timestamp authority".to_string(),
        })?;
        let api_key = match &config.api_key_env {
            Some(var) => Some(std::env::var(var).map_err(|_| ArrasError::Config {
                reason: format!("environment variable '{}' named by tsa.api_key_env is not set", var),
            })?),
            None => None,
        };
        Self::new(config.provider.clone(), endpoint, api_key, config.timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl TimestampAuthority for HttpTimestampAuthority {
    fn timestamp(&self, request: &TimestampRequest) -> Result<TimestampResponse, TimestampFailure> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().map_err(classify_transport)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(classify_transport)?;
        debug!(endpoint = %self.endpoint, status, "timestamp authority answered");

        if let Some(failure) = classify_status(status, &body) {
            return Err(failure);
        }
        parse_response_body(&self.provider, &body)
    }

    fn provider(&self) -> &str {
        &self.provider
    }
}

/// Map a request that did not complete.
fn classify_transport(err: reqwest::Error) -> TimestampFailure {
    let kind = if err.is_timeout() {
        TimestampFailureKind::Timeout
    } else {
        TimestampFailureKind::Transport
    };
    TimestampFailure::new(kind, err.to_string())
}

/// Map a non-success HTTP status, or `None` for 2xx.
pub fn classify_status(status: u16, body: &str) -> Option<TimestampFailure> {
    let kind = match status {
        200..=299 => return None,
        408 => TimestampFailureKind::Timeout,
        400..=499 => TimestampFailureKind::Rejected,
        500..=599 => TimestampFailureKind::Transport,
        _ => TimestampFailureKind::InvalidResponse,
    };
    Some(TimestampFailure::new(
        kind,
        format!("HTTP {}: {}", status, excerpt(body)),
    ))
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    status: Option<String>,
    message: Option<String>,
    provider: Option<String>,
    mark: Option<String>,
    token: Option<String>,
    issued_at: Option<String>,
    serial_number: Option<String>,
    authority_key_id: Option<String>,
    authority_name: Option<String>,
    policy_oid: Option<String>,
    hash: Option<String>,
}

/// Parse a 2xx body into a response.
///
/// `{"status": "rejected"}` is a refusal even under a 2xx status.  The token
/// string is returned exactly as it appears in the body.
pub fn parse_response_body(
    default_provider: &str,
    body: &str,
) -> Result<TimestampResponse, TimestampFailure> {
    let wire: WireResponse = serde_json::from_str(body).map_err(|e| {
        TimestampFailure::new(
            TimestampFailureKind::InvalidResponse,
            format!("malformed response body: {}", e),
        )
    })?;

    if wire
        .status
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case("rejected"))
    {
        return Err(TimestampFailure::new(
            TimestampFailureKind::Rejected,
            wire.message.unwrap_or_else(|| "authority rejected the request".to_string()),
        ));
    }

    let token = required(wire.token, "token")?;
    let mark = required(wire.mark, "mark")?;
    let issued_at = required(wire.issued_at, "issued_at")?;
    let issued_at = DateTime::parse_from_rfc3339(&issued_at)
        .map_err(|e| {
            TimestampFailure::new(
                TimestampFailureKind::InvalidResponse,
                format!("issued_at '{}' is not RFC 3339: {}", issued_at, e),
            )
        })?
        .with_timezone(&Utc);

    Ok(TimestampResponse {
        provider: wire.provider.unwrap_or_else(|| default_provider.to_string()),
        mark,
        token,
        issued_at,
        serial_number: wire.serial_number,
        authority_key_id: wire.authority_key_id,
        authority_name: wire.authority_name,
        policy_oid: wire.policy_oid,
        hash: wire.hash,
    })
}

fn required(value: Option<String>, field: &str) -> Result<String, TimestampFailure> {
    value.ok_or_else(|| {
        TimestampFailure::new(
            TimestampFailureKind::InvalidResponse,
            format!("response is missing '{}'", field),
        )
    })
}

fn excerpt(body: &str) -> String {
    body.chars().take(EXCERPT_LEN).collect()
}
