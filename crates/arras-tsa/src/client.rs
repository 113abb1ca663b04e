//! The timestamp client: turns one digest into one `Seal`.
//!
//! `TimestampClient` is the only place a `Seal` is constructed.  It sends
//! exactly one request per call and never retries; a caller that wants to
//! retry sealing must call again and accept a second, independent seal.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use arras_contracts::{
    digest::Digest,
    error::ArrasError,
    ids::SealId,
    seal::{Seal, SealStatus, SealToken, TimestampFailureKind},
};
use arras_core::traits::{TimestampAuthority, TimestampFailure, TimestampRequest, TimestampResponse};

/// A timestamp request that did not produce an issued seal.
///
/// `attempted` is the FAILED seal describing the request.  It is for logs
/// only and must never be persisted or referenced.
#[derive(Debug, Clone, Error)]
#[error("sealing failed ({kind}): {message}")]
pub struct SealingFailure {
    pub kind: TimestampFailureKind,
    pub message: String,
    pub attempted: Seal,
}

impl From<SealingFailure> for ArrasError {
    fn from(failure: SealingFailure) -> Self {
        ArrasError::SealingFailed {
            kind: failure.kind,
            message: failure.message,
        }
    }
}

/// Seals digests against one timestamp authority.
#[derive(Clone)]
pub struct TimestampClient {
    authority: Arc<dyn TimestampAuthority>,
}

impl TimestampClient {
    pub fn new(authority: Arc<dyn TimestampAuthority>) -> Self {
        Self { authority }
    }

    pub fn provider(&self) -> &str {
        self.authority.provider()
    }

    /// Request a seal over `digest`.
    ///
    /// Blocks for at most the authority's bounded timeout.  The returned seal
    /// is always `SealStatus::Issued`; every other outcome is a
    /// `SealingFailure`.
    pub fn seal(&self, digest: &Digest) -> Result<Seal, SealingFailure> {
        let request = TimestampRequest {
            hash: digest.hex.clone(),
            hash_algorithm: digest.algorithm,
        };

        let outcome = self
            .authority
            .timestamp(&request)
            .and_then(|response| check_response(&request, response));

        match outcome {
            Ok(response) => {
                let seal = Seal {
                    id: SealId::new(),
                    provider: response.provider,
                    mark: response.mark,
                    input_hash: request.hash,
                    hash_algorithm: request.hash_algorithm,
                    token: SealToken::from_encoded(response.token),
                    issued_at: response.issued_at,
                    status: SealStatus::Issued,
                    serial_number: response.serial_number,
                    authority_key_id: response.authority_key_id,
                    authority_name: response.authority_name,
                    policy_oid: response.policy_oid,
                };
                info!(
                    seal_id = %seal.id,
                    provider = %seal.provider,
                    input_hash = %seal.input_hash,
                    "seal issued"
                );
                Ok(seal)
            }
            Err(failure) => {
                warn!(
                    provider = %self.authority.provider(),
                    input_hash = %request.hash,
                    kind = %failure.kind,
                    message = %failure.message,
                    "seal request failed"
                );
                Err(self.failed(request, failure))
            }
        }
    }

    fn failed(&self, request: TimestampRequest, failure: TimestampFailure) -> SealingFailure {
        let attempted = Seal {
            id: SealId::new(),
            provider: self.authority.provider().to_string(),
            mark: String::new(),
            input_hash: request.hash,
            hash_algorithm: request.hash_algorithm,
            token: SealToken::empty(),
            issued_at: Utc::now(),
            status: SealStatus::Failed,
            serial_number: None,
            authority_key_id: None,
            authority_name: None,
            policy_oid: None,
        };
        SealingFailure {
            kind: failure.kind,
            message: failure.message,
            attempted,
        }
    }
}

/// Reject answers that cannot back a seal: an empty or non-base64 token, or
/// an echoed digest other than the one requested.
fn check_response(
    request: &TimestampRequest,
    response: TimestampResponse,
) -> Result<TimestampResponse, TimestampFailure> {
    if response.token.is_empty() {
        return Err(TimestampFailure::new(
            TimestampFailureKind::InvalidResponse,
            "authority returned an empty token",
        ));
    }
    if let Err(e) = STANDARD.decode(response.token.as_bytes()) {
        return Err(TimestampFailure::new(
            TimestampFailureKind::InvalidResponse,
            format!("token is not valid base64: {}", e),
        ));
    }
    if let Some(echoed) = &response.hash {
        if !echoed.eq_ignore_ascii_case(&request.hash) {
            return Err(TimestampFailure::new(
                TimestampFailureKind::InvalidResponse,
                format!("authority stamped {} instead of {}", echoed, request.hash),
            ));
        }
    }
    Ok(response)
}
