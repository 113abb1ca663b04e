//! Seals issued by a qualified timestamp authority.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{digest::HashAlgorithm, ids::SealId};

/// Whether the authority actually issued a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SealStatus {
    Issued,
    /// Never persisted and never referenced; exists only inside a sealing error.
    Failed,
}

/// An opaque timestamp token in the exact encoding the authority returned.
///
/// Independent verification against the authority needs the token reproduced
/// byte for byte, so the received string is stored untouched and decoded only
/// on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealToken(String);

impl SealToken {
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    /// The token as received (base64).
    pub fn encoded(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A timestamp seal over a single digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seal {
    pub id: SealId,
    /// Name of the authority (QTSP) that handled the request.
    pub provider: String,
    /// Authority-specific qualification mark, e.g. `"qualified-tst"`.
    pub mark: String,
    /// Hex digest that was sent for sealing.
    pub input_hash: String,
    pub hash_algorithm: HashAlgorithm,
    pub token: SealToken,
    pub issued_at: DateTime<Utc>,
    pub status: SealStatus,
    pub serial_number: Option<String>,
    pub authority_key_id: Option<String>,
    pub authority_name: Option<String>,
    pub policy_oid: Option<String>,
}

impl Seal {
    pub fn is_issued(&self) -> bool {
        self.status == SealStatus::Issued
    }
}

/// Why a timestamp request did not produce a seal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimestampFailureKind {
    /// The bounded timeout elapsed before the authority answered.
    Timeout,
    /// The authority answered and refused the request.
    Rejected,
    /// The request never completed at the network level.
    Transport,
    /// The authority answered with something that is not a usable token.
    InvalidResponse,
}

impl fmt::Display for TimestampFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Timeout => "TIMEOUT",
            Self::Rejected => "REJECTED",
            Self::Transport => "TRANSPORT",
            Self::InvalidResponse => "INVALID_RESPONSE",
        };
        f.write_str(s)
    }
}
