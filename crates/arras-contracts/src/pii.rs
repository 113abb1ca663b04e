//! Hashed personal data as it is stored.
//!
//! The normalization procedures themselves live in `arras-core::pii`; this
//! module only defines the stored shape so entity rows can carry it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// The categories of personal data the core hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiField {
    Name,
    Email,
    DocumentNumber,
    IpAddress,
    UserAgent,
}

impl fmt::Display for PiiField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::DocumentNumber => "document_number",
            Self::IpAddress => "ip_address",
            Self::UserAgent => "user_agent",
        };
        f.write_str(s)
    }
}

/// Version tag of a normalization procedure.
///
/// Hashes produced under different versions are not comparable, so the tag is
/// stored beside every hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NormalizationVersion {
    #[serde(rename = "pii-norm-v1")]
    V1,
    #[serde(rename = "pii-norm-v2")]
    V2,
}

impl NormalizationVersion {
    pub const CURRENT: NormalizationVersion = NormalizationVersion::V2;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "pii-norm-v1",
            Self::V2 => "pii-norm-v2",
        }
    }
}

impl Default for NormalizationVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for NormalizationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The hash of one normalized personal-data value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedPii {
    pub field: PiiField,
    pub digest: Digest,
    pub normalization_version: NormalizationVersion,
    /// Last four characters of a normalized document number, for human
    /// reference.  Always `None` for other fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last4: Option<String>,
}

impl HashedPii {
    /// Two hashes may be compared only when they hash the same field under the
    /// same normalization version and algorithm.
    pub fn comparable_with(&self, other: &HashedPii) -> bool {
        self.field == other.field
            && self.normalization_version == other.normalization_version
            && self.digest.algorithm == other.digest.algorithm
    }

    /// True when both values are comparable and hash to the same digest.
    pub fn matches(&self, other: &HashedPii) -> bool {
        self.comparable_with(other) && self.digest == other.digest
    }
}
