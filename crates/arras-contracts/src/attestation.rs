//! Mandate attestations: sealed grants of authority.
//!
//! An `Attestation` row exists only together with the issued seal it
//! references.  There is no persisted "pending" or "aborted" attestation: a
//! request that fails to seal leaves no trace in storage.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    digest::HashAlgorithm,
    ids::{AttestationId, ContractId, SealId},
    pii::{HashedPii, NormalizationVersion},
};

/// The authority being granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MandateType {
    /// Act on behalf of the grantor in contract negotiations.
    Representation,
    /// Sign the deposit contract in the grantor's name.
    Signature,
    /// Receive or release the deposit amount.
    DepositManagement,
    /// Submit documents to the contract file.
    DocumentSubmission,
}

impl fmt::Display for MandateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Representation => "REPRESENTATION",
            Self::Signature => "SIGNATURE",
            Self::DepositManagement => "DEPOSIT_MANAGEMENT",
            Self::DocumentSubmission => "DOCUMENT_SUBMISSION",
        };
        f.write_str(s)
    }
}

/// A party in a mandate, by contractual role and opaque application id.
///
/// Example: `PartyRef { role: "buyer", id: "party-17" }`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyRef {
    pub role: String,
    pub id: String,
}

impl PartyRef {
    pub fn new(role: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for PartyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttestationStatus {
    Active,
    Revoked,
}

/// Personal data of the grantor, hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedSubject {
    pub name: HashedPii,
    pub email: HashedPii,
    pub document_number: HashedPii,
}

/// Request context of the grant, hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedContext {
    pub ip_address: Option<HashedPii>,
    pub user_agent: Option<HashedPii>,
}

/// A persisted, sealed mandate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub id: AttestationId,
    pub contract_id: ContractId,
    pub grantor: PartyRef,
    pub grantee: PartyRef,
    pub mandate_type: MandateType,
    pub subject: HashedSubject,
    pub context: HashedContext,
    pub normalization_version: NormalizationVersion,
    /// Hash of the canonical attestation payload that was sealed.
    pub payload_hash: String,
    pub hash_algorithm: HashAlgorithm,
    pub seal_id: SealId,
    pub status: AttestationStatus,
    pub created_at: DateTime<Utc>,
}

impl Attestation {
    pub fn is_active(&self) -> bool {
        self.status == AttestationStatus::Active
    }
}
