//! Evidence records: the link between a hashed artifact and its seal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    digest::HashAlgorithm,
    ids::{ContractId, EvidenceId, SealId},
};

/// What kind of artifact an evidence record vouches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactKind {
    /// The canonical payload of a mandate attestation.
    AttestationPayload,
    /// The canonical rendering of a certificate.
    RenderedCertificate,
}

/// Binds one artifact hash to exactly one issued seal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: EvidenceId,
    pub contract_id: ContractId,
    pub artifact_hash: String,
    pub hash_algorithm: HashAlgorithm,
    pub artifact_kind: ArtifactKind,
    pub seal_id: SealId,
    pub created_at: DateTime<Utc>,
}
