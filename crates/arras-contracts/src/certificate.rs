//! Evidentiary certificates.
//!
//! A certificate is a sealed (or, when the authority is unavailable, unsealed)
//! snapshot of everything recorded for a contract.  Certificates are
//! append-only: generating again produces a new row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    digest::HashAlgorithm,
    ids::{CertificateId, ContractId, SealId},
};

/// Evidentiary strength of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateStatus {
    /// Rendered hash carries a qualified timestamp.
    Sealed,
    /// The timestamp request failed; the hash is still chained in the ledger.
    Unsealed,
}

/// Number of rows of each kind included in a certificate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub events: u64,
    pub communications: u64,
    pub documents: u64,
    pub attestations: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub contract_id: ContractId,
    pub generated_at: DateTime<Utc>,
    pub rendered_hash: String,
    pub hash_algorithm: HashAlgorithm,
    pub status: CertificateStatus,
    /// Present exactly when `status` is `Sealed`.
    pub seal_id: Option<SealId>,
    pub summary_counts: SummaryCounts,
}
