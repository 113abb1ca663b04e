//! Trait definitions for the two external collaborators of the core.
//!
//! - `EvidenceStore`: storage owned by the application, injected
//!   explicitly; the core never reaches for a global client
//! - `TimestampAuthority`: the qualified timestamp service (QTSP)
//!
//! Both are trust boundaries.  The store is trusted to make each call atomic;
//! the authority is trusted for nothing except the token it returns, which is
//! kept verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use arras_contracts::{
    attestation::Attestation,
    certificate::Certificate,
    digest::HashAlgorithm,
    error::ArrasResult,
    event::Event,
    evidence::EvidenceRecord,
    ids::{ContractId, SealId},
    seal::{Seal, TimestampFailureKind},
    storage::{AttestationBundle, CertificateBundle, ContractSnapshot},
};

/// Storage for everything the core writes and the application rows it reads.
///
/// Every write method is atomic: the rows it receives become visible
/// together or not at all.  Writes that contain an `Event` must be rejected
/// with `ArrasError::ChainConflict` unless the event's `sequence` and
/// `prev_hash` extend the contract's current head.
pub trait EvidenceStore: Send + Sync {
    /// The contract's most recent event in ledger order, if any.
    fn last_event(&self, contract_id: &ContractId) -> ArrasResult<Option<Event>>;

    /// Append one event.
    fn append_event(&self, event: &Event) -> ArrasResult<()>;

    /// All events of the contract in ledger order.
    fn events(&self, contract_id: &ContractId) -> ArrasResult<Vec<Event>>;

    /// Persist seal, attestation, evidence and event together.
    fn persist_attestation(&self, bundle: &AttestationBundle) -> ArrasResult<()>;

    /// Persist certificate, event and (when sealed) seal and evidence together.
    fn persist_certificate(&self, bundle: &CertificateBundle) -> ArrasResult<()>;

    /// A consistent read of everything recorded for the contract.
    ///
    /// No row written concurrently may be half-visible in the result.
    fn snapshot(&self, contract_id: &ContractId) -> ArrasResult<ContractSnapshot>;

    fn seal(&self, id: &SealId) -> ArrasResult<Option<Seal>>;

    fn attestations(&self, contract_id: &ContractId) -> ArrasResult<Vec<Attestation>>;

    fn certificates(&self, contract_id: &ContractId) -> ArrasResult<Vec<Certificate>>;

    fn evidence(&self, contract_id: &ContractId) -> ArrasResult<Vec<EvidenceRecord>>;
}

/// A request for a timestamp over one digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampRequest {
    /// Hex digest.
    pub hash: String,
    pub hash_algorithm: HashAlgorithm,
}

/// A successful answer from the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampResponse {
    pub provider: String,
    pub mark: String,
    /// Base64 token exactly as received.
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub serial_number: Option<String>,
    pub authority_key_id: Option<String>,
    pub authority_name: Option<String>,
    pub policy_oid: Option<String>,
    /// The digest the authority says it stamped, when it echoes one.
    pub hash: Option<String>,
}

/// A typed failure from the authority.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TimestampFailure {
    pub kind: TimestampFailureKind,
    pub message: String,
}

impl TimestampFailure {
    pub fn new(kind: TimestampFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A qualified timestamp authority.
///
/// Implementations make exactly one bounded, blocking request per call.  They
/// never retry, batch or cache; retry policy belongs to the caller.
pub trait TimestampAuthority: Send + Sync {
    fn timestamp(&self, request: &TimestampRequest) -> Result<TimestampResponse, TimestampFailure>;

    /// Provider name for logging.
    fn provider(&self) -> &str;
}
