//! Error types for the ARRAS evidence core.
//!
//! Every public operation returns `ArrasResult<T>`.  No untyped error crosses
//! the core boundary: each variant names one failure class and carries the
//! context needed to act on it.

use thiserror::Error;

use crate::{
    ids::{ContractId, EventId},
    seal::{Seal, TimestampFailureKind},
};

/// The unified error type for the ARRAS evidence core.
#[derive(Debug, Error)]
pub enum ArrasError {
    /// A value could not be encoded canonically.  Always a caller bug.
    #[error("canonicalization error: {reason}")]
    Canonicalization { reason: String },

    /// The timestamp authority did not issue a seal.
    #[error("sealing failed ({kind}): {message}")]
    SealingFailed {
        kind: TimestampFailureKind,
        message: String,
    },

    /// Chain verification found a stored event that does not match its
    /// recomputed hash or does not link to its predecessor.
    #[error("broken chain for contract '{contract_id}' at index {index} (event {event_id}): {reason}")]
    BrokenChain {
        contract_id: ContractId,
        event_id: EventId,
        index: u64,
        reason: String,
    },

    /// Appends to a contract are suspended after a broken chain was detected.
    #[error("contract '{contract_id}' is halted pending investigation of a broken chain")]
    ContractHalted { contract_id: ContractId },

    /// The store refused an append because its head moved.
    #[error("chain conflict for contract '{contract_id}': expected head {expected}, found {found}")]
    ChainConflict {
        contract_id: ContractId,
        expected: String,
        found: String,
    },

    /// Storage failed.  When a seal had already been issued it is carried
    /// here so the caller can persist it later; it must never be dropped.
    #[error("persistence error: {reason}")]
    Persistence {
        reason: String,
        seal: Option<Box<Seal>>,
    },

    /// The caller cancelled before a seal was requested.  Nothing was written.
    #[error("operation cancelled before sealing")]
    Cancelled,

    /// A request failed validation before any work was done.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// A personal-data value could not be normalized.
    #[error("pii normalization error: {reason}")]
    Pii { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl ArrasError {
    /// Wraps a storage failure, without a seal.
    pub fn persistence(reason: impl Into<String>) -> Self {
        Self::Persistence {
            reason: reason.into(),
            seal: None,
        }
    }

    /// The issued seal carried by a persistence error, if any.
    pub fn unpersisted_seal(&self) -> Option<&Seal> {
        match self {
            Self::Persistence { seal, .. } => seal.as_deref(),
            _ => None,
        }
    }

    /// True for storage failures that may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}

/// Convenience alias used throughout the ARRAS crates.
pub type ArrasResult<T> = Result<T, ArrasError>;
