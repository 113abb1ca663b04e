//! Ledger event types.
//!
//! `Event` is a single entry in a contract's hash chain.  Events are created
//! only by the event ledger and are never modified after they are written.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    digest::HashAlgorithm,
    ids::{ContractId, EventId},
};

/// Discriminant of an event, written in SCREAMING_SNAKE_CASE.
///
/// The application is free to introduce its own types (`"ACCEPTED"`,
/// `"DOCUMENT_UPLOADED"`, ...).  The core appends the two types defined as
/// associated constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(pub String);

impl EventType {
    pub const MANDATE_GRANTED: &'static str = "MANDATE_GRANTED";
    pub const CERTIFICATE_GENERATED: &'static str = "CERTIFICATE_GENERATED";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the type is non-empty and uses only `A-Z`, `0-9` and `_`.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One immutable entry in a contract's SHA-256 hash chain.
///
/// `hash` commits to the canonical payload, the predecessor's hash, the event
/// type and the contract id.  Changing any of them breaks `hash` and every
/// later `prev_hash`, which chain verification detects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,

    pub contract_id: ContractId,

    /// Ledger-assigned position in the contract's chain, starting at 0.
    /// This is the only ordering key for events; `created_at` is informative.
    pub sequence: u64,

    pub event_type: EventType,

    /// The payload exactly as it was canonicalized for hashing.
    pub payload: serde_json::Value,

    /// Opaque reference to whoever triggered the event, if known.
    pub actor: Option<String>,

    /// Hex hash of this event.
    pub hash: String,

    pub hash_algorithm: HashAlgorithm,

    /// Hex hash of the previous event, or `Event::GENESIS_HASH`.
    pub prev_hash: String,

    pub created_at: DateTime<Utc>,
}

impl Event {
    /// The `prev_hash` of the first event of every contract.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";

    pub fn is_genesis(&self) -> bool {
        self.sequence == 0
    }
}

/// The current head of a contract's chain, as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHead {
    /// Sequence the next event must take.
    pub next_sequence: u64,
    /// Hash the next event must link to.
    pub last_hash: String,
}

impl ChainHead {
    pub fn genesis() -> Self {
        Self {
            next_sequence: 0,
            last_hash: Event::GENESIS_HASH.to_string(),
        }
    }

    /// The head that follows `last`, or genesis for an empty chain.
    pub fn after(last: Option<&Event>) -> Self {
        match last {
            Some(event) => Self {
                next_sequence: event.sequence + 1,
                last_hash: event.hash.clone(),
            },
            None => Self::genesis(),
        }
    }
}

/// Result of a successful chain verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    pub contract_id: ContractId,
    pub length: u64,
    /// Hash of the last event, or the genesis constant for an empty chain.
    pub head_hash: String,
}
