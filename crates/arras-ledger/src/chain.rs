//! Hash-chain primitives: event hashing and chain verification.
//!
//! Hash input layout (bytes, in order):
//!   1. canonical encoding of the payload
//!   2. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   3. event type as UTF-8 bytes
//!   4. contract id as UTF-8 bytes
//!
//! No delimiter separates the parts; only prev_hash has a fixed width.
//!
//! These functions are pure so that any third party holding the rows can
//! re-run verification without the ledger.

use std::fmt;

use arras_contracts::{
    digest::Digest,
    event::{ChainReport, Event, EventType},
    ids::{ContractId, EventId},
};
use arras_core::{
    canonical::{canonicalize, CanonicalBytes},
    hash::hash_parts,
};

/// Compute the hash of an event from its constituent parts.
pub fn hash_event(
    contract_id: &ContractId,
    event_type: &EventType,
    payload: &CanonicalBytes,
    prev_hash: &str,
) -> Digest {
    hash_parts(&[
        payload.as_bytes(),
        prev_hash.as_bytes(),
        event_type.as_str().as_bytes(),
        contract_id.as_str().as_bytes(),
    ])
}

/// Recompute a stored event's hash from its stored payload and links.
pub fn recompute_hash(event: &Event) -> Result<Digest, String> {
    let payload = canonicalize(&event.payload).map_err(|e| e.to_string())?;
    Ok(hash_event(
        &event.contract_id,
        &event.event_type,
        &payload,
        &event.prev_hash,
    ))
}

/// What exactly is wrong with the event at a break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakReason {
    /// The event belongs to a different contract.
    ForeignContract { found: ContractId },
    /// The stored sequence is not the event's position in the chain.
    SequenceGap { expected: u64, found: u64 },
    /// `prev_hash` does not equal the predecessor's hash.
    PrevHashMismatch { expected: String, found: String },
    /// The stored hash does not match the recomputed one.
    HashMismatch { stored: String, recomputed: String },
    /// The stored payload can no longer be canonicalized.
    Unencodable(String),
}

impl fmt::Display for BreakReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForeignContract { found } => write!(f, "event belongs to contract '{}'", found),
            Self::SequenceGap { expected, found } => {
                write!(f, "sequence {} found where {} was expected", found, expected)
            }
            Self::PrevHashMismatch { expected, found } => {
                write!(f, "prev_hash {} does not link to predecessor {}", found, expected)
            }
            Self::HashMismatch { stored, recomputed } => {
                write!(f, "stored hash {} differs from recomputed {}", stored, recomputed)
            }
            Self::Unencodable(reason) => write!(f, "payload cannot be canonicalized: {}", reason),
        }
    }
}

/// The first point where a chain fails verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBreak {
    /// Position of the offending event in ledger order.
    pub index: u64,
    pub event_id: EventId,
    pub reason: BreakReason,
}

/// Verify a contract's events, given in ledger order.
///
/// Every event must belong to `contract_id`, carry its own position as
/// `sequence`, link to its predecessor (or genesis), and hash to its stored
/// `hash`.  Verification stops at the first violation.  An empty chain is
/// valid.
pub fn verify_events(contract_id: &ContractId, events: &[Event]) -> Result<ChainReport, ChainBreak> {
    let mut expected_prev = Event::GENESIS_HASH.to_string();

    for (index, event) in events.iter().enumerate() {
        let index = index as u64;
        let broken = |reason| ChainBreak {
            index,
            event_id: event.id,
            reason,
        };

        if &event.contract_id != contract_id {
            return Err(broken(BreakReason::ForeignContract {
                found: event.contract_id.clone(),
            }));
        }

        if event.sequence != index {
            return Err(broken(BreakReason::SequenceGap {
                expected: index,
                found: event.sequence,
            }));
        }

        if event.prev_hash != expected_prev {
            return Err(broken(BreakReason::PrevHashMismatch {
                expected: expected_prev,
                found: event.prev_hash.clone(),
            }));
        }

        let recomputed = recompute_hash(event).map_err(|e| broken(BreakReason::Unencodable(e)))?;
        if recomputed.algorithm != event.hash_algorithm || recomputed.hex != event.hash {
            return Err(broken(BreakReason::HashMismatch {
                stored: event.hash.clone(),
                recomputed: recomputed.hex,
            }));
        }

        expected_prev = event.hash.clone();
    }

    Ok(ChainReport {
        contract_id: contract_id.clone(),
        length: events.len() as u64,
        head_hash: expected_prev,
    })
}
