//! # arras-ledger
//!
//! Per-contract, append-only, SHA-256 hash-chained event ledger for the ARRAS
//! evidence core.
//!
//! ## Overview
//!
//! Every material action on a deposit contract is recorded as an `Event`
//! whose hash commits to its canonical payload, its type, its contract and
//! its predecessor's hash.  Tampering with any stored event, even a single
//! bit, breaks the chain and is detected by `EventLedger::verify_chain`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use arras_ledger::{EventLedger, InMemoryEvidenceStore};
//!
//! let ledger = EventLedger::new(Arc::new(InMemoryEvidenceStore::new()));
//! ledger.append(&contract_id, "ACCEPTED".into(), &json!({"by": "buyer"}), Some("user-9"))?;
//! ledger.verify_chain(&contract_id)?;
//! ```

pub mod chain;
pub mod ledger;
pub mod memory;

pub use chain::{hash_event, recompute_hash, verify_events, BreakReason, ChainBreak};
pub use ledger::EventLedger;
pub use memory::InMemoryEvidenceStore;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration as StdDuration};

    use chrono::{Duration, Utc};
    use serde_json::json;

    use arras_contracts::{
        error::ArrasError,
        event::{Event, EventType},
        ids::{ContractId, EventId},
    };
    use arras_core::{canonical::canonicalize, traits::EvidenceStore};

    use super::{hash_event, verify_events, BreakReason, EventLedger, InMemoryEvidenceStore};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn ledger() -> (Arc<InMemoryEvidenceStore>, EventLedger) {
        let store = Arc::new(InMemoryEvidenceStore::new());
        let ledger = EventLedger::new(store.clone());
        (store, ledger)
    }

    fn contract(id: &str) -> ContractId {
        ContractId::from(id)
    }

    /// Append CREATED, ACCEPTED, SEALED to `contract_id`.
    fn append_lifecycle(ledger: &EventLedger, contract_id: &ContractId) {
        ledger
            .append(contract_id, EventType::from("CREATED"), &json!({"amount": 15000, "currency": "EUR"}), Some("agent-1"))
            .unwrap();
        ledger
            .append(contract_id, EventType::from("ACCEPTED"), &json!({"party": "buyer"}), Some("buyer-7"))
            .unwrap();
        ledger
            .append(contract_id, EventType::from("SEALED"), &json!({"note": "signed"}), None)
            .unwrap();
    }

    /// Flip the lowest bit of the first byte of a hex digest.
    fn flip_bit(hex_digest: &str) -> String {
        let mut bytes = hex::decode(hex_digest).unwrap();
        bytes[0] ^= 0x01;
        hex::encode(bytes)
    }

    fn with_event<F: FnOnce(&mut Event)>(store: &InMemoryEvidenceStore, contract_id: &ContractId, index: usize, f: F) {
        let mut state = store.state.lock().unwrap();
        let chain = state.events.get_mut(contract_id).unwrap();
        f(&mut chain[index]);
    }

    fn broken_index(err: ArrasError) -> u64 {
        match err {
            ArrasError::BrokenChain { index, .. } => index,
            other => panic!("expected BrokenChain, got {:?}", other),
        }
    }

    // ── Chain construction ────────────────────────────────────────────────────

    #[test]
    fn test_lifecycle_chain_verifies() {
        let (_, ledger) = ledger();
        let c = contract("C");
        append_lifecycle(&ledger, &c);

        let report = ledger.verify_chain(&c).unwrap();
        assert_eq!(report.length, 3);
        let events = ledger.events(&c).unwrap();
        assert_eq!(report.head_hash, events[2].hash);
    }

    #[test]
    fn test_genesis_hash() {
        let (_, ledger) = ledger();
        let c = contract("C-genesis");
        let event = ledger.append(&c, EventType::from("CREATED"), &json!({}), None).unwrap();
        assert_eq!(event.prev_hash, Event::GENESIS_HASH);
        assert_eq!(event.sequence, 0);
    }

    #[test]
    fn test_events_link_to_predecessor() {
        let (_, ledger) = ledger();
        let c = contract("C-link");
        append_lifecycle(&ledger, &c);

        let events = ledger.events(&c).unwrap();
        for (idx, pair) in events.windows(2).enumerate() {
            assert_eq!(pair[1].prev_hash, pair[0].hash, "event {} must link to {}", idx + 1, idx);
            assert_eq!(pair[1].sequence, pair[0].sequence + 1);
        }
    }

    #[test]
    fn test_payload_is_stored_canonical() {
        let (_, ledger) = ledger();
        let c = contract("C-canon");
        let event = ledger
            .append(&c, EventType::from("CREATED"), &json!({"b": 1, "a": null, "amount": 10.0}), None)
            .unwrap();
        assert_eq!(event.payload, json!({"amount": 10, "b": 1}));
    }

    #[test]
    fn test_hash_commits_to_type_and_contract() {
        let (_, ledger) = ledger();
        let a = ledger.append(&contract("A"), EventType::from("CREATED"), &json!({"x": 1}), None).unwrap();
        let b = ledger.append(&contract("B"), EventType::from("CREATED"), &json!({"x": 1}), None).unwrap();
        let c = ledger.append(&contract("C2"), EventType::from("OPENED"), &json!({"x": 1}), None).unwrap();
        assert_ne!(a.hash, b.hash, "contract id must be part of the hash");
        assert_ne!(a.hash, c.hash, "event type must be part of the hash");
    }

    #[test]
    fn test_type_and_contract_are_joined_without_separator() {
        // The formula concatenates type and contract id directly, so a
        // shifted boundary yields the same input bytes.
        let payload = canonicalize(&json!({"x": 1})).unwrap();
        let prev = "0".repeat(64);
        let left = hash_event(&contract("B1"), &EventType::from("A"), &payload, &prev);
        let right = hash_event(&contract("1"), &EventType::from("AB"), &payload, &prev);
        assert_eq!(left, right);
    }

    #[test]
    fn test_contracts_are_independent_chains() {
        let (_, ledger) = ledger();
        let a = contract("A");
        let b = contract("B");
        ledger.append(&a, EventType::from("CREATED"), &json!({}), None).unwrap();
        let first_b = ledger.append(&b, EventType::from("CREATED"), &json!({}), None).unwrap();
        ledger.append(&a, EventType::from("ACCEPTED"), &json!({}), None).unwrap();

        assert_eq!(first_b.sequence, 0);
        assert_eq!(first_b.prev_hash, Event::GENESIS_HASH);
        assert_eq!(ledger.verify_chain(&a).unwrap().length, 2);
        assert_eq!(ledger.verify_chain(&b).unwrap().length, 1);
    }

    #[test]
    fn test_malformed_event_type_rejected() {
        let (store, ledger) = ledger();
        let c = contract("C-type");
        let err = ledger.append(&c, EventType::from("accepted"), &json!({}), None).unwrap_err();
        assert!(matches!(err, ArrasError::InvalidRequest { .. }));
        assert!(store.events(&c).unwrap().is_empty());
    }

    #[test]
    fn test_verify_empty() {
        let (_, ledger) = ledger();
        let report = ledger.verify_chain(&contract("nothing")).unwrap();
        assert_eq!(report.length, 0);
        assert_eq!(report.head_hash, Event::GENESIS_HASH);
    }

    // ── Tamper detection ──────────────────────────────────────────────────────

    #[test]
    fn test_flipped_hash_bit_breaks_at_index_1() {
        let (store, ledger) = ledger();
        let c = contract("C");
        append_lifecycle(&ledger, &c);
        ledger.verify_chain(&c).unwrap();

        with_event(&store, &c, 1, |e| e.hash = flip_bit(&e.hash));

        let err = ledger.verify_chain(&c).unwrap_err();
        let expected_id = store.events(&c).unwrap()[1].id;
        match err {
            ArrasError::BrokenChain { index, event_id, .. } => {
                assert_eq!(index, 1);
                assert_eq!(event_id, expected_id);
            }
            other => panic!("expected BrokenChain, got {:?}", other),
        }
    }

    #[test]
    fn test_mutated_payload_breaks_at_that_index() {
        let (store, ledger) = ledger();
        let c = contract("C-payload");
        append_lifecycle(&ledger, &c);

        with_event(&store, &c, 2, |e| e.payload = json!({"note": "forged"}));
        assert_eq!(broken_index(ledger.verify_chain(&c).unwrap_err()), 2);
    }

    #[test]
    fn test_mutated_prev_hash_breaks_at_that_index() {
        let (store, ledger) = ledger();
        let c = contract("C-prev");
        append_lifecycle(&ledger, &c);

        with_event(&store, &c, 0, |e| e.prev_hash = flip_bit(&e.prev_hash));
        assert_eq!(broken_index(ledger.verify_chain(&c).unwrap_err()), 0);
    }

    #[test]
    fn test_rewritten_event_breaks_successor_link() {
        let (store, ledger) = ledger();
        let c = contract("C-rewrite");
        append_lifecycle(&ledger, &c);

        // A forger who recomputes event 1's own hash still breaks event 2's link.
        with_event(&store, &c, 1, |e| {
            e.payload = json!({"party": "seller"});
            e.hash = super::recompute_hash(e).unwrap().hex;
        });
        let events = store.events(&c).unwrap();
        let broken = verify_events(&c, &events).unwrap_err();
        assert_eq!(broken.index, 2);
        assert!(matches!(broken.reason, BreakReason::PrevHashMismatch { .. }));
    }

    #[test]
    fn test_broken_chain_halts_appends_until_released() {
        let (store, ledger) = ledger();
        let c = contract("C-halt");
        append_lifecycle(&ledger, &c);
        with_event(&store, &c, 0, |e| e.hash = flip_bit(&e.hash));

        assert!(ledger.verify_chain(&c).is_err());
        assert!(ledger.is_halted(&c).unwrap());
        let err = ledger.append(&c, EventType::from("ACCEPTED"), &json!({}), None).unwrap_err();
        assert!(matches!(err, ArrasError::ContractHalted { .. }));

        // Other contracts are unaffected.
        ledger.append(&contract("other"), EventType::from("CREATED"), &json!({}), None).unwrap();

        ledger.release_halt(&c).unwrap();
        assert!(!ledger.is_halted(&c).unwrap());
    }

    #[test]
    fn test_verify_loaded_checks_exactly_the_given_rows() {
        let (_, ledger) = ledger();
        let c = contract("C-loaded");
        append_lifecycle(&ledger, &c);

        let mut events = ledger.events(&c).unwrap();
        assert_eq!(ledger.verify_loaded(&c, &events).unwrap().length, 3);

        events[0].payload = json!({"amount": 1, "currency": "EUR"});
        let err = ledger.verify_loaded(&c, &events).unwrap_err();
        assert_eq!(broken_index(err), 0);
        assert!(ledger.is_halted(&c).unwrap());

        // The stored rows are intact; only the loaded copy was forged.
        ledger.release_halt(&c).unwrap();
        assert!(ledger.verify_chain(&c).is_ok());
    }

    #[test]
    fn test_halt_is_checked_under_the_contract_lock() {
        let store = Arc::new(InMemoryEvidenceStore::new());
        let ledger = Arc::new(EventLedger::new(store.clone()));
        let c = contract("C-race");
        ledger.append(&c, EventType::from("CREATED"), &json!({}), None).unwrap();

        let lock = ledger.contract_lock(&c).unwrap();
        let guard = lock.lock().unwrap();
        let writer = {
            let ledger = Arc::clone(&ledger);
            let c = c.clone();
            thread::spawn(move || ledger.append(&c, EventType::from("ACCEPTED"), &json!({}), None))
        };
        // Let the writer queue up on the lock, then halt while it waits.
        thread::sleep(StdDuration::from_millis(50));
        ledger.halted.lock().unwrap().insert(c.clone());
        drop(guard);

        let result = writer.join().unwrap();
        assert!(matches!(result, Err(ArrasError::ContractHalted { .. })));
        assert_eq!(store.events(&c).unwrap().len(), 1);
    }

    #[test]
    fn test_order_ignores_client_timestamps() {
        let (store, ledger) = ledger();
        let c = contract("C-order");
        append_lifecycle(&ledger, &c);

        // Back-dating a stored event changes nothing about its position.
        with_event(&store, &c, 2, |e| e.created_at = Utc::now() - Duration::days(365));
        let events = ledger.events(&c).unwrap();
        assert_eq!(events[2].event_type.as_str(), "SEALED");
        assert!(ledger.verify_chain(&c).is_ok());
    }

    // ── Store compare-and-swap ────────────────────────────────────────────────

    #[test]
    fn test_store_rejects_stale_append() {
        let (store, ledger) = ledger();
        let c = contract("C-cas");
        let first = ledger.append(&c, EventType::from("CREATED"), &json!({}), None).unwrap();
        ledger.append(&c, EventType::from("ACCEPTED"), &json!({}), None).unwrap();

        // A writer that still believes `first` is the head must be refused.
        let mut stale = first.clone();
        stale.id = EventId::new();
        stale.sequence = 1;
        stale.prev_hash = first.hash.clone();
        let err = store.append_event(&stale).unwrap_err();
        assert!(matches!(err, ArrasError::ChainConflict { .. }));
        assert_eq!(store.events(&c).unwrap().len(), 2);
    }

    #[test]
    fn test_failed_persist_appends_nothing() {
        let (store, ledger) = ledger();
        let c = contract("C-fail");
        store.fail_next_writes(1);
        let err = ledger.append(&c, EventType::from("CREATED"), &json!({}), None).unwrap_err();
        assert!(err.is_retryable());
        assert!(store.events(&c).unwrap().is_empty());

        let event = ledger.append(&c, EventType::from("CREATED"), &json!({}), None).unwrap();
        assert_eq!(event.sequence, 0);
    }

    // ── Concurrency ───────────────────────────────────────────────────────────

    #[test]
    fn test_concurrent_appends_form_linear_chain() {
        const WRITERS: usize = 16;
        const PER_WRITER: usize = 8;

        let store = Arc::new(InMemoryEvidenceStore::new());
        let ledger = Arc::new(EventLedger::new(store.clone()));
        let c = contract("C-concurrent");

        let handles: Vec<_> = (0..WRITERS)
            .map(|w| {
                let ledger = Arc::clone(&ledger);
                let c = c.clone();
                thread::spawn(move || {
                    for i in 0..PER_WRITER {
                        ledger
                            .append(&c, EventType::from("NOTE"), &json!({"writer": w, "i": i}), None)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let report = ledger.verify_chain(&c).unwrap();
        assert_eq!(report.length, (WRITERS * PER_WRITER) as u64);

        let events = store.events(&c).unwrap();
        let distinct_prev: std::collections::HashSet<&str> =
            events.iter().map(|e| e.prev_hash.as_str()).collect();
        assert_eq!(distinct_prev.len(), events.len(), "no two events may share a predecessor");
    }

    #[test]
    fn test_idle_contract_locks_are_released() {
        let (_, ledger) = ledger();
        for i in 0..50 {
            ledger
                .append(&contract(&format!("C-{}", i)), EventType::from("CREATED"), &json!({}), None)
                .unwrap();
        }
        assert!(ledger.locks.lock().unwrap().len() <= 1);
    }
}
