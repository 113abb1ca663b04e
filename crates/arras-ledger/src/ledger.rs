//! The event ledger: per-contract, append-only hash chains.
//!
//! `EventLedger` is the only component that assigns event order and computes
//! event hashes.  Concurrent appends to the same contract are serialized by a
//! per-contract lock held around halt-check → read-head → hash → persist;
//! appends to different contracts never contend.  The store's
//! compare-and-swap on the chain head rejects any write that slipped past the
//! lock (for example from a second ledger instance over the same store).
//!
//! A contract whose chain fails verification is halted: further appends are
//! refused with `ArrasError::ContractHalted` until an operator calls
//! `release_halt`.  Verification holds the same per-contract lock as append,
//! so no append can land between a break being found and the halt taking
//! effect.
//!
//! Lock entries are dropped from the table once no caller holds them, so the
//! table is bounded by the number of contracts with an operation in flight.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use arras_contracts::{
    error::{ArrasError, ArrasResult},
    event::{ChainHead, ChainReport, Event, EventType},
    ids::{ContractId, EventId},
};
use arras_core::{
    canonical::{canonical_value, canonicalize},
    traits::EvidenceStore,
};

use crate::chain::{hash_event, verify_events};

/// Per-contract hash-chained event ledger over an injected store.
pub struct EventLedger {
    store: Arc<dyn EvidenceStore>,
    pub(crate) locks: Mutex<HashMap<ContractId, Arc<Mutex<()>>>>,
    pub(crate) halted: Mutex<HashSet<ContractId>>,
}

impl EventLedger {
    pub fn new(store: Arc<dyn EvidenceStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
            halted: Mutex::new(HashSet::new()),
        }
    }

    /// The store this ledger writes to.
    pub fn store(&self) -> &Arc<dyn EvidenceStore> {
        &self.store
    }

    /// Append one event to the contract's chain.
    ///
    /// The payload is canonicalized, hashed together with the predecessor's
    /// hash, the event type and the contract id, and persisted atomically.
    pub fn append<P: Serialize + ?Sized>(
        &self,
        contract_id: &ContractId,
        event_type: EventType,
        payload: &P,
        actor: Option<&str>,
    ) -> ArrasResult<Event> {
        self.append_with(contract_id, event_type, payload, actor, |event| {
            self.store.append_event(event)
        })
    }

    /// Build the next event and hand it to `persist`.
    ///
    /// `persist` runs while the contract's lock is held and must write the
    /// event (typically together with other rows) in one atomic store call.
    /// If it fails, nothing is considered appended and the error is returned
    /// unchanged.
    pub fn append_with<P, F>(
        &self,
        contract_id: &ContractId,
        event_type: EventType,
        payload: &P,
        actor: Option<&str>,
        persist: F,
    ) -> ArrasResult<Event>
    where
        P: Serialize + ?Sized,
        F: FnOnce(&Event) -> ArrasResult<()>,
    {
        if !event_type.is_well_formed() {
            return Err(ArrasError::InvalidRequest {
                reason: format!("event type '{}' is not SCREAMING_SNAKE_CASE", event_type),
            });
        }

        // Canonicalization does not depend on the chain, so it stays outside
        // the critical section.
        let payload = canonical_value(payload)?;
        let canonical = canonicalize(&payload)?;

        let lock = self.contract_lock(contract_id)?;
        let _guard = lock.lock().map_err(|e| {
            ArrasError::persistence(format!("ledger lock for '{}' poisoned: {}", contract_id, e))
        })?;
        self.ensure_not_halted(contract_id)?;

        let head = ChainHead::after(self.store.last_event(contract_id)?.as_ref());
        let digest = hash_event(contract_id, &event_type, &canonical, &head.last_hash);

        let event = Event {
            id: EventId::new(),
            contract_id: contract_id.clone(),
            sequence: head.next_sequence,
            event_type,
            payload,
            actor: actor.map(str::to_string),
            hash: digest.hex,
            hash_algorithm: digest.algorithm,
            prev_hash: head.last_hash,
            created_at: Utc::now(),
        };

        persist(&event)?;

        info!(
            contract_id = %contract_id,
            sequence = event.sequence,
            event_type = %event.event_type,
            hash = %event.hash,
            "event appended"
        );
        Ok(event)
    }

    /// Verify the contract's whole chain.
    ///
    /// On the first mismatch the contract is halted and
    /// `ArrasError::BrokenChain` names the offending event.
    pub fn verify_chain(&self, contract_id: &ContractId) -> ArrasResult<ChainReport> {
        let lock = self.contract_lock(contract_id)?;
        let _guard = lock.lock().map_err(|e| {
            ArrasError::persistence(format!("ledger lock for '{}' poisoned: {}", contract_id, e))
        })?;
        let events = self.store.events(contract_id)?;
        self.check_events(contract_id, &events)
    }

    /// Verify rows the caller already holds, such as a snapshot's events.
    ///
    /// Behaves like `verify_chain` on exactly `events`: a break halts the
    /// contract.
    pub fn verify_loaded(&self, contract_id: &ContractId, events: &[Event]) -> ArrasResult<ChainReport> {
        let lock = self.contract_lock(contract_id)?;
        let _guard = lock.lock().map_err(|e| {
            ArrasError::persistence(format!("ledger lock for '{}' poisoned: {}", contract_id, e))
        })?;
        self.check_events(contract_id, events)
    }

    fn check_events(&self, contract_id: &ContractId, events: &[Event]) -> ArrasResult<ChainReport> {
        match verify_events(contract_id, events) {
            Ok(report) => {
                debug!(
                    contract_id = %contract_id,
                    length = report.length,
                    head_hash = %report.head_hash,
                    "chain verified"
                );
                Ok(report)
            }
            Err(broken) => {
                warn!(
                    contract_id = %contract_id,
                    index = broken.index,
                    event_id = %broken.event_id,
                    reason = %broken.reason,
                    "broken chain detected, halting contract"
                );
                self.halted
                    .lock()
                    .map_err(|e| ArrasError::persistence(format!("halt set poisoned: {}", e)))?
                    .insert(contract_id.clone());
                Err(ArrasError::BrokenChain {
                    contract_id: contract_id.clone(),
                    event_id: broken.event_id,
                    index: broken.index,
                    reason: broken.reason.to_string(),
                })
            }
        }
    }

    /// All events of the contract in ledger order.
    pub fn events(&self, contract_id: &ContractId) -> ArrasResult<Vec<Event>> {
        self.store.events(contract_id)
    }

    pub fn is_halted(&self, contract_id: &ContractId) -> ArrasResult<bool> {
        Ok(self
            .halted
            .lock()
            .map_err(|e| ArrasError::persistence(format!("halt set poisoned: {}", e)))?
            .contains(contract_id))
    }

    /// Lift a halt after the break has been investigated.
    pub fn release_halt(&self, contract_id: &ContractId) -> ArrasResult<()> {
        let released = self
            .halted
            .lock()
            .map_err(|e| ArrasError::persistence(format!("halt set poisoned: {}", e)))?
            .remove(contract_id);
        if released {
            warn!(contract_id = %contract_id, "contract halt released");
        }
        Ok(())
    }

    /// `ContractHalted` if the contract is halted.
    pub fn ensure_not_halted(&self, contract_id: &ContractId) -> ArrasResult<()> {
        if self.is_halted(contract_id)? {
            return Err(ArrasError::ContractHalted {
                contract_id: contract_id.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn contract_lock(&self, contract_id: &ContractId) -> ArrasResult<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| ArrasError::persistence(format!("ledger lock table poisoned: {}", e)))?;
        // Clones are only made under the table lock, so a count of one means
        // no caller holds or is about to take that entry.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(Arc::clone(locks.entry(contract_id.clone()).or_default()))
    }
}
