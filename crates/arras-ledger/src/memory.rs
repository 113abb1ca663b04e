//! In-memory implementation of `EvidenceStore`.
//!
//! `InMemoryEvidenceStore` is the reference implementation of the storage
//! seam.  All rows live behind a single `Mutex`, which makes every write
//! atomic and every snapshot consistent.  It also stands in for the
//! surrounding application: `record_communication` and `record_document`
//! insert the rows the core only reads.
//!
//! `fail_next_writes` makes the next N write calls fail with a persistence
//! error, for exercising retry paths.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Mutex, MutexGuard,
    },
};

use tracing::debug;

use arras_contracts::{
    attestation::{Attestation, AttestationStatus},
    certificate::Certificate,
    error::{ArrasError, ArrasResult},
    event::{ChainHead, Event},
    evidence::EvidenceRecord,
    ids::{AttestationId, ContractId, SealId},
    records::{Communication, Document},
    seal::Seal,
    storage::{AttestationBundle, CertificateBundle, ContractSnapshot},
};
use arras_core::traits::EvidenceStore;

// ── Internal mutable state ────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct InMemoryState {
    /// Per-contract chains, in ledger order.
    pub(crate) events: HashMap<ContractId, Vec<Event>>,
    pub(crate) seals: HashMap<SealId, Seal>,
    pub(crate) attestations: Vec<Attestation>,
    pub(crate) evidence: Vec<EvidenceRecord>,
    pub(crate) certificates: Vec<Certificate>,
    pub(crate) communications: Vec<Communication>,
    pub(crate) documents: Vec<Document>,
}

impl InMemoryState {
    fn head(&self, contract_id: &ContractId) -> ChainHead {
        ChainHead::after(self.events.get(contract_id).and_then(|chain| chain.last()))
    }

    /// Compare-and-swap guard: `event` must extend the current head exactly.
    fn check_extends(&self, event: &Event) -> ArrasResult<()> {
        let head = self.head(&event.contract_id);
        if event.sequence != head.next_sequence || event.prev_hash != head.last_hash {
            return Err(ArrasError::ChainConflict {
                contract_id: event.contract_id.clone(),
                expected: head.last_hash,
                found: event.prev_hash.clone(),
            });
        }
        Ok(())
    }

    fn check_seal_unused(&self, seal: &Seal) -> ArrasResult<()> {
        if !seal.is_issued() {
            return Err(ArrasError::persistence(format!(
                "seal {} is not issued and cannot be stored",
                seal.id
            )));
        }
        if self.seals.contains_key(&seal.id) {
            return Err(ArrasError::persistence(format!("seal {} already stored", seal.id)));
        }
        Ok(())
    }

    fn push_event(&mut self, event: &Event) {
        self.events
            .entry(event.contract_id.clone())
            .or_default()
            .push(event.clone());
    }
}

// ── Public store ──────────────────────────────────────────────────────────────

/// An in-memory evidence store.
///
/// # Thread safety
///
/// Every method acquires one internal `Mutex` for its whole duration, so
/// concurrent callers observe each write entirely or not at all.
#[derive(Default)]
pub struct InMemoryEvidenceStore {
    pub(crate) state: Mutex<InMemoryState>,
    injected_failures: AtomicU32,
}

impl InMemoryEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` write calls fail with `ArrasError::Persistence`.
    pub fn fail_next_writes(&self, count: u32) {
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    /// Insert a communication row on behalf of the application.
    pub fn record_communication(&self, communication: Communication) -> ArrasResult<()> {
        self.lock()?.communications.push(communication);
        Ok(())
    }

    /// Insert a document row on behalf of the application.
    pub fn record_document(&self, document: Document) -> ArrasResult<()> {
        self.lock()?.documents.push(document);
        Ok(())
    }

    /// Mark an attestation revoked.  Revoked attestations are excluded from
    /// certificate snapshots.
    pub fn revoke_attestation(&self, id: &AttestationId) -> ArrasResult<()> {
        let mut state = self.lock()?;
        let attestation = state
            .attestations
            .iter_mut()
            .find(|a| &a.id == id)
            .ok_or_else(|| ArrasError::InvalidRequest {
                reason: format!("attestation {} does not exist", id),
            })?;
        attestation.status = AttestationStatus::Revoked;
        Ok(())
    }

    /// Total number of seals stored, across contracts.
    pub fn seal_count(&self) -> ArrasResult<usize> {
        Ok(self.lock()?.seals.len())
    }

    fn lock(&self) -> ArrasResult<MutexGuard<'_, InMemoryState>> {
        self.state
            .lock()
            .map_err(|e| ArrasError::persistence(format!("store lock poisoned: {}", e)))
    }

    fn take_injected_failure(&self) -> ArrasResult<()> {
        let injected = self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match injected {
            Ok(_) => Err(ArrasError::persistence("injected storage failure")),
            Err(_) => Ok(()),
        }
    }
}

// ── EvidenceStore impl ────────────────────────────────────────────────────────

impl EvidenceStore for InMemoryEvidenceStore {
    fn last_event(&self, contract_id: &ContractId) -> ArrasResult<Option<Event>> {
        Ok(self
            .lock()?
            .events
            .get(contract_id)
            .and_then(|chain| chain.last().cloned()))
    }

    fn append_event(&self, event: &Event) -> ArrasResult<()> {
        self.take_injected_failure()?;
        let mut state = self.lock()?;
        state.check_extends(event)?;
        state.push_event(event);
        debug!(contract_id = %event.contract_id, sequence = event.sequence, "event stored");
        Ok(())
    }

    fn events(&self, contract_id: &ContractId) -> ArrasResult<Vec<Event>> {
        Ok(self
            .lock()?
            .events
            .get(contract_id)
            .cloned()
            .unwrap_or_default())
    }

    fn persist_attestation(&self, bundle: &AttestationBundle) -> ArrasResult<()> {
        self.take_injected_failure()?;
        let mut state = self.lock()?;

        // Validate everything before touching any collection.
        state.check_extends(&bundle.event)?;
        state.check_seal_unused(&bundle.seal)?;
        if bundle.attestation.seal_id != bundle.seal.id || bundle.evidence.seal_id != bundle.seal.id {
            return Err(ArrasError::persistence(
                "attestation and evidence must reference the bundled seal",
            ));
        }

        state.seals.insert(bundle.seal.id, bundle.seal.clone());
        state.attestations.push(bundle.attestation.clone());
        state.evidence.push(bundle.evidence.clone());
        state.push_event(&bundle.event);
        debug!(
            contract_id = %bundle.event.contract_id,
            attestation_id = %bundle.attestation.id,
            "attestation bundle stored"
        );
        Ok(())
    }

    fn persist_certificate(&self, bundle: &CertificateBundle) -> ArrasResult<()> {
        self.take_injected_failure()?;
        let mut state = self.lock()?;

        state.check_extends(&bundle.event)?;
        if let Some(sealed) = &bundle.sealed {
            state.check_seal_unused(&sealed.seal)?;
            if bundle.certificate.seal_id != Some(sealed.seal.id) || sealed.evidence.seal_id != sealed.seal.id {
                return Err(ArrasError::persistence(
                    "certificate and evidence must reference the bundled seal",
                ));
            }
        } else if bundle.certificate.seal_id.is_some() {
            return Err(ArrasError::persistence(
                "unsealed certificate must not reference a seal",
            ));
        }

        if let Some(sealed) = &bundle.sealed {
            state.seals.insert(sealed.seal.id, sealed.seal.clone());
            state.evidence.push(sealed.evidence.clone());
        }
        state.certificates.push(bundle.certificate.clone());
        state.push_event(&bundle.event);
        debug!(
            contract_id = %bundle.event.contract_id,
            certificate_id = %bundle.certificate.id,
            "certificate bundle stored"
        );
        Ok(())
    }

    fn snapshot(&self, contract_id: &ContractId) -> ArrasResult<ContractSnapshot> {
        let state = self.lock()?;

        let events = state.events.get(contract_id).cloned().unwrap_or_default();

        let mut communications: Vec<Communication> = state
            .communications
            .iter()
            .filter(|c| &c.contract_id == contract_id)
            .cloned()
            .collect();
        communications.sort_by_key(|c| (c.created_at, c.id));

        let mut documents: Vec<Document> = state
            .documents
            .iter()
            .filter(|d| &d.contract_id == contract_id)
            .cloned()
            .collect();
        documents.sort_by_key(|d| (d.created_at, d.id));

        let mut attestations: Vec<Attestation> = state
            .attestations
            .iter()
            .filter(|a| &a.contract_id == contract_id && a.is_active())
            .cloned()
            .collect();
        attestations.sort_by_key(|a| (a.created_at, a.id));

        Ok(ContractSnapshot {
            contract_id: contract_id.clone(),
            events,
            communications,
            documents,
            attestations,
        })
    }

    fn seal(&self, id: &SealId) -> ArrasResult<Option<Seal>> {
        Ok(self.lock()?.seals.get(id).cloned())
    }

    fn attestations(&self, contract_id: &ContractId) -> ArrasResult<Vec<Attestation>> {
        Ok(self
            .lock()?
            .attestations
            .iter()
            .filter(|a| &a.contract_id == contract_id)
            .cloned()
            .collect())
    }

    fn certificates(&self, contract_id: &ContractId) -> ArrasResult<Vec<Certificate>> {
        Ok(self
            .lock()?
            .certificates
            .iter()
            .filter(|c| &c.contract_id == contract_id)
            .cloned()
            .collect())
    }

    fn evidence(&self, contract_id: &ContractId) -> ArrasResult<Vec<EvidenceRecord>> {
        Ok(self
            .lock()?
            .evidence
            .iter()
            .filter(|e| &e.contract_id == contract_id)
            .cloned()
            .collect())
    }
}
