//! # arras-evidence
//!
//! The two sealed artifacts of the ARRAS evidence core.
//!
//! - [`mandate`]: `MandateAttestationBuilder`, fail-closed.  No seal, no row.
//! - [`certificate`]: `CertificateGenerator`, fail-open on sealing only.
//! - [`render`]: the pure, canonical certificate document.
//!
//! Both builders share one `EventLedger` and one `TimestampClient`:
//!
//! ```rust,ignore
//! let ledger = Arc::new(EventLedger::new(store.clone()));
//! let client = TimestampClient::new(authority);
//! let mandates = MandateAttestationBuilder::new(ledger.clone(), client.clone());
//! let certificates = CertificateGenerator::new(ledger, client);
//! ```

pub mod certificate;
pub mod mandate;
pub mod render;
mod retry;

pub use certificate::{CertificateGenerator, GeneratedCertificate};
pub use mandate::{MandateAttestationBuilder, MandateRequest, MandateSubject, RequestContext};
pub use render::{certificate_document, render_snapshot, CertificateDocument, CERTIFICATE_FORMAT};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    use chrono::{Duration, Utc};
    use serde_json::json;

    use arras_contracts::{
        attestation::{Attestation, MandateType, PartyRef},
        cancel::Cancellation,
        certificate::{Certificate, CertificateStatus},
        config::RetryPolicy,
        error::{ArrasError, ArrasResult},
        event::{Event, EventType},
        evidence::{ArtifactKind, EvidenceRecord},
        ids::{CommunicationId, ContractId, SealId},
        pii::NormalizationVersion,
        records::{Communication, CommunicationDirection},
        seal::{Seal, TimestampFailureKind},
        storage::{AttestationBundle, CertificateBundle, ContractSnapshot},
    };
    use arras_core::{hash::hash, traits::EvidenceStore};
    use arras_ledger::{EventLedger, InMemoryEvidenceStore};
    use arras_tsa::{MockTimestampAuthority, TimestampClient};

    use super::*;

    // ── Harness ───────────────────────────────────────────────────────────────

    struct Harness {
        store: Arc<InMemoryEvidenceStore>,
        authority: Arc<MockTimestampAuthority>,
        ledger: Arc<EventLedger>,
        mandates: MandateAttestationBuilder,
        certificates: CertificateGenerator,
    }

    fn no_wait(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_ms: 0,
        }
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryEvidenceStore::new());
        harness_over(store.clone(), store)
    }

    fn harness_over(store: Arc<InMemoryEvidenceStore>, backing: Arc<dyn EvidenceStore>) -> Harness {
        let authority = Arc::new(MockTimestampAuthority::new());
        let ledger = Arc::new(EventLedger::new(backing));
        let client = TimestampClient::new(authority.clone());
        Harness {
            mandates: MandateAttestationBuilder::new(ledger.clone(), client.clone())
                .with_retry_policy(no_wait(3)),
            certificates: CertificateGenerator::new(ledger.clone(), client)
                .with_retry_policy(no_wait(3)),
            store,
            authority,
            ledger,
        }
    }

    fn contract() -> ContractId {
        ContractId::from("arr-2026-0117")
    }

    fn request() -> MandateRequest {
        MandateRequest {
            contract_id: contract(),
            grantor: PartyRef::new("seller", "party-3"),
            grantee: PartyRef::new("agent", "party-9"),
            mandate_type: MandateType::Signature,
            subject: MandateSubject {
                name: "María José O'Neill".to_string(),
                email: "Maria.Jose+arras@Example.com".to_string(),
                document_number: "12345678-Z".to_string(),
            },
            context: RequestContext {
                ip_address: Some("::ffff:192.0.2.10".to_string()),
                user_agent: Some("Mozilla/5.0  (X11)".to_string()),
            },
            metadata: json!({"price": 250000, "deposit": 25000, "currency": "EUR"}),
            actor: Some("user-3".to_string()),
        }
    }

    fn accept(h: &Harness) {
        h.ledger
            .append(&contract(), EventType::from("CREATED"), &json!({"deposit": 25000}), Some("agent-1"))
            .unwrap();
        h.ledger
            .append(&contract(), EventType::from("ACCEPTED"), &json!({"party": "buyer"}), Some("buyer-7"))
            .unwrap();
    }

    fn communication(minutes_ago: i64) -> Communication {
        Communication {
            id: CommunicationId::new(),
            contract_id: contract(),
            channel: "email".to_string(),
            direction: CommunicationDirection::Outbound,
            sender_ref: "agent-1".to_string(),
            recipient_ref: "buyer-7".to_string(),
            content_hash: hash(format!("message {}", minutes_ago).as_bytes()).hex,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    // ── Mandate attestations ─────────────────────────────────────────────────

    #[test]
    fn test_mandate_sealed_and_persisted() {
        let h = harness();
        accept(&h);

        let attestation = h.mandates.create(request(), &Cancellation::new()).unwrap();

        assert!(attestation.is_active());
        assert_eq!(attestation.normalization_version, NormalizationVersion::V2);
        assert_eq!(attestation.subject.document_number.last4.as_deref(), Some("678Z"));

        let seal = h.store.seal(&attestation.seal_id).unwrap().expect("seal stored");
        assert!(seal.is_issued());
        assert_eq!(seal.input_hash, attestation.payload_hash);

        let evidence = h.store.evidence(&contract()).unwrap();
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].artifact_kind, ArtifactKind::AttestationPayload);
        assert_eq!(evidence[0].seal_id, seal.id);

        let events = h.ledger.events(&contract()).unwrap();
        let granted = events.last().unwrap();
        assert_eq!(granted.event_type.as_str(), EventType::MANDATE_GRANTED);
        assert_eq!(granted.payload["attestation_id"], json!(attestation.id));
        assert_eq!(granted.actor.as_deref(), Some("user-3"));
        assert_eq!(h.ledger.verify_chain(&contract()).unwrap().length, 3);
    }

    #[test]
    fn test_mandate_stores_no_raw_personal_data() {
        let h = harness();
        let attestation = h.mandates.create(request(), &Cancellation::new()).unwrap();

        let stored = serde_json::to_string(&attestation).unwrap()
            + &serde_json::to_string(&h.ledger.events(&contract()).unwrap()).unwrap();
        for raw in ["María", "Example.com", "example.com", "12345678", "192.0.2.10", "Mozilla"] {
            assert!(!stored.contains(raw), "raw value '{}' leaked into storage", raw);
        }
    }

    #[test]
    fn test_rejected_seal_writes_nothing() {
        let h = harness();
        h.authority.fail_next(TimestampFailureKind::Rejected, 1);

        let err = h.mandates.create(request(), &Cancellation::new()).unwrap_err();
        match err {
            ArrasError::SealingFailed { kind, .. } => assert_eq!(kind, TimestampFailureKind::Rejected),
            other => panic!("expected SealingFailed, got {:?}", other),
        }

        assert!(h.store.attestations(&contract()).unwrap().is_empty());
        assert!(h.store.evidence(&contract()).unwrap().is_empty());
        assert!(h.store.events(&contract()).unwrap().is_empty());
        assert_eq!(h.store.seal_count().unwrap(), 0);
        assert_eq!(h.authority.request_count(), 1, "sealing is never retried");
    }

    #[test]
    fn test_every_failure_kind_aborts() {
        for kind in [
            TimestampFailureKind::Timeout,
            TimestampFailureKind::Transport,
            TimestampFailureKind::InvalidResponse,
        ] {
            let h = harness();
            h.authority.fail_next(kind, 1);
            assert!(matches!(
                h.mandates.create(request(), &Cancellation::new()),
                Err(ArrasError::SealingFailed { .. })
            ));
            assert_eq!(h.store.seal_count().unwrap(), 0);
        }
    }

    #[test]
    fn test_cancel_before_seal() {
        let h = harness();
        let cancel = Cancellation::new();
        cancel.cancel();

        let err = h.mandates.create(request(), &cancel).unwrap_err();
        assert!(matches!(err, ArrasError::Cancelled));
        assert_eq!(h.authority.request_count(), 0);
        assert!(h.store.events(&contract()).unwrap().is_empty());
    }

    #[test]
    fn test_persistence_retried_after_seal() {
        let h = harness();
        h.store.fail_next_writes(2);

        let attestation = h.mandates.create(request(), &Cancellation::new()).unwrap();
        assert_eq!(h.authority.request_count(), 1, "one seal, however many writes");
        assert_eq!(h.store.seal_count().unwrap(), 1);
        assert_eq!(h.store.attestations(&contract()).unwrap()[0].id, attestation.id);
    }

    #[test]
    fn test_exhausted_persistence_returns_seal() {
        let h = harness();
        h.store.fail_next_writes(10);

        let err = h.mandates.create(request(), &Cancellation::new()).unwrap_err();
        let seal = err.unpersisted_seal().expect("issued seal must be handed back");
        assert!(seal.is_issued());
        assert!(!seal.token.is_empty());
        assert!(h.store.attestations(&contract()).unwrap().is_empty());
        assert_eq!(h.store.seal_count().unwrap(), 0);
    }

    #[test]
    fn test_invalid_requests_never_reach_authority() {
        let h = harness();

        let mut same_party = request();
        same_party.grantee = same_party.grantor.clone();
        assert!(matches!(
            h.mandates.create(same_party, &Cancellation::new()),
            Err(ArrasError::InvalidRequest { .. })
        ));

        let mut no_role = request();
        no_role.grantor.role = " ".to_string();
        assert!(matches!(
            h.mandates.create(no_role, &Cancellation::new()),
            Err(ArrasError::InvalidRequest { .. })
        ));

        let mut blank_name = request();
        blank_name.subject.name = "  ".to_string();
        assert!(matches!(
            h.mandates.create(blank_name, &Cancellation::new()),
            Err(ArrasError::Pii { .. })
        ));

        assert_eq!(h.authority.request_count(), 0);
    }

    #[test]
    fn test_null_metadata_equals_absent_metadata() {
        let h = harness();
        let mut with_null = request();
        with_null.metadata = json!({"note": null, "price": 1});
        let mut without = request();
        without.metadata = json!({"price": 1});

        // Payloads differ only by creation time, so compare the metadata digest directly.
        let a = arras_core::canonical::canonicalize(&with_null.metadata).unwrap();
        let b = arras_core::canonical::canonicalize(&without.metadata).unwrap();
        assert_eq!(a, b);
        assert!(h.mandates.create(with_null, &Cancellation::new()).is_ok());
    }

    #[test]
    fn test_v1_builder_tags_v1() {
        let h = harness();
        let builder = h.mandates.with_normalization_version(NormalizationVersion::V1);
        let attestation = builder.create(request(), &Cancellation::new()).unwrap();
        assert_eq!(attestation.subject.email.normalization_version, NormalizationVersion::V1);
    }

    // ── Certificates ──────────────────────────────────────────────────────────

    #[test]
    fn test_sealed_certificate() {
        let h = harness();
        accept(&h);
        h.store.record_communication(communication(5)).unwrap();

        let generated = h.certificates.generate(&contract()).unwrap();
        let certificate = &generated.certificate;

        assert_eq!(certificate.status, CertificateStatus::Sealed);
        assert_eq!(certificate.rendered_hash, hash(&generated.rendered).hex);
        assert_eq!(certificate.summary_counts.events, 2);
        assert_eq!(certificate.summary_counts.communications, 1);

        let seal_id = certificate.seal_id.expect("sealed certificate references its seal");
        let seal = h.store.seal(&seal_id).unwrap().unwrap();
        assert_eq!(seal.input_hash, certificate.rendered_hash);

        let evidence = h.store.evidence(&contract()).unwrap();
        assert_eq!(evidence[0].artifact_kind, ArtifactKind::RenderedCertificate);
    }

    #[test]
    fn test_timeout_yields_unsealed_certificate() {
        let h = harness();
        accept(&h);
        h.authority.fail_next(TimestampFailureKind::Timeout, 1);

        let generated = h.certificates.generate(&contract()).unwrap();
        assert_eq!(generated.certificate.status, CertificateStatus::Unsealed);
        assert_eq!(generated.certificate.seal_id, None);
        assert_eq!(h.store.seal_count().unwrap(), 0);
        assert!(h.store.evidence(&contract()).unwrap().is_empty());

        let events = h.ledger.events(&contract()).unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.event_type.as_str(), EventType::CERTIFICATE_GENERATED);
        assert_eq!(last.payload["status"], json!("UNSEALED"));
        assert_eq!(last.payload["rendered_hash"], json!(generated.certificate.rendered_hash));
        assert!(last.payload.get("seal_id").is_none());
        assert!(h.ledger.verify_chain(&contract()).is_ok());
    }

    #[test]
    fn test_certificate_rows_in_creation_order() {
        let h = harness();
        accept(&h);
        for minutes_ago in [1, 30, 10] {
            h.store.record_communication(communication(minutes_ago)).unwrap();
        }

        let generated = h.certificates.generate(&contract()).unwrap();
        let document: CertificateDocument = serde_json::from_slice(&generated.rendered).unwrap();

        let times: Vec<_> = document.communications.iter().map(|c| c.created_at).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
        let sequences: Vec<_> = document.events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1]);
    }

    #[test]
    fn test_revoked_attestations_excluded() {
        let h = harness();
        let kept = h.mandates.create(request(), &Cancellation::new()).unwrap();
        let revoked = h.mandates.create(request(), &Cancellation::new()).unwrap();
        h.store.revoke_attestation(&revoked.id).unwrap();

        let generated = h.certificates.generate(&contract()).unwrap();
        let document: CertificateDocument = serde_json::from_slice(&generated.rendered).unwrap();
        assert_eq!(generated.certificate.summary_counts.attestations, 1);
        assert_eq!(document.attestations.len(), 1);
        assert_eq!(document.attestations[0].id, kept.id);
    }

    #[test]
    fn test_regeneration_appends() {
        let h = harness();
        accept(&h);

        let first = h.certificates.generate(&contract()).unwrap();
        let second = h.certificates.generate(&contract()).unwrap();

        assert_ne!(first.certificate.id, second.certificate.id);
        assert_ne!(first.certificate.rendered_hash, second.certificate.rendered_hash);
        assert_eq!(second.certificate.summary_counts.events, 3, "first certificate's event is covered");
        assert_eq!(h.store.certificates(&contract()).unwrap().len(), 2);

        let generated: Vec<_> = h
            .ledger
            .events(&contract())
            .unwrap()
            .into_iter()
            .filter(|e| e.event_type.as_str() == EventType::CERTIFICATE_GENERATED)
            .collect();
        assert_eq!(generated.len(), 2);
        assert!(h.ledger.verify_chain(&contract()).is_ok());
    }

    #[test]
    fn test_unsealed_certificate_write_failure_has_no_seal() {
        let h = harness();
        h.authority.fail_next(TimestampFailureKind::Transport, 1);
        h.store.fail_next_writes(10);

        let err = h.certificates.generate(&contract()).unwrap_err();
        assert!(matches!(err, ArrasError::Persistence { .. }));
        assert!(err.unpersisted_seal().is_none());
    }

    // ── Tampering ─────────────────────────────────────────────────────────────

    /// Serves the first event with a forged payload once armed.  `events()`
    /// and `snapshot()` are armed separately so the two reads can disagree.
    struct TamperingStore {
        inner: Arc<InMemoryEvidenceStore>,
        forge_events: AtomicBool,
        forge_snapshot: AtomicBool,
    }

    impl TamperingStore {
        fn over(inner: Arc<InMemoryEvidenceStore>) -> Self {
            Self {
                inner,
                forge_events: AtomicBool::new(false),
                forge_snapshot: AtomicBool::new(false),
            }
        }

        fn arm(&self) {
            self.forge_events.store(true, Ordering::SeqCst);
            self.forge_snapshot.store(true, Ordering::SeqCst);
        }

        fn disarm(&self) {
            self.forge_events.store(false, Ordering::SeqCst);
            self.forge_snapshot.store(false, Ordering::SeqCst);
        }

        fn forge(armed: &AtomicBool, mut events: Vec<Event>) -> Vec<Event> {
            if armed.load(Ordering::SeqCst) {
                if let Some(first) = events.first_mut() {
                    first.payload = json!({"deposit": 1});
                }
            }
            events
        }
    }

    impl EvidenceStore for TamperingStore {
        fn last_event(&self, contract_id: &ContractId) -> ArrasResult<Option<Event>> {
            self.inner.last_event(contract_id)
        }
        fn append_event(&self, event: &Event) -> ArrasResult<()> {
            self.inner.append_event(event)
        }
        fn events(&self, contract_id: &ContractId) -> ArrasResult<Vec<Event>> {
            Ok(Self::forge(&self.forge_events, self.inner.events(contract_id)?))
        }
        fn persist_attestation(&self, bundle: &AttestationBundle) -> ArrasResult<()> {
            self.inner.persist_attestation(bundle)
        }
        fn persist_certificate(&self, bundle: &CertificateBundle) -> ArrasResult<()> {
            self.inner.persist_certificate(bundle)
        }
        fn snapshot(&self, contract_id: &ContractId) -> ArrasResult<ContractSnapshot> {
            let mut snapshot = self.inner.snapshot(contract_id)?;
            snapshot.events = Self::forge(&self.forge_snapshot, snapshot.events);
            Ok(snapshot)
        }
        fn seal(&self, id: &SealId) -> ArrasResult<Option<Seal>> {
            self.inner.seal(id)
        }
        fn attestations(&self, contract_id: &ContractId) -> ArrasResult<Vec<Attestation>> {
            self.inner.attestations(contract_id)
        }
        fn certificates(&self, contract_id: &ContractId) -> ArrasResult<Vec<Certificate>> {
            self.inner.certificates(contract_id)
        }
        fn evidence(&self, contract_id: &ContractId) -> ArrasResult<Vec<EvidenceRecord>> {
            self.inner.evidence(contract_id)
        }
    }

    #[test]
    fn test_broken_chain_blocks_certificate_and_mandate() {
        let store = Arc::new(InMemoryEvidenceStore::new());
        let tampering = Arc::new(TamperingStore::over(store.clone()));
        let h = harness_over(store, tampering.clone());
        accept(&h);
        tampering.arm();

        let err = h.certificates.generate(&contract()).unwrap_err();
        match err {
            ArrasError::BrokenChain { index, .. } => assert_eq!(index, 0),
            other => panic!("expected BrokenChain, got {:?}", other),
        }
        assert!(h.store.certificates(&contract()).unwrap().is_empty());
        assert_eq!(h.authority.request_count(), 0);

        // The contract is now halted for mandates as well.
        assert!(matches!(
            h.mandates.create(request(), &Cancellation::new()),
            Err(ArrasError::ContractHalted { .. })
        ));
        assert_eq!(h.authority.request_count(), 0);
    }

    #[test]
    fn test_certificate_verifies_the_rows_it_renders() {
        let store = Arc::new(InMemoryEvidenceStore::new());
        let tampering = Arc::new(TamperingStore::over(store.clone()));
        let h = harness_over(store, tampering.clone());
        accept(&h);

        // A plain chain read stays honest; only the snapshot is forged.
        tampering.forge_snapshot.store(true, Ordering::SeqCst);
        assert_eq!(h.ledger.events(&contract()).unwrap()[0].payload["deposit"], json!(25000));

        let err = h.certificates.generate(&contract()).unwrap_err();
        match err {
            ArrasError::BrokenChain { index, .. } => assert_eq!(index, 0),
            other => panic!("expected BrokenChain, got {:?}", other),
        }
        assert_eq!(h.authority.request_count(), 0);
        assert!(h.store.certificates(&contract()).unwrap().is_empty());
        assert!(h.ledger.is_halted(&contract()).unwrap());
    }

    #[test]
    fn test_halted_contract_gets_no_certificate_seal() {
        let store = Arc::new(InMemoryEvidenceStore::new());
        let tampering = Arc::new(TamperingStore::over(store.clone()));
        let h = harness_over(store, tampering.clone());
        accept(&h);

        tampering.arm();
        assert!(h.ledger.verify_chain(&contract()).is_err());
        // Rows restored, halt not yet released.
        tampering.disarm();
        assert!(h.ledger.events(&contract()).is_ok());

        let err = h.certificates.generate(&contract()).unwrap_err();
        assert!(matches!(err, ArrasError::ContractHalted { .. }));
        assert!(err.unpersisted_seal().is_none());
        assert_eq!(h.authority.request_count(), 0);
        assert!(h.store.certificates(&contract()).unwrap().is_empty());

        h.ledger.release_halt(&contract()).unwrap();
        let generated = h.certificates.generate(&contract()).unwrap();
        assert_eq!(generated.certificate.status, CertificateStatus::Sealed);
        assert_eq!(h.authority.request_count(), 1);
    }
}
