//! Demo scenarios.
//!
//! Each scenario builds its own in-memory store, so every subcommand runs
//! against a fresh contract.  Scripted authority failures are only shown when
//! the mock authority is in use.

use std::{fs, path::Path, sync::Arc};

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::info;

use arras_contracts::{
    attestation::{MandateType, PartyRef},
    cancel::Cancellation,
    config::ArrasConfig,
    error::{ArrasError, ArrasResult},
    event::{Event, EventType},
    ids::{CommunicationId, ContractId, DocumentId},
    records::{Communication, CommunicationDirection, Document},
    seal::TimestampFailureKind,
};
use arras_core::{hash::hash, traits::TimestampAuthority};
use arras_evidence::{CertificateGenerator, MandateAttestationBuilder, MandateRequest, MandateSubject, RequestContext};
use arras_ledger::{verify_events, EventLedger, InMemoryEvidenceStore};
use arras_tsa::{authority_from_config, MockTimestampAuthority, TimestampClient};

/// Everything one scenario needs, wired from configuration.
pub struct Demo {
    pub config: ArrasConfig,
    pub store: Arc<InMemoryEvidenceStore>,
    pub ledger: Arc<EventLedger>,
    client: TimestampClient,
    /// Present when no endpoint is configured; used to script failures.
    mock: Option<Arc<MockTimestampAuthority>>,
}

impl Demo {
    pub fn new(config: ArrasConfig) -> ArrasResult<Self> {
        let mock = match config.tsa.endpoint {
            Some(_) => None,
            None => Some(Arc::new(MockTimestampAuthority::named(config.tsa.provider.clone()))),
        };
        let authority: Arc<dyn TimestampAuthority> = match &mock {
            Some(mock) => mock.clone(),
            None => authority_from_config(&config.tsa)?,
        };

        let store = Arc::new(InMemoryEvidenceStore::new());
        let ledger = Arc::new(EventLedger::new(store.clone()));
        Ok(Self {
            config,
            store,
            ledger,
            client: TimestampClient::new(authority),
            mock,
        })
    }

    fn mandates(&self) -> MandateAttestationBuilder {
        MandateAttestationBuilder::new(self.ledger.clone(), self.client.clone()).configured(&self.config)
    }

    fn certificates(&self) -> CertificateGenerator {
        CertificateGenerator::new(self.ledger.clone(), self.client.clone()).configured(&self.config)
    }

    fn script_failure(&self, kind: TimestampFailureKind) -> bool {
        match &self.mock {
            Some(mock) => {
                mock.fail_next(kind, 1);
                true
            }
            None => false,
        }
    }
}

fn contract() -> ContractId {
    ContractId::from("arr-2026-0117")
}

fn section(title: &str) {
    println!();
    println!("── {} ", title);
}

// ── Ledger ────────────────────────────────────────────────────────────────────

/// Append a contract lifecycle and verify its chain.  With `export`, write
/// the events as JSON for `verify`.
pub fn ledger(demo: &Demo, export: Option<&Path>) -> ArrasResult<()> {
    section("Event ledger");
    let contract_id = contract();
    let steps = [
        ("CREATED", json!({"price": 250000, "deposit": 25000, "currency": "EUR"}), "agent-1"),
        ("ACCEPTED", json!({"party": "buyer"}), "buyer-7"),
        ("SEALED", json!({"signatures": 2}), "agent-1"),
    ];
    for (event_type, payload, actor) in steps {
        let event = demo
            .ledger
            .append(&contract_id, EventType::from(event_type), &payload, Some(actor))?;
        println!("  #{} {:<10} {}", event.sequence, event.event_type, event.hash);
    }

    let report = demo.ledger.verify_chain(&contract_id)?;
    println!("  chain valid: {} events, head {}", report.length, report.head_hash);

    if let Some(path) = export {
        let events = demo.ledger.events(&contract_id)?;
        let json = serde_json::to_string_pretty(&events).map_err(|e| ArrasError::InvalidRequest {
            reason: format!("cannot encode events: {}", e),
        })?;
        fs::write(path, json).map_err(|e| {
            ArrasError::persistence(format!("cannot write '{}': {}", path.display(), e))
        })?;
        println!("  exported to {}", path.display());
    }
    Ok(())
}

// ── Mandates ──────────────────────────────────────────────────────────────────

fn mandate_request() -> MandateRequest {
    MandateRequest {
        contract_id: contract(),
        grantor: PartyRef::new("seller", "party-3"),
        grantee: PartyRef::new("agent", "party-9"),
        mandate_type: MandateType::Signature,
        subject: MandateSubject {
            name: "María José O'Neill".to_string(),
            email: "maria.jose+arras@example.com".to_string(),
            document_number: "12345678-Z".to_string(),
        },
        context: RequestContext {
            ip_address: Some("192.0.2.10".to_string()),
            user_agent: Some("Mozilla/5.0 (X11; Linux x86_64)".to_string()),
        },
        metadata: json!({"channel": "web", "wizard_step": 4}),
        actor: Some("user-3".to_string()),
    }
}

/// Grant a sealed mandate, then show that a refused seal leaves no trace.
pub fn mandate(demo: &Demo) -> ArrasResult<()> {
    section("Mandate attestation");
    let attestation = demo.mandates().create(mandate_request(), &Cancellation::new())?;
    println!("  {} granted {} to {}", attestation.grantor, attestation.mandate_type, attestation.grantee);
    println!("  payload hash  {}", attestation.payload_hash);
    println!("  seal          {}", attestation.seal_id);
    println!(
        "  document no.  ****{}",
        attestation.subject.document_number.last4.as_deref().unwrap_or("")
    );

    if demo.script_failure(TimestampFailureKind::Rejected) {
        let before = demo.ledger.events(&contract())?.len();
        match demo.mandates().create(mandate_request(), &Cancellation::new()) {
            Err(ArrasError::SealingFailed { kind, message }) => {
                let after = demo.ledger.events(&contract())?.len();
                println!("  refused seal: {} ({}); events before/after: {}/{}", kind, message, before, after);
            }
            Err(e) => return Err(e),
            Ok(_) => println!("  unexpected: refused seal produced an attestation"),
        }
    }

    let cancel = Cancellation::new();
    cancel.cancel();
    if let Err(ArrasError::Cancelled) = demo.mandates().create(mandate_request(), &cancel) {
        println!("  cancelled request: nothing sealed, nothing written");
    }
    Ok(())
}

// ── Certificates ──────────────────────────────────────────────────────────────

fn record_application_rows(demo: &Demo) -> ArrasResult<()> {
    let contract_id = contract();
    for (minutes_ago, body) in [(50, "offer sent"), (20, "offer accepted")] {
        demo.store.record_communication(Communication {
            id: CommunicationId::new(),
            contract_id: contract_id.clone(),
            channel: "email".to_string(),
            direction: CommunicationDirection::Outbound,
            sender_ref: "agent-1".to_string(),
            recipient_ref: "buyer-7".to_string(),
            content_hash: hash(body.as_bytes()).hex,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        })?;
    }
    demo.store.record_document(Document {
        id: DocumentId::new(),
        contract_id,
        kind: "title_deed".to_string(),
        file_name: "nota-simple.pdf".to_string(),
        content_hash: hash(b"title deed scan").hex,
        created_at: Utc::now() - Duration::minutes(40),
    })
}

/// Generate a sealed certificate, then an unsealed one after a timeout.
pub fn certificate(demo: &Demo) -> ArrasResult<()> {
    if demo.ledger.events(&contract())?.is_empty() {
        ledger(demo, None)?;
    }
    record_application_rows(demo)?;

    section("Certificate");
    let sealed = demo.certificates().generate(&contract())?;
    print_certificate(&sealed.certificate, sealed.rendered.len());

    if demo.script_failure(TimestampFailureKind::Timeout) {
        let unsealed = demo.certificates().generate(&contract())?;
        print_certificate(&unsealed.certificate, unsealed.rendered.len());
    }

    let report = demo.ledger.verify_chain(&contract())?;
    println!("  chain still valid: {} events", report.length);
    Ok(())
}

fn print_certificate(certificate: &arras_contracts::certificate::Certificate, rendered_len: usize) {
    let counts = certificate.summary_counts;
    println!(
        "  {} {:?} hash {} ({} bytes)",
        certificate.id, certificate.status, certificate.rendered_hash, rendered_len
    );
    println!(
        "    events {} · communications {} · documents {} · attestations {}",
        counts.events, counts.communications, counts.documents, counts.attestations
    );
    match certificate.seal_id {
        Some(seal_id) => println!("    seal {}", seal_id),
        None => println!("    no seal, hash chained in ledger only"),
    }
}

// ── Offline verification ──────────────────────────────────────────────────────

/// Verify an exported event list without a ledger.
pub fn verify(path: &Path, contract_id: &ContractId) -> ArrasResult<()> {
    section("Offline chain verification");
    let raw = fs::read_to_string(path).map_err(|e| ArrasError::InvalidRequest {
        reason: format!("cannot read '{}': {}", path.display(), e),
    })?;
    let events: Vec<Event> = serde_json::from_str(&raw).map_err(|e| ArrasError::InvalidRequest {
        reason: format!("'{}' is not an event list: {}", path.display(), e),
    })?;

    match verify_events(contract_id, &events) {
        Ok(report) => {
            info!(contract_id = %contract_id, length = report.length, "exported chain verified");
            println!("  {} events verified, head {}", report.length, report.head_hash);
            Ok(())
        }
        Err(broken) => Err(ArrasError::BrokenChain {
            contract_id: contract_id.clone(),
            event_id: broken.event_id,
            index: broken.index,
            reason: broken.reason.to_string(),
        }),
    }
}

pub fn run_all(demo: &Demo) -> ArrasResult<()> {
    ledger(demo, None)?;
    mandate(demo)?;
    certificate(demo)
}
