//! Evidentiary certificate generation.
//!
//! Sealing is the one step allowed to fail: when the authority does not
//! issue a seal the certificate is still recorded, as UNSEALED, and its
//! rendered hash is still chained into the ledger.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use arras_contracts::{
    certificate::{Certificate, CertificateStatus},
    config::{ArrasConfig, RetryPolicy},
    digest::HashAlgorithm,
    error::ArrasResult,
    event::EventType,
    evidence::{ArtifactKind, EvidenceRecord},
    ids::{CertificateId, ContractId, EvidenceId, SealId},
    storage::{CertificateBundle, CertificateSeal},
};
use arras_core::hash::hash_canonical;
use arras_ledger::EventLedger;
use arras_tsa::TimestampClient;

use crate::{render::certificate_document, retry::persist_with_retry};

/// A persisted certificate and the bytes its `rendered_hash` covers.
#[derive(Debug, Clone)]
pub struct GeneratedCertificate {
    pub certificate: Certificate,
    /// Canonical JSON for the external renderer.
    pub rendered: Vec<u8>,
}

/// Payload of the `CERTIFICATE_GENERATED` event.
#[derive(Serialize)]
struct CertificateGenerated<'a> {
    certificate_id: CertificateId,
    rendered_hash: &'a str,
    hash_algorithm: HashAlgorithm,
    status: CertificateStatus,
    seal_id: Option<SealId>,
}

pub struct CertificateGenerator {
    ledger: Arc<EventLedger>,
    client: TimestampClient,
    retry: RetryPolicy,
}

impl CertificateGenerator {
    pub fn new(ledger: Arc<EventLedger>, client: TimestampClient) -> Self {
        Self {
            ledger,
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn configured(mut self, config: &ArrasConfig) -> Self {
        self.retry = config.persistence;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Generate a new certificate for `contract_id`.
    ///
    /// A halted contract is refused before any work.  The snapshot's own
    /// events are verified before anything is rendered from them; a broken
    /// chain aborts generation and halts the contract.  Every call creates a
    /// new certificate.
    pub fn generate(&self, contract_id: &ContractId) -> ArrasResult<GeneratedCertificate> {
        self.ledger.ensure_not_halted(contract_id)?;

        let snapshot = self.ledger.store().snapshot(contract_id)?;
        self.ledger.verify_loaded(contract_id, &snapshot.events)?;
        let document = certificate_document(&snapshot);
        let rendered = document.render()?;
        let digest = hash_canonical(&rendered);

        let seal = match self.client.seal(&digest) {
            Ok(seal) => Some(seal),
            Err(failure) => {
                warn!(
                    contract_id = %contract_id,
                    kind = %failure.kind,
                    message = %failure.message,
                    "certificate will be unsealed"
                );
                None
            }
        };

        let generated_at = Utc::now();
        let certificate = Certificate {
            id: CertificateId::new(),
            contract_id: contract_id.clone(),
            generated_at,
            rendered_hash: digest.hex.clone(),
            hash_algorithm: digest.algorithm,
            status: if seal.is_some() {
                CertificateStatus::Sealed
            } else {
                CertificateStatus::Unsealed
            },
            seal_id: seal.as_ref().map(|s| s.id),
            summary_counts: document.summary_counts,
        };
        let sealed = seal.as_ref().map(|seal| CertificateSeal {
            seal: seal.clone(),
            evidence: EvidenceRecord {
                id: EvidenceId::new(),
                contract_id: contract_id.clone(),
                artifact_hash: digest.hex.clone(),
                hash_algorithm: digest.algorithm,
                artifact_kind: ArtifactKind::RenderedCertificate,
                seal_id: seal.id,
                created_at: generated_at,
            },
        });
        let payload = CertificateGenerated {
            certificate_id: certificate.id,
            rendered_hash: &certificate.rendered_hash,
            hash_algorithm: certificate.hash_algorithm,
            status: certificate.status,
            seal_id: certificate.seal_id,
        };

        let store = self.ledger.store();
        let event = persist_with_retry(&self.retry, seal.as_ref(), || {
            self.ledger.append_with(
                contract_id,
                EventType::new(EventType::CERTIFICATE_GENERATED),
                &payload,
                None,
                |event| {
                    store.persist_certificate(&CertificateBundle {
                        certificate: certificate.clone(),
                        sealed: sealed.clone(),
                        event: event.clone(),
                    })
                },
            )
        })?;

        info!(
            contract_id = %contract_id,
            certificate_id = %certificate.id,
            status = ?certificate.status,
            events = certificate.summary_counts.events,
            sequence = event.sequence,
            "certificate generated"
        );
        Ok(GeneratedCertificate {
            certificate,
            rendered: rendered.into_vec(),
        })
    }
}
