//! Canonical rendering of a contract snapshot.
//!
//! `render_snapshot` is pure: the same snapshot always renders to the same
//! bytes, so a third party holding the rows can recompute a certificate's
//! `rendered_hash`.  Visual layout (PDF) is left to the application, which
//! receives these bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use arras_contracts::{
    attestation::{MandateType, PartyRef},
    certificate::SummaryCounts,
    digest::HashAlgorithm,
    error::ArrasResult,
    event::{Event, EventType},
    ids::{AttestationId, ContractId, SealId},
    pii::NormalizationVersion,
    records::{Communication, Document},
    storage::ContractSnapshot,
};
use arras_core::canonical::{canonicalize, CanonicalBytes};

/// Format tag written into every rendered certificate.
pub const CERTIFICATE_FORMAT: &str = "arras-certificate-v1";

/// The document whose canonical encoding is hashed and sealed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateDocument {
    pub format: String,
    pub contract_id: ContractId,
    pub chain: ChainSummary,
    pub events: Vec<EventEntry>,
    pub communications: Vec<Communication>,
    pub documents: Vec<Document>,
    pub attestations: Vec<AttestationEntry>,
    pub summary_counts: SummaryCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSummary {
    pub length: u64,
    /// Hash of the last event covered, or the genesis constant.
    pub head_hash: String,
    pub hash_algorithm: HashAlgorithm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEntry {
    pub sequence: u64,
    pub event_type: EventType,
    pub payload: serde_json::Value,
    pub actor: Option<String>,
    pub hash: String,
    pub prev_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Event> for EventEntry {
    fn from(event: &Event) -> Self {
        Self {
            sequence: event.sequence,
            event_type: event.event_type.clone(),
            payload: event.payload.clone(),
            actor: event.actor.clone(),
            hash: event.hash.clone(),
            prev_hash: event.prev_hash.clone(),
            created_at: event.created_at,
        }
    }
}

/// An attestation as it appears on a certificate.  Hashed personal data is
/// represented only through `payload_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationEntry {
    pub id: AttestationId,
    pub mandate_type: MandateType,
    pub grantor: PartyRef,
    pub grantee: PartyRef,
    pub normalization_version: NormalizationVersion,
    pub payload_hash: String,
    pub hash_algorithm: HashAlgorithm,
    pub seal_id: SealId,
    pub created_at: DateTime<Utc>,
}

/// Build the certificate document for `snapshot`.
///
/// Events keep ledger order.  Communications, documents and attestations are
/// put in ascending `created_at`, ties broken by id, whatever order the
/// store returned them in.
pub fn certificate_document(snapshot: &ContractSnapshot) -> CertificateDocument {
    let mut communications = snapshot.communications.clone();
    communications.sort_by_key(|c| (c.created_at, c.id));

    let mut documents = snapshot.documents.clone();
    documents.sort_by_key(|d| (d.created_at, d.id));

    let mut attestations: Vec<AttestationEntry> = snapshot
        .attestations
        .iter()
        .filter(|a| a.is_active())
        .map(|a| AttestationEntry {
            id: a.id,
            mandate_type: a.mandate_type,
            grantor: a.grantor.clone(),
            grantee: a.grantee.clone(),
            normalization_version: a.normalization_version,
            payload_hash: a.payload_hash.clone(),
            hash_algorithm: a.hash_algorithm,
            seal_id: a.seal_id,
            created_at: a.created_at,
        })
        .collect();
    attestations.sort_by_key(|a| (a.created_at, a.id));

    let mut events: Vec<EventEntry> = snapshot.events.iter().map(EventEntry::from).collect();
    events.sort_by_key(|e| e.sequence);

    let head_hash = events
        .last()
        .map(|e| e.hash.clone())
        .unwrap_or_else(|| Event::GENESIS_HASH.to_string());

    let summary_counts = SummaryCounts {
        events: events.len() as u64,
        communications: communications.len() as u64,
        documents: documents.len() as u64,
        attestations: attestations.len() as u64,
    };

    CertificateDocument {
        format: CERTIFICATE_FORMAT.to_string(),
        contract_id: snapshot.contract_id.clone(),
        chain: ChainSummary {
            length: events.len() as u64,
            head_hash,
            hash_algorithm: HashAlgorithm::CURRENT,
        },
        events,
        communications,
        documents,
        attestations,
        summary_counts,
    }
}

impl CertificateDocument {
    /// The canonical encoding that is hashed and sealed.
    pub fn render(&self) -> ArrasResult<CanonicalBytes> {
        Ok(canonicalize(self)?)
    }
}

/// Render `snapshot` to its canonical bytes.
pub fn render_snapshot(snapshot: &ContractSnapshot) -> ArrasResult<CanonicalBytes> {
    certificate_document(snapshot).render()
}
