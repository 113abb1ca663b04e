//! Sealed mandate attestations.
//!
//! A mandate moves through three states, only one of which is ever stored:
//!
//!   PENDING (in memory) → SEALED (persisted)
//!                       ↘ ABORTED (error returned, nothing written)
//!
//! The seal is requested with no lock held.  Only after the authority issues
//! it are the seal, attestation, evidence record and `MANDATE_GRANTED` event
//! written, in one atomic store call.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use arras_contracts::{
    attestation::{
        Attestation, AttestationStatus, HashedContext, HashedSubject, MandateType, PartyRef,
    },
    cancel::Cancellation,
    config::{ArrasConfig, RetryPolicy},
    digest::HashAlgorithm,
    error::{ArrasError, ArrasResult},
    event::EventType,
    evidence::{ArtifactKind, EvidenceRecord},
    ids::{AttestationId, ContractId, EvidenceId, SealId},
    pii::{HashedPii, NormalizationVersion, PiiField},
    storage::AttestationBundle,
};
use arras_core::{canonical::{canonical_value, canonicalize}, hash::hash_canonical, pii::hash_pii};
use arras_ledger::EventLedger;
use arras_tsa::TimestampClient;

use crate::retry::persist_with_retry;

/// Format tag of the sealed attestation payload.
pub const MANDATE_FORMAT: &str = "arras-mandate-v1";

/// Raw personal data of the grantor.  Never stored; hashed on `create`.
#[derive(Clone)]
pub struct MandateSubject {
    pub name: String,
    pub email: String,
    pub document_number: String,
}

impl fmt::Debug for MandateSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MandateSubject")
            .field("name", &"<redacted>")
            .field("email", &"<redacted>")
            .field("document_number", &"<redacted>")
            .finish()
    }
}

/// Where the grant was made from.
#[derive(Clone, Default)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("ip_address", &self.ip_address.as_ref().map(|_| "<redacted>"))
            .field("user_agent", &self.user_agent.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MandateRequest {
    pub contract_id: ContractId,
    pub grantor: PartyRef,
    pub grantee: PartyRef,
    pub mandate_type: MandateType,
    pub subject: MandateSubject,
    pub context: RequestContext,
    /// Free-form caller data.  Canonicalized and covered by the seal.
    pub metadata: serde_json::Value,
    pub actor: Option<String>,
}

/// The payload whose hash is sealed.
#[derive(Serialize)]
struct AttestationPayload<'a> {
    format: &'static str,
    contract_id: &'a ContractId,
    grantor: &'a PartyRef,
    grantee: &'a PartyRef,
    mandate_type: MandateType,
    subject: &'a HashedSubject,
    context: &'a HashedContext,
    normalization_version: NormalizationVersion,
    hash_algorithm: HashAlgorithm,
    created_at: DateTime<Utc>,
    metadata: &'a serde_json::Value,
}

/// Payload of the `MANDATE_GRANTED` event.
#[derive(Serialize)]
struct MandateGranted<'a> {
    attestation_id: AttestationId,
    mandate_type: MandateType,
    grantor: &'a PartyRef,
    grantee: &'a PartyRef,
    payload_hash: &'a str,
    hash_algorithm: HashAlgorithm,
    seal_id: SealId,
}

/// Creates sealed mandate attestations.
pub struct MandateAttestationBuilder {
    ledger: Arc<EventLedger>,
    client: TimestampClient,
    version: NormalizationVersion,
    retry: RetryPolicy,
}

impl MandateAttestationBuilder {
    pub fn new(ledger: Arc<EventLedger>, client: TimestampClient) -> Self {
        Self {
            ledger,
            client,
            version: NormalizationVersion::CURRENT,
            retry: RetryPolicy::default(),
        }
    }

    /// Apply the `[pii]` and `[persistence]` sections of `config`.
    pub fn configured(mut self, config: &ArrasConfig) -> Self {
        self.version = config.pii.normalization_version;
        self.retry = config.persistence;
        self
    }

    pub fn with_normalization_version(mut self, version: NormalizationVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Create, seal and persist one mandate attestation.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` / `Pii`: the request was rejected before any work
    /// - `ContractHalted`: the contract's chain is under investigation
    /// - `Cancelled`: `cancel` fired before the seal was requested
    /// - `SealingFailed`: the authority issued no seal; nothing was written
    /// - `Persistence`: the seal was issued but could not be stored; the
    ///   error carries it and it must be kept by the caller
    pub fn create(&self, request: MandateRequest, cancel: &Cancellation) -> ArrasResult<Attestation> {
        validate(&request)?;
        let contract_id = &request.contract_id;
        self.ledger.ensure_not_halted(contract_id)?;

        let subject = HashedSubject {
            name: self.hash(PiiField::Name, &request.subject.name)?,
            email: self.hash(PiiField::Email, &request.subject.email)?,
            document_number: self.hash(PiiField::DocumentNumber, &request.subject.document_number)?,
        };
        let context = HashedContext {
            ip_address: self.hash_optional(PiiField::IpAddress, request.context.ip_address.as_deref())?,
            user_agent: self.hash_optional(PiiField::UserAgent, request.context.user_agent.as_deref())?,
        };

        let created_at = Utc::now();
        let metadata = canonical_value(&request.metadata)?;
        let payload = AttestationPayload {
            format: MANDATE_FORMAT,
            contract_id,
            grantor: &request.grantor,
            grantee: &request.grantee,
            mandate_type: request.mandate_type,
            subject: &subject,
            context: &context,
            normalization_version: self.version,
            hash_algorithm: HashAlgorithm::CURRENT,
            created_at,
            metadata: &metadata,
        };
        let digest = hash_canonical(&canonicalize(&payload)?);
        debug!(contract_id = %contract_id, payload_hash = %digest.hex, "mandate payload hashed");

        // Last point at which the operation can be abandoned.
        if cancel.is_cancelled() {
            info!(contract_id = %contract_id, "mandate cancelled before sealing");
            return Err(ArrasError::Cancelled);
        }

        let seal = self.client.seal(&digest).map_err(|failure| {
            warn!(
                contract_id = %contract_id,
                kind = %failure.kind,
                "mandate aborted, authority issued no seal"
            );
            ArrasError::from(failure)
        })?;

        let attestation = Attestation {
            id: AttestationId::new(),
            contract_id: contract_id.clone(),
            grantor: request.grantor.clone(),
            grantee: request.grantee.clone(),
            mandate_type: request.mandate_type,
            subject,
            context,
            normalization_version: self.version,
            payload_hash: digest.hex.clone(),
            hash_algorithm: digest.algorithm,
            seal_id: seal.id,
            status: AttestationStatus::Active,
            created_at,
        };
        let evidence = EvidenceRecord {
            id: EvidenceId::new(),
            contract_id: contract_id.clone(),
            artifact_hash: digest.hex.clone(),
            hash_algorithm: digest.algorithm,
            artifact_kind: ArtifactKind::AttestationPayload,
            seal_id: seal.id,
            created_at,
        };
        let granted = MandateGranted {
            attestation_id: attestation.id,
            mandate_type: attestation.mandate_type,
            grantor: &attestation.grantor,
            grantee: &attestation.grantee,
            payload_hash: &attestation.payload_hash,
            hash_algorithm: attestation.hash_algorithm,
            seal_id: seal.id,
        };

        let store = self.ledger.store();
        let event = persist_with_retry(&self.retry, Some(&seal), || {
            self.ledger.append_with(
                contract_id,
                EventType::new(EventType::MANDATE_GRANTED),
                &granted,
                request.actor.as_deref(),
                |event| {
                    store.persist_attestation(&AttestationBundle {
                        seal: seal.clone(),
                        attestation: attestation.clone(),
                        evidence: evidence.clone(),
                        event: event.clone(),
                    })
                },
            )
        })?;

        info!(
            contract_id = %contract_id,
            attestation_id = %attestation.id,
            seal_id = %seal.id,
            sequence = event.sequence,
            "mandate attestation sealed"
        );
        Ok(attestation)
    }

    fn hash(&self, field: PiiField, value: &str) -> ArrasResult<HashedPii> {
        Ok(hash_pii(field, value, self.version)?)
    }

    fn hash_optional(&self, field: PiiField, value: Option<&str>) -> ArrasResult<Option<HashedPii>> {
        value.map(|v| self.hash(field, v)).transpose()
    }
}

fn validate(request: &MandateRequest) -> ArrasResult<()> {
    let invalid = |reason: &str| {
        Err(ArrasError::InvalidRequest {
            reason: reason.to_string(),
        })
    };
    if request.contract_id.as_str().trim().is_empty() {
        return invalid("contract id is empty");
    }
    for (label, party) in [("grantor", &request.grantor), ("grantee", &request.grantee)] {
        if party.role.trim().is_empty() || party.id.trim().is_empty() {
            return Err(ArrasError::InvalidRequest {
                reason: format!("{} reference needs both role and id", label),
            });
        }
    }
    if request.grantor == request.grantee {
        return invalid("grantor and grantee must be different parties");
    }
    Ok(())
}
