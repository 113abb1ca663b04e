//! Row groups exchanged with the storage collaborator.
//!
//! Each bundle is written by a single atomic store call: either every row in
//! it becomes visible or none does.

use serde::{Deserialize, Serialize};

use crate::{
    attestation::Attestation,
    certificate::Certificate,
    event::Event,
    evidence::EvidenceRecord,
    ids::ContractId,
    records::{Communication, Document},
    seal::Seal,
};

/// Everything a successful mandate attestation writes.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationBundle {
    pub seal: Seal,
    pub attestation: Attestation,
    pub evidence: EvidenceRecord,
    pub event: Event,
}

/// The seal and evidence written alongside a sealed certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSeal {
    pub seal: Seal,
    pub evidence: EvidenceRecord,
}

/// Everything a certificate generation writes.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateBundle {
    pub certificate: Certificate,
    /// `None` when the certificate is unsealed.
    pub sealed: Option<CertificateSeal>,
    pub event: Event,
}

/// A read-only, internally consistent view of one contract.
///
/// Events are in ledger order.  Communications, documents and attestations are
/// in ascending `created_at`, ties broken by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSnapshot {
    pub contract_id: ContractId,
    pub events: Vec<Event>,
    pub communications: Vec<Communication>,
    pub documents: Vec<Document>,
    /// Active attestations only.
    pub attestations: Vec<Attestation>,
}
