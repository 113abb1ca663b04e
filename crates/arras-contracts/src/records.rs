//! Rows owned by the surrounding application.
//!
//! The core never writes these; it only reads them when assembling a
//! certificate snapshot.  Contents are referenced by hash, never inlined.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CommunicationId, ContractId, DocumentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommunicationDirection {
    Inbound,
    Outbound,
}

/// A message exchanged between contract parties (email, SMS, in-app notice).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Communication {
    pub id: CommunicationId,
    pub contract_id: ContractId,
    /// Free-form channel name, e.g. `"email"`.
    pub channel: String,
    pub direction: CommunicationDirection,
    pub sender_ref: String,
    pub recipient_ref: String,
    /// Hex hash of the message body.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A file attached to the contract (ID scan, title deed, signed contract).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub contract_id: ContractId,
    /// Free-form kind, e.g. `"title_deed"`.
    pub kind: String,
    pub file_name: String,
    /// Hex hash of the file contents.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}
