//! Identifier types.
//!
//! Every entity the core creates is keyed by a random UUID v4.  Contracts are
//! the exception: their identifiers are owned by the surrounding application
//! and arrive here as opaque strings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Caller-supplied identifier of a deposit contract.
///
/// Each contract owns exactly one event chain.  Example: `ContractId("arr-2024-0117")`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractId(pub String);

impl ContractId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContractId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            /// Create a new, unique identifier.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a ledger event.
    EventId
);
uuid_id!(
    /// Identifier of a seal issued (or attempted) by a timestamp authority.
    SealId
);
uuid_id!(
    /// Identifier of an evidence record.
    EvidenceId
);
uuid_id!(
    /// Identifier of a sealed mandate attestation.
    AttestationId
);
uuid_id!(
    /// Identifier of a generated certificate.
    CertificateId
);
uuid_id!(
    /// Identifier of a communication row supplied by the application.
    CommunicationId
);
uuid_id!(
    /// Identifier of a document row supplied by the application.
    DocumentId
);
