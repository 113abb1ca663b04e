//! # arras-core
//!
//! The primitives every ARRAS component builds on:
//!
//! - [`canonical`]: deterministic byte encoding of structured values
//! - [`hash`]: the single, versioned hashing primitive
//! - [`pii`]: versioned normalization and hashing of personal data
//! - [`traits`]: the storage and timestamp-authority seams
//!
//! ## Usage
//!
//! ```rust,ignore
//! use arras_core::{canonical::canonicalize, hash::hash_canonical};
//!
//! let bytes = canonicalize(&serde_json::json!({"amount": 15000}))?;
//! let digest = hash_canonical(&bytes);
//! ```

pub mod canonical;
pub mod hash;
pub mod pii;
pub mod traits;

pub use canonical::{canonicalize, CanonicalBytes, CanonicalizationError};
pub use hash::{hash, hash_canonical, hash_parts};
pub use traits::{EvidenceStore, TimestampAuthority, TimestampFailure, TimestampRequest, TimestampResponse};
