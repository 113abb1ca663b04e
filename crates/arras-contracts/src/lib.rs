//! # arras-contracts
//!
//! Shared entity types, errors, and configuration for the ARRAS evidence core.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate: only data definitions, error types and configuration parsing.

pub mod attestation;
pub mod cancel;
pub mod certificate;
pub mod config;
pub mod digest;
pub mod error;
pub mod event;
pub mod evidence;
pub mod ids;
pub mod pii;
pub mod records;
pub mod seal;
pub mod storage;
