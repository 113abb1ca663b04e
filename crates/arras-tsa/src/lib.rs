//! # arras-tsa
//!
//! Client side of the qualified timestamp authority (QTSP) boundary.
//!
//! - [`client`]: `TimestampClient`, the only producer of `Seal` values
//! - [`http`]: `HttpTimestampAuthority`, blocking HTTP/JSON transport
//! - [`mock`]: `MockTimestampAuthority`, scripted in-process authority
//!
//! `authority_from_config` picks the HTTP authority when `tsa.endpoint` is
//! configured and the mock otherwise.

pub mod client;
pub mod http;
pub mod mock;

use std::sync::Arc;

use tracing::warn;

use arras_contracts::{config::TsaConfig, error::ArrasResult};
use arras_core::traits::TimestampAuthority;

pub use client::{SealingFailure, TimestampClient};
pub use http::HttpTimestampAuthority;
pub use mock::MockTimestampAuthority;

/// Build the authority described by `config`.
pub fn authority_from_config(config: &TsaConfig) -> ArrasResult<Arc<dyn TimestampAuthority>> {
    match &config.endpoint {
        Some(_) => Ok(Arc::new(HttpTimestampAuthority::from_config(config)?)),
        None => {
            warn!(provider = %config.provider, "no tsa.endpoint configured, using mock timestamp authority");
            Ok(Arc::new(MockTimestampAuthority::named(config.provider.clone())))
        }
    }
}
