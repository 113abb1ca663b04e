//! In-process timestamp authority for tests and the demo.
//!
//! Tokens are deterministic: `base64("mock-tst:" + hash + ":" + serial)`.
//! Failures can be scripted for the next N requests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;

use arras_contracts::seal::TimestampFailureKind;
use arras_core::traits::{TimestampAuthority, TimestampFailure, TimestampRequest, TimestampResponse};

pub const MOCK_POLICY_OID: &str = "0.4.0.2023.1.1";

pub struct MockTimestampAuthority {
    provider: String,
    requests: AtomicU64,
    scripted: Mutex<VecDeque<TimestampFailureKind>>,
}

impl MockTimestampAuthority {
    pub fn new() -> Self {
        Self::named("mock-tsa")
    }

    pub fn named(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            requests: AtomicU64::new(0),
            scripted: Mutex::new(VecDeque::new()),
        }
    }

    /// Fail the next `count` requests with `kind`.
    pub fn fail_next(&self, kind: TimestampFailureKind, count: usize) {
        let mut scripted = match self.scripted.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        scripted.extend(std::iter::repeat(kind).take(count));
    }

    /// Requests received so far, successful or not.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    fn next_failure(&self) -> Option<TimestampFailureKind> {
        match self.scripted.lock() {
            Ok(mut guard) => guard.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        }
    }
}

impl Default for MockTimestampAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl TimestampAuthority for MockTimestampAuthority {
    fn timestamp(&self, request: &TimestampRequest) -> Result<TimestampResponse, TimestampFailure> {
        let serial = self.requests.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(kind) = self.next_failure() {
            return Err(TimestampFailure::new(
                kind,
                format!("scripted {} failure for request {}", kind, serial),
            ));
        }

        let token = STANDARD.encode(format!("mock-tst:{}:{}", request.hash, serial));
        Ok(TimestampResponse {
            provider: self.provider.clone(),
            mark: "qualified-tst".to_string(),
            token,
            issued_at: Utc::now(),
            serial_number: Some(serial.to_string()),
            authority_key_id: Some("mock-key-1".to_string()),
            authority_name: Some("CN=ARRAS Mock TSA".to_string()),
            policy_oid: Some(MOCK_POLICY_OID.to_string()),
            hash: Some(request.hash.clone()),
        })
    }

    fn provider(&self) -> &str {
        &self.provider
    }
}

#[cfg(test)]
mod tests {
    use arras_contracts::digest::HashAlgorithm;

    use super::*;

    fn request(hash: &str) -> TimestampRequest {
        TimestampRequest {
            hash: hash.to_string(),
            hash_algorithm: HashAlgorithm::Sha256,
        }
    }

    #[test]
    fn tokens_are_deterministic_per_serial() {
        let mock = MockTimestampAuthority::new();
        let first = mock.timestamp(&request("aa")).unwrap();
        assert_eq!(first.token, STANDARD.encode("mock-tst:aa:1"));
        assert_eq!(first.hash.as_deref(), Some("aa"));
        assert_eq!(first.serial_number.as_deref(), Some("1"));
    }

    #[test]
    fn scripted_failures_then_recovery() {
        let mock = MockTimestampAuthority::new();
        mock.fail_next(TimestampFailureKind::Timeout, 2);

        assert_eq!(mock.timestamp(&request("aa")).unwrap_err().kind, TimestampFailureKind::Timeout);
        assert_eq!(mock.timestamp(&request("aa")).unwrap_err().kind, TimestampFailureKind::Timeout);
        assert!(mock.timestamp(&request("aa")).is_ok());
        assert_eq!(mock.request_count(), 3);
    }
}
