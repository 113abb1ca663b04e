//! Canonical encoding of structured values.
//!
//! `CanonicalBytes` is the only byte form the core ever hashes.  Its inner
//! field is private and its only constructor is [`canonicalize`], so no code
//! path can hash a value that skipped the pipeline below.
//!
//! Pipeline:
//!
//! 1. serialize to a `serde_json::Value`;
//! 2. normalize the tree:
//!    - every string and object key to Unicode NFC,
//!    - object members whose value is `null` are dropped, so an absent field
//!      and a `null` field encode identically (array elements keep their
//!      position and stay `null`),
//!    - integral floats become integers and `-0.0` becomes `0`;
//! 3. emit RFC 8785 (JCS) text with `serde_jcs`: sorted keys, no whitespace,
//!    ECMAScript number formatting.

use serde::Serialize;
use serde_json::{Map, Number, Value};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use arras_contracts::error::ArrasError;

/// Identifier of this canonicalization profile.
pub const CANONICALIZER_ID: &str = "arras-jcs-nfc-v1";

/// Structures nested deeper than this are rejected.
pub const MAX_DEPTH: usize = 128;

/// Largest integer magnitude an f64 represents exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanonicalizationError {
    /// The value cannot be expressed as JSON at all.
    #[error("value is not representable: {0}")]
    NotRepresentable(String),

    /// Nesting exceeded [`MAX_DEPTH`].
    #[error("value nested deeper than {max_depth} levels")]
    MaxDepthExceeded { max_depth: usize },

    /// Two distinct keys of one object became equal after NFC normalization.
    #[error("key '{key}' is duplicated after NFC normalization")]
    DuplicateKey { key: String },
}

impl From<CanonicalizationError> for ArrasError {
    fn from(err: CanonicalizationError) -> Self {
        ArrasError::Canonicalization {
            reason: err.to_string(),
        }
    }
}

/// Bytes produced exclusively by [`canonicalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Encode `value` canonically.
///
/// Semantically equal values (same members regardless of key order, same
/// text regardless of Unicode composition, `null` vs. absent) produce
/// identical bytes on every platform.
pub fn canonicalize<T: Serialize + ?Sized>(value: &T) -> Result<CanonicalBytes, CanonicalizationError> {
    let normalized = canonical_value(value)?;
    let text = serde_jcs::to_string(&normalized)
        .map_err(|e| CanonicalizationError::NotRepresentable(e.to_string()))?;
    Ok(CanonicalBytes(text.into_bytes()))
}

/// The normalized JSON tree that [`canonicalize`] encodes.
///
/// Stored payloads use this form so that re-canonicalizing them during
/// verification is a no-op on the tree.
pub fn canonical_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, CanonicalizationError> {
    let value = serde_json::to_value(value)
        .map_err(|e| CanonicalizationError::NotRepresentable(e.to_string()))?;
    normalize(value, 0)
}

fn normalize(value: Value, depth: usize) -> Result<Value, CanonicalizationError> {
    if depth > MAX_DEPTH {
        return Err(CanonicalizationError::MaxDepthExceeded { max_depth: MAX_DEPTH });
    }

    match value {
        Value::Null | Value::Bool(_) => Ok(value),
        Value::String(s) => Ok(Value::String(s.nfc().collect())),
        Value::Number(n) => Ok(Value::Number(normalize_number(n))),
        Value::Array(items) => items
            .into_iter()
            .map(|item| normalize(item, depth + 1))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, item) in map {
                if item.is_null() {
                    continue;
                }
                let key: String = key.nfc().collect();
                let item = normalize(item, depth + 1)?;
                if out.insert(key.clone(), item).is_some() {
                    return Err(CanonicalizationError::DuplicateKey { key });
                }
            }
            Ok(Value::Object(out))
        }
    }
}

fn normalize_number(n: Number) -> Number {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < MAX_SAFE_INTEGER => {
            // `as` saturates; the bound above keeps the conversion exact.
            Number::from(f as i64)
        }
        _ => n,
    }
}
