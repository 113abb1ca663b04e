//! Versioned normalization and hashing of personal data.
//!
//! Raw personal data never reaches a hashed payload.  Each value is first
//! normalized by the procedure of a given [`NormalizationVersion`] and then
//! hashed; the version tag is stored next to the digest.  The same input
//! under the same version always yields the same digest.
//!
//! | Field            | v1                                            | v2 (current)                       |
//! |------------------|-----------------------------------------------|------------------------------------|
//! | name             | NFKD, strip marks, lowercase, collapse spaces | v1 + drop punctuation              |
//! | email            | trim, NFC, lowercase                          | v1 + drop `+tag` sub-address       |
//! | document number  | NFKC, uppercase, alphanumerics only           | same                               |
//! | IP address       | canonical `IpAddr` text, v4-mapped → v4       | same                               |
//! | user agent       | trim, collapse whitespace                     | same                               |

use std::net::IpAddr;

use thiserror::Error;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use arras_contracts::{
    error::ArrasError,
    pii::{HashedPii, NormalizationVersion, PiiField},
};

use crate::hash::hash;

/// Shortest normalized document number for which `last4` is exposed.
const LAST4_MIN_LEN: usize = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PiiError {
    #[error("{field} is empty after normalization")]
    EmptyValue { field: PiiField },
}

impl From<PiiError> for ArrasError {
    fn from(err: PiiError) -> Self {
        ArrasError::Pii {
            reason: err.to_string(),
        }
    }
}

/// Normalize `value` as `field` under `version`.
pub fn normalize(
    field: PiiField,
    value: &str,
    version: NormalizationVersion,
) -> Result<String, PiiError> {
    let normalized = match field {
        PiiField::Name => normalize_name(value, version),
        PiiField::Email => normalize_email(value, version),
        PiiField::DocumentNumber => normalize_document_number(value),
        PiiField::IpAddress => normalize_ip(value),
        PiiField::UserAgent => collapse_whitespace(value),
    };
    if normalized.is_empty() {
        return Err(PiiError::EmptyValue { field });
    }
    Ok(normalized)
}

/// Normalize and hash `value`.  Document numbers also get a `last4` fragment.
pub fn hash_pii(
    field: PiiField,
    value: &str,
    version: NormalizationVersion,
) -> Result<HashedPii, PiiError> {
    let normalized = normalize(field, value, version)?;
    let last4 = match field {
        PiiField::DocumentNumber => last4(&normalized),
        _ => None,
    };
    Ok(HashedPii {
        field,
        digest: hash(normalized.as_bytes()),
        normalization_version: version,
        last4,
    })
}

fn normalize_name(value: &str, version: NormalizationVersion) -> String {
    let stripped: String = value
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| match version {
            NormalizationVersion::V1 => true,
            NormalizationVersion::V2 => c.is_alphanumeric() || c.is_whitespace(),
        })
        .collect::<String>()
        .to_lowercase();
    collapse_whitespace(&stripped).nfc().collect()
}

fn normalize_email(value: &str, version: NormalizationVersion) -> String {
    let email: String = value.trim().nfc().collect::<String>().to_lowercase();
    match version {
        NormalizationVersion::V1 => email,
        NormalizationVersion::V2 => match email.rsplit_once('@') {
            Some((local, domain)) => {
                let base = local.split('+').next().unwrap_or(local);
                if base.is_empty() {
                    email
                } else {
                    format!("{}@{}", base, domain)
                }
            }
            None => email,
        },
    }
}

fn normalize_document_number(value: &str) -> String {
    value
        .nfkc()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

fn normalize_ip(value: &str) -> String {
    let trimmed = value.trim();
    match trimmed.parse::<IpAddr>() {
        Ok(IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
        Ok(ip) => ip.to_string(),
        Err(_) => trimmed.to_lowercase(),
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn last4(normalized: &str) -> Option<String> {
    let chars: Vec<char> = normalized.chars().collect();
    if chars.len() < LAST4_MIN_LEN {
        return None;
    }
    Some(chars[chars.len() - 4..].iter().collect())
}
