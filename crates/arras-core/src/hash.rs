//! The hash engine.
//!
//! Every digest in the core is computed here, with the algorithm named by
//! `HashAlgorithm::CURRENT`.  Callers that hash several byte strings in
//! sequence use [`hash_parts`], which is equivalent to hashing their
//! concatenation.

use sha2::{Digest as _, Sha256};

use arras_contracts::digest::{Digest, HashAlgorithm};

use crate::canonical::CanonicalBytes;

/// Hash `bytes` with the current algorithm.
pub fn hash(bytes: &[u8]) -> Digest {
    hash_parts(&[bytes])
}

/// Hash the concatenation of `parts` with the current algorithm.
pub fn hash_parts(parts: &[&[u8]]) -> Digest {
    match HashAlgorithm::CURRENT {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            for part in parts {
                hasher.update(part);
            }
            Digest::new(HashAlgorithm::Sha256, hex::encode(hasher.finalize()))
        }
    }
}

/// Hash canonical bytes.
pub fn hash_canonical(bytes: &CanonicalBytes) -> Digest {
    hash(bytes.as_bytes())
}

/// True when `hex` has the shape of a digest produced by `algorithm`.
pub fn is_well_formed(algorithm: HashAlgorithm, hex: &str) -> bool {
    hex.len() == algorithm.hex_len()
        && hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        let digest = hash(b"abc");
        assert_eq!(digest.algorithm, HashAlgorithm::Sha256);
        assert_eq!(
            digest.hex,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn parts_equal_concatenation() {
        assert_eq!(hash_parts(&[b"ab".as_slice(), b"".as_slice(), b"c".as_slice()]), hash(b"abc"));
    }

    #[test]
    fn digest_display_carries_algorithm() {
        assert!(hash(b"x").to_string().starts_with("sha256:"));
    }

    #[test]
    fn well_formed_check() {
        assert!(is_well_formed(HashAlgorithm::Sha256, &hash(b"x").hex));
        assert!(!is_well_formed(HashAlgorithm::Sha256, "abc"));
        assert!(!is_well_formed(HashAlgorithm::Sha256, &"G".repeat(64)));
    }
}
