//! Hash-derived transforms - email, username and hash.
//!
//! These depend only on the value stored at transform time, so the same
//! input always maps to the same hash segment.

use super::name;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Placeholder domain for anonymized emails
pub const EMAIL_DOMAIN: &str = "example.com";

const EMAIL_HASH_LEN: usize = 10;
const USERNAME_HASH_LEN: usize = 5;

/// SHA-256 of `value` as lowercase hex
pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// `<first 10 hex chars>@example.com`
pub fn email(value: &str) -> String {
    let hash = sha256_hex(value);
    format!("{}@{}", &hash[..EMAIL_HASH_LEN], EMAIL_DOMAIN)
}

/// `<random first name>-<first 5 hex chars>`
pub fn username<R: Rng>(value: &str, rng: &mut R) -> String {
    let hash = sha256_hex(value);
    format!("{}-{}", name::first(rng), &hash[..USERNAME_HASH_LEN])
}

/// Hex digest truncated to `length`; unset or zero keeps all 64 characters
pub fn hash(value: &str, length: Option<usize>) -> String {
    let mut hash = sha256_hex(value);
    if let Some(length) = length.filter(|&n| n > 0) {
        hash.truncate(length);
    }
    hash
}
