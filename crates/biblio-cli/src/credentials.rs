//! Credential hashing
//!
//! The store compares credentials verbatim, so the CLI decides what a
//! credential is: a SHA-256 digest of the username and password, hex
//! encoded. The username is mixed in so equal passwords differ per user.

use sha2::{Digest, Sha256};

pub fn hash_credential(username: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.update([0u8]);
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}
