//! Opaque refresh and reset token generation.
//!
//! Both kinds are prefixed with the owning user's id and followed by random
//! bytes in hex. Only their SHA-256 digest is persisted.

use rand::{RngCore, rng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const REFRESH_TOKEN_RANDOM_BYTES: usize = 40;
const RESET_TOKEN_RANDOM_BYTES: usize = 36;

/// Length of a reset token in hex characters.
pub const RESET_TOKEN_LEN: usize = 104;

/// Maximum accepted length of a refresh token presented at login.
pub const REFRESH_TOKEN_MAX_LEN: usize = 1024;

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

/// `<user id>.<80 hex chars>`
pub fn generate_refresh_token(user_id: Uuid) -> String {
    format!(
        "{}.{}",
        user_id.simple(),
        random_hex(REFRESH_TOKEN_RANDOM_BYTES)
    )
}

/// `<user id><72 hex chars>`, 104 hex characters in all.
pub fn generate_reset_token(user_id: Uuid) -> String {
    format!(
        "{}{}",
        user_id.simple(),
        random_hex(RESET_TOKEN_RANDOM_BYTES)
    )
}

/// SHA-256 hash a token for storage.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
