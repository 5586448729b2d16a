//! Token and API-key predicates, plus fresh-token generation.
//!
//! The SUT performs its own validation; the harness computes the same
//! predicates independently and uses them only to predict expected outcomes,
//! so any divergence between the two shows up as a contract violation.

use rand::Rng;

/// Required session token length in characters.
pub const TOKEN_LENGTH: usize = 32;

/// Character pool for generated tokens.
const TOKEN_POOL: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// A session token is well-formed iff it is exactly [`TOKEN_LENGTH`]
/// characters and every character is an ASCII letter or digit.
#[must_use]
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// An API key is valid iff it was sent, is non-empty, and exactly equals the
/// configured secret. Absent, empty, and mismatched keys are all invalid.
#[must_use]
pub fn is_valid_api_key(provided: Option<&str>, configured: &str) -> bool {
    provided.is_some_and(|key| !key.is_empty() && key == configured)
}

/// Generate a fresh well-formed token.
///
/// Each scenario draws its own token so state transitions never collide
/// across scenarios.
pub fn generate(rng: &mut impl Rng) -> String {
    (0..TOKEN_LENGTH)
        .map(|_| TOKEN_POOL[rng.gen_range(0..TOKEN_POOL.len())] as char)
        .collect()
}
