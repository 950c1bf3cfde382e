//! Session id generation.

use std::sync::Arc;

use rand::RngExt as _;

/// Default length of generated session ids, in bytes.
pub const DEFAULT_ID_LENGTH: usize = 32;

/// Alphabet used by [`generate_id`].
pub const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Produces a fresh session id.
///
/// Returning an empty vector is a configuration defect and makes the
/// manager fail with [`crate::SessionError::EmptySessionId`].
pub type IdGenerator = Arc<dyn Fn() -> Vec<u8> + Send + Sync>;

/// Generate a random alphanumeric id of `len` bytes.
///
/// Uses the thread-local CSPRNG, so ids are unpredictable as well as unique.
pub fn generate_id(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())])
        .collect()
}

/// Default generator producing ids of `len` bytes.
pub fn default_generator(len: usize) -> IdGenerator {
    Arc::new(move || generate_id(len))
}

/// Render an id for logs without dumping the full secret.
pub fn redact(id: &[u8]) -> String {
    let shown = &id[..id.len().min(6)];
    format!("{}…({} bytes)", String::from_utf8_lossy(shown), id.len())
}
