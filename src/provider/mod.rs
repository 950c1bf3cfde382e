//! Storage backends.
//!
//! A provider stores opaque session payloads keyed by session id. Encoding
//! is done by the manager, so providers only ever see bytes.

mod file;
mod memory;
mod registry;

pub use file::{FileProvider, DEFAULT_FILE_SUFFIX};
pub use memory::{MemoryProvider, MemoryRecord};
pub use registry::ProviderRegistry;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::Result;

/// Table layout used by relational backends.
pub const RELATIONAL_SCHEMA: &str = "CREATE TABLE session (\n  \
    id VARCHAR(64) NOT NULL PRIMARY KEY,\n  \
    data BLOB NOT NULL,\n  \
    last_active BIGINT NOT NULL DEFAULT 0,\n  \
    expiration BIGINT NOT NULL DEFAULT 0\n)";

/// Key layout used by key-value backends: `<prefix>:<id>`.
pub fn kv_key(prefix: &str, id: &[u8]) -> String {
    format!("{}:{}", prefix, String::from_utf8_lossy(id))
}

/// Seconds since the unix epoch.
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Whether a record last touched at `last_active` with lifetime
/// `expiration` is expired at `now`. A zero lifetime never expires.
pub fn is_expired(last_active: u64, expiration: Duration, now: u64) -> bool {
    !expiration.is_zero() && last_active.saturating_add(expiration.as_secs()) <= now
}

/// Session storage backend.
///
/// Implementations are shared by every request and must be safe to call
/// concurrently. An unknown id is not an error: `get` returns empty bytes.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &str;

    /// Stored payload, or empty bytes for an unknown id.
    async fn get(&self, id: &[u8]) -> Result<Vec<u8>>;

    /// Upsert the payload and refresh its lifetime.
    ///
    /// `Duration::ZERO` means the record never expires.
    async fn save(&self, id: &[u8], data: &[u8], expiration: Duration) -> Result<()>;

    /// Remove the record. Unknown ids are ignored.
    async fn destroy(&self, id: &[u8]) -> Result<()>;

    /// Move the payload of `old_id` to `new_id` and remove `old_id`.
    ///
    /// An unknown `old_id` leaves an empty record under `new_id`.
    async fn regenerate(&self, old_id: &[u8], new_id: &[u8], expiration: Duration)
        -> Result<()>;

    /// Number of stored records, best effort.
    async fn count(&self) -> usize;

    /// Whether this backend relies on [`Provider::gc`] to expire records.
    fn need_gc(&self) -> bool;

    /// Remove expired records.
    async fn gc(&self) -> Result<()>;
}
