//! In-process provider on top of [`CcMap`].

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{is_expired, now_unix, Provider};
use crate::ccmap::CcMap;
use crate::error::SessionError;
use crate::Result;

/// One stored session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRecord {
    pub data: Vec<u8>,
    /// Unix seconds of the last save.
    pub last_active: u64,
    /// Zero means never expires.
    pub expiration: Duration,
}

/// Sessions kept in a sharded in-memory map.
///
/// Records vanish with the process. Expired records are removed by
/// [`Provider::gc`] and are also hidden from `get` until then.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    records: CcMap<MemoryRecord>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shards(shards: usize) -> Self {
        Self {
            records: CcMap::with_shards(shards),
        }
    }

    /// Insert a record as-is, bypassing the clock.
    pub fn insert_record(&self, id: &str, record: MemoryRecord) {
        self.records.set(id, record);
    }

    /// Stored record for `id`, expired or not.
    pub fn record(&self, id: &str) -> Option<MemoryRecord> {
        self.records.get(id)
    }

    /// Remove every record expired at `now` (unix seconds).
    ///
    /// Returns the number of removed records.
    pub fn sweep(&self, now: u64) -> usize {
        self.records
            .retain(|_, record| !is_expired(record.last_active, record.expiration, now))
    }
}

fn key(id: &[u8]) -> Option<&str> {
    std::str::from_utf8(id).ok().filter(|k| !k.is_empty())
}

fn require_key(id: &[u8]) -> Result<&str> {
    key(id).ok_or_else(|| SessionError::InvalidSessionId(String::from_utf8_lossy(id).into_owned()))
}

#[async_trait]
impl Provider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, id: &[u8]) -> Result<Vec<u8>> {
        let Some(key) = key(id) else {
            return Ok(Vec::new());
        };

        let now = now_unix();
        let expired = self
            .records
            .remove_if(key, |r| is_expired(r.last_active, r.expiration, now));
        if expired.is_some() {
            return Ok(Vec::new());
        }
        Ok(self.records.get(key).map(|record| record.data).unwrap_or_default())
    }

    async fn save(&self, id: &[u8], data: &[u8], expiration: Duration) -> Result<()> {
        let key = require_key(id)?;
        self.records.set(
            key,
            MemoryRecord {
                data: data.to_vec(),
                last_active: now_unix(),
                expiration,
            },
        );
        Ok(())
    }

    async fn destroy(&self, id: &[u8]) -> Result<()> {
        if let Some(key) = key(id) {
            self.records.delete(key);
        }
        Ok(())
    }

    async fn regenerate(
        &self,
        old_id: &[u8],
        new_id: &[u8],
        expiration: Duration,
    ) -> Result<()> {
        let new_key = require_key(new_id)?;
        let now = now_unix();
        // An expired record is gone as far as `get` is concerned.
        let data = key(old_id)
            .and_then(|old_key| self.records.get_once(old_key))
            .filter(|record| !is_expired(record.last_active, record.expiration, now))
            .map(|record| record.data)
            .unwrap_or_default();

        self.records.set(
            new_key,
            MemoryRecord {
                data,
                last_active: now,
                expiration,
            },
        );
        Ok(())
    }

    async fn count(&self) -> usize {
        self.records.count()
    }

    fn need_gc(&self) -> bool {
        true
    }

    async fn gc(&self) -> Result<()> {
        let removed = self.sweep(now_unix());
        if removed > 0 {
            info!(removed, "Expired sessions removed");
        } else {
            debug!("No expired sessions");
        }
        Ok(())
    }
}
