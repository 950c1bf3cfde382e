//! Filesystem provider: one file per session.
//!
//! Layout: `<root>/<id[0]>/<id[1]>/<id><suffix>`. Each file starts with a
//! 16-byte header (big-endian expiration seconds, then big-endian unix
//! seconds of the last save) followed by the encoded payload.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{is_expired, now_unix, Provider};
use crate::error::SessionError;
use crate::Result;

pub const DEFAULT_FILE_SUFFIX: &str = ".session";

const HEADER_LEN: usize = 16;

/// Sessions stored as files under a root directory.
///
/// Writes go to a temporary file that is renamed into place, so readers
/// never see a partial record.
#[derive(Debug)]
pub struct FileProvider {
    root: PathBuf,
    suffix: String,
    lock: RwLock<()>,
}

impl FileProvider {
    /// Create a provider rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            suffix: DEFAULT_FILE_SUFFIX.to_string(),
            lock: RwLock::new(()),
        })
    }

    /// Use a custom file suffix. An empty suffix keeps the default.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        if !suffix.is_empty() {
            self.suffix = suffix;
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Path of the file holding `id`, or `None` if `id` is not usable as a
    /// file name.
    pub fn session_path(&self, id: &[u8]) -> Option<PathBuf> {
        if !is_valid_id(id) {
            return None;
        }
        // Validated as ASCII above.
        let id = std::str::from_utf8(id).ok()?;
        let mut path = self.root.join(&id[0..1]).join(&id[1..2]);
        path.push(format!("{}{}", id, self.suffix));
        Some(path)
    }

    fn require_path(&self, id: &[u8]) -> Result<PathBuf> {
        self.session_path(id).ok_or_else(|| {
            warn!(id = %String::from_utf8_lossy(id), "Rejected session id for file storage");
            SessionError::InvalidSessionId(String::from_utf8_lossy(id).into_owned())
        })
    }

    async fn write_record(&self, path: &Path, data: &[u8], expiration: Duration) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        fs::write(&tmp, encode_record(data, expiration, now_unix())).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Every session file under the root.
    async fn session_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for first in subdirs(&self.root).await? {
            for second in subdirs(&first).await? {
                let mut entries = fs::read_dir(&second).await?;
                while let Some(entry) = entries.next_entry().await? {
                    let path = entry.path();
                    let is_session = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.ends_with(&self.suffix));
                    if is_session && entry.file_type().await?.is_file() {
                        files.push(path);
                    }
                }
            }
        }
        Ok(files)
    }

    /// Remove every file expired at `now` (unix seconds) and prune shard
    /// directories left empty.
    ///
    /// Returns the number of removed sessions.
    pub async fn sweep(&self, now: u64) -> Result<usize> {
        let _guard = self.lock.write().await;

        let mut removed = 0;
        for path in self.session_files().await? {
            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let expired = match decode_record(&bytes) {
                Some((expiration, last_active, _)) => is_expired(last_active, expiration, now),
                None => {
                    warn!(path = %path.display(), "Removing unreadable session file");
                    true
                }
            };
            if expired {
                remove_if_present(&path).await?;
                removed += 1;
            }
        }

        for first in subdirs(&self.root).await? {
            for second in subdirs(&first).await? {
                remove_dir_if_empty(&second).await?;
            }
            remove_dir_if_empty(&first).await?;
        }

        Ok(removed)
    }
}

/// Ids usable as file names: at least two of `[A-Za-z0-9_-]`.
fn is_valid_id(id: &[u8]) -> bool {
    id.len() >= 2
        && id
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || *b == b'-' || *b == b'_')
}

fn encode_record(data: &[u8], expiration: Duration, last_active: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + data.len());
    out.extend_from_slice(&expiration.as_secs().to_be_bytes());
    out.extend_from_slice(&last_active.to_be_bytes());
    out.extend_from_slice(data);
    out
}

/// Split a file into `(expiration, last_active, payload)`.
fn decode_record(bytes: &[u8]) -> Option<(Duration, u64, &[u8])> {
    if bytes.len() < HEADER_LEN {
        return None;
    }
    let (header, payload) = bytes.split_at(HEADER_LEN);
    let expiration = u64::from_be_bytes(header[0..8].try_into().ok()?);
    let last_active = u64::from_be_bytes(header[8..16].try_into().ok()?);
    Some((Duration::from_secs(expiration), last_active, payload))
}

async fn subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut dirs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn remove_dir_if_empty(dir: &Path) -> Result<()> {
    let mut entries = fs::read_dir(dir).await?;
    if entries.next_entry().await?.is_none() {
        match fs::remove_dir(dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[async_trait]
impl Provider for FileProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, id: &[u8]) -> Result<Vec<u8>> {
        let Some(path) = self.session_path(id) else {
            return Ok(Vec::new());
        };

        let _guard = self.lock.read().await;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        match decode_record(&bytes) {
            Some((expiration, last_active, payload)) => {
                if is_expired(last_active, expiration, now_unix()) {
                    Ok(Vec::new())
                } else {
                    Ok(payload.to_vec())
                }
            }
            None => {
                warn!(path = %path.display(), "Ignoring truncated session file");
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, id: &[u8], data: &[u8], expiration: Duration) -> Result<()> {
        let path = self.require_path(id)?;
        let _guard = self.lock.write().await;
        self.write_record(&path, data, expiration).await
    }

    async fn destroy(&self, id: &[u8]) -> Result<()> {
        let Some(path) = self.session_path(id) else {
            return Ok(());
        };
        let _guard = self.lock.write().await;
        remove_if_present(&path).await
    }

    async fn regenerate(
        &self,
        old_id: &[u8],
        new_id: &[u8],
        expiration: Duration,
    ) -> Result<()> {
        let new_path = self.require_path(new_id)?;
        let old_path = self.session_path(old_id);

        let _guard = self.lock.write().await;
        let data = match &old_path {
            Some(path) => match fs::read(path).await {
                // An expired record is gone as far as `get` is concerned.
                Ok(bytes) => decode_record(&bytes)
                    .filter(|(expiration, last_active, _)| {
                        !is_expired(*last_active, *expiration, now_unix())
                    })
                    .map(|(_, _, payload)| payload.to_vec())
                    .unwrap_or_default(),
                Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
                Err(e) => return Err(e.into()),
            },
            None => Vec::new(),
        };

        self.write_record(&new_path, &data, expiration).await?;
        if let Some(path) = old_path.filter(|p| *p != new_path) {
            remove_if_present(&path).await?;
        }
        debug!("Session file moved to new id");
        Ok(())
    }

    async fn count(&self) -> usize {
        let _guard = self.lock.read().await;
        match self.session_files().await {
            Ok(files) => files.len(),
            Err(e) => {
                warn!(error = %e, "Failed to count session files");
                0
            }
        }
    }

    fn need_gc(&self) -> bool {
        true
    }

    async fn gc(&self) -> Result<()> {
        let removed = self.sweep(now_unix()).await?;
        if removed > 0 {
            info!(removed, root = %self.root.display(), "Expired session files removed");
        }
        Ok(())
    }
}
