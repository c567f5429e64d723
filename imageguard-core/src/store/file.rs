//! Flat-file fingerprint log.
//!
//! One fingerprint per line, 16 lowercase hex digits, newline-terminated.
//! Appends are serialized in-process by an async mutex held for exactly one
//! append; each entry goes out in a single `O_APPEND` write.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::{FingerprintStore, Snapshot};
use crate::error::{GuardError, Result};
use crate::fingerprint::Fingerprint;

/// Fingerprint store backed by an append-only text file.
#[derive(Debug)]
pub struct FileFingerprintStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileFingerprintStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse log contents into a snapshot.
///
/// Blank lines are ignored. Malformed lines are skipped and counted; the
/// returned count is the number of skipped lines.
pub fn parse_log(contents: &str) -> (Snapshot, usize) {
    let mut snapshot = Snapshot::new();
    let mut skipped = 0;

    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match Fingerprint::from_hex(line) {
            Ok(fp) => {
                snapshot.insert(fp);
            }
            Err(e) => {
                skipped += 1;
                warn!(line = index + 1, error = %e, "Skipping malformed fingerprint entry");
            }
        }
    }

    (snapshot, skipped)
}

#[async_trait]
impl FingerprintStore for FileFingerprintStore {
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    async fn load_snapshot(&self) -> Result<Snapshot> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Fingerprint log does not exist yet, using empty snapshot");
                return Ok(Snapshot::new());
            }
            Err(e) => {
                return Err(GuardError::StoreLoad(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };

        let (snapshot, skipped) = parse_log(&String::from_utf8_lossy(&contents));
        debug!(
            fingerprints = snapshot.len(),
            skipped, "Loaded fingerprint snapshot"
        );
        Ok(snapshot)
    }

    #[instrument(level = "debug", skip_all, fields(path = %self.path.display(), fingerprint = %fingerprint))]
    async fn append(&self, fingerprint: Fingerprint) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let write_err = |e: std::io::Error| {
            GuardError::StoreWrite(format!("Failed to append to {}: {e}", self.path.display()))
        };

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .await
            .map_err(write_err)?;

        // A hand-edited log may lack its final newline; never glue onto it.
        let mut entry = String::with_capacity(18);
        let len = file.metadata().await.map_err(write_err)?.len();
        if len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1)).await.map_err(write_err)?;
            file.read_exact(&mut last).await.map_err(write_err)?;
            if last[0] != b'\n' {
                entry.push('\n');
            }
        }
        entry.push_str(&fingerprint.to_hex());
        entry.push('\n');

        file.write_all(entry.as_bytes()).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;
        file.sync_data().await.map_err(write_err)?;

        debug!("Appended fingerprint");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_parse_log_skips_malformed_lines() {
        let contents = "deadbeefcafebabe\nnot-a-hash\n\n0000000000000001\nabc\n";
        let (snapshot, skipped) = parse_log(contents);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(skipped, 2);
        assert!(snapshot.contains(&Fingerprint::from_u64(1)));
    }

    #[test]
    fn test_parse_log_tolerates_crlf_and_duplicates() {
        let contents = "deadbeefcafebabe\r\ndeadbeefcafebabe\r\n";
        let (snapshot, skipped) = parse_log(contents);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(skipped, 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = FileFingerprintStore::new(dir.path().join("absent.txt"));
        let snapshot = store.load_snapshot().await.unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_path_is_load_error() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be read as a file.
        let store = FileFingerprintStore::new(dir.path());
        let err = store.load_snapshot().await.unwrap_err();
        assert!(matches!(err, GuardError::StoreLoad(_)));
    }

    #[tokio::test]
    async fn test_append_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blocked.txt");
        let store = FileFingerprintStore::new(&path);

        store.append(Fingerprint::from_u64(0xABCD)).await.unwrap();
        store.append(Fingerprint::from_u64(0xABCD)).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "000000000000abcd\n000000000000abcd\n");

        let snapshot = store.load_snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn test_append_repairs_missing_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blocked.txt");
        std::fs::write(&path, "deadbeefcafebabe").unwrap();

        let store = FileFingerprintStore::new(&path);
        store.append(Fingerprint::from_u64(1)).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "deadbeefcafebabe\n0000000000000001\n");
        assert_eq!(store.load_snapshot().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_append_to_directory_is_write_error() {
        let dir = TempDir::new().unwrap();
        let store = FileFingerprintStore::new(dir.path());
        let err = store.append(Fingerprint::from_u64(1)).await.unwrap_err();
        assert!(matches!(err, GuardError::StoreWrite(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_never_tear() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blocked.txt");
        let store = Arc::new(FileFingerprintStore::new(&path));

        let mut handles = Vec::new();
        for i in 0..64u64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .append(Fingerprint::from_u64(i.wrapping_mul(0x9E37_79B9_7F4A_7C15)))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 64);
        assert!(lines.iter().all(|l| Fingerprint::from_hex(l).is_ok()));

        let (snapshot, skipped) = parse_log(&contents);
        assert_eq!(skipped, 0);
        assert_eq!(snapshot.len(), 64);
    }
}
