//! Transfer history ledger
//!
//! Confirmed transfers are kept as one JSON array under a single key of a
//! [`KeyValueStore`]. Appends go through [`KeyValueStore::update`], which is
//! atomic per store: concurrent runs, including separate processes sharing one
//! [`JsonFileStore`] path, never lose each other's records. Duplicate
//! transaction hashes are ignored.

use async_trait::async_trait;
use fs2::FileExt;
use futures::stream::{self, Stream};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::types::TransferRecord;

/// Store key holding the serialized ledger
pub const HISTORY_KEY: &str = "burn-forwarder:transfer-history";

/// Errors from the history store
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("history is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("history writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, HistoryError>;

/// Read-modify-write step applied under the store's lock.
///
/// Receives the current value and returns the value to write, or `None` to
/// leave the key untouched.
pub type UpdateFn = Box<dyn FnOnce(Option<Value>) -> Result<Option<Value>> + Send>;

// ============================================================================
// Key-Value Stores
// ============================================================================

/// Minimal persistent key-value store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn put(&self, key: &str, value: Value) -> Result<()>;

    /// Atomically apply `apply` to the value under `key`; returns whether a
    /// value was written
    async fn update(&self, key: &str, apply: UpdateFn) -> Result<bool>;
}

/// In-memory store. Used for testing
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn update(&self, key: &str, apply: UpdateFn) -> Result<bool> {
        let mut entries = self.entries.write().await;
        match apply(entries.get(key).cloned())? {
            Some(value) => {
                entries.insert(key.to_string(), value);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Store backed by a single JSON object file
///
/// Writers hold an exclusive lock on a sibling `<file>.lock` across the whole
/// read-modify-write, so several processes may share one path. Each write goes
/// to a uniquely named temp file in the same directory which is then renamed
/// over the original; readers never see a partial file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn dir(&self) -> PathBuf {
        match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        }
    }

    fn read_all(path: &Path) -> Result<serde_json::Map<String, Value>> {
        match std::fs::read(path) {
            Ok(bytes) if bytes.is_empty() => Ok(serde_json::Map::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(serde_json::Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Blocking read-modify-write under the file lock
    fn update_locked(&self, key: &str, apply: UpdateFn) -> Result<bool> {
        let dir = self.dir();
        std::fs::create_dir_all(&dir)?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;

        // Re-read under the lock; another writer may have replaced the file.
        let mut all = Self::read_all(&self.path)?;
        let Some(value) = apply(all.remove(key))? else {
            return Ok(false);
        };
        all.insert(key.to_string(), value);

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, &Value::Object(all))?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        // Dropping the handle releases the lock.
        drop(lock);
        Ok(true)
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path.clone();
        let mut all = tokio::task::spawn_blocking(move || Self::read_all(&path)).await??;
        Ok(all.remove(key))
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        self.update(key, Box::new(move |_: Option<Value>| Ok(Some(value)))).await?;
        Ok(())
    }

    async fn update(&self, key: &str, apply: UpdateFn) -> Result<bool> {
        let store = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || store.update_locked(&key, apply)).await?
    }
}

// ============================================================================
// Ledger
// ============================================================================

/// Append-only list of confirmed transfers
pub struct HistoryLedger {
    store: Arc<dyn KeyValueStore>,
}

impl HistoryLedger {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    async fn load(&self) -> Result<Vec<TransferRecord>> {
        match self.store.get(HISTORY_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    /// Append a record; returns `false` if its tx hash was already recorded
    pub async fn append(&self, record: TransferRecord) -> Result<bool> {
        let tx_hash = record.tx_hash;

        let written = self
            .store
            .update(
                HISTORY_KEY,
                Box::new(move |current: Option<Value>| {
                    let mut records: Vec<TransferRecord> = match current {
                        Some(value) => serde_json::from_value(value)?,
                        None => Vec::new(),
                    };
                    if records.iter().any(|r| r.tx_hash == record.tx_hash) {
                        return Ok(None);
                    }
                    records.push(record);
                    Ok(Some(serde_json::to_value(&records)?))
                }),
            )
            .await?;

        if written {
            debug!(tx_hash = %tx_hash, "Appended transfer to history");
        } else {
            debug!(tx_hash = %tx_hash, "Transfer already in history");
        }
        Ok(written)
    }

    /// One page of records, most recent first
    pub async fn list(&self, page: usize, page_size: usize) -> Result<Vec<TransferRecord>> {
        if page_size == 0 {
            return Ok(Vec::new());
        }
        let records = self.load().await?;
        Ok(records
            .into_iter()
            .rev()
            .skip(page.saturating_mul(page_size))
            .take(page_size)
            .collect())
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.load().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Stream of non-empty pages, most recent first
    pub fn pages(
        &self,
        page_size: usize,
    ) -> impl Stream<Item = Result<Vec<TransferRecord>>> + '_ {
        stream::try_unfold(0usize, move |page| async move {
            let records = self.list(page, page_size).await?;
            if records.is_empty() {
                Ok(None)
            } else {
                Ok(Some((records, page + 1)))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, B256, U256};
    use chrono::{Duration, Utc};
    use futures::TryStreamExt;

    fn record(n: u8) -> TransferRecord {
        TransferRecord {
            timestamp: Utc::now() + Duration::seconds(n as i64),
            from: Address::repeat_byte(1),
            to: Address::repeat_byte(2),
            tx_hash: B256::repeat_byte(n),
            amount: U256::from(n as u64 * 1_000),
            destination_domain: 3,
            memo: None,
        }
    }

    fn ledger() -> HistoryLedger {
        HistoryLedger::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_empty_history() {
        let ledger = ledger();
        assert!(ledger.is_empty().await.unwrap());
        assert!(ledger.list(0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_is_most_recent_first() {
        let ledger = ledger();
        for n in 1..=3 {
            ledger.append(record(n)).await.unwrap();
        }

        let records = ledger.list(0, 10).await.unwrap();
        let hashes: Vec<_> = records.iter().map(|r| r.tx_hash).collect();
        assert_eq!(
            hashes,
            vec![B256::repeat_byte(3), B256::repeat_byte(2), B256::repeat_byte(1)]
        );
    }

    #[tokio::test]
    async fn test_pagination() {
        let ledger = ledger();
        for n in 1..=5 {
            ledger.append(record(n)).await.unwrap();
        }

        assert_eq!(ledger.list(0, 2).await.unwrap().len(), 2);
        assert_eq!(ledger.list(2, 2).await.unwrap().len(), 1);
        assert_eq!(ledger.list(2, 2).await.unwrap()[0].tx_hash, B256::repeat_byte(1));
        assert!(ledger.list(3, 2).await.unwrap().is_empty());
        assert!(ledger.list(0, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_tx_hash_is_ignored() {
        let ledger = ledger();
        assert!(ledger.append(record(1)).await.unwrap());
        assert!(!ledger.append(record(1)).await.unwrap());
        assert_eq!(ledger.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_pages_stream() {
        let ledger = ledger();
        for n in 1..=5 {
            ledger.append(record(n)).await.unwrap();
        }

        let pages: Vec<Vec<TransferRecord>> = ledger.pages(2).try_collect().await.unwrap();
        let sizes: Vec<_> = pages.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let ledger = Arc::new(ledger());
        let mut handles = Vec::new();
        for n in 1..=16u8 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move { ledger.append(record(n)).await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap());
        }

        assert_eq!(ledger.len().await.unwrap(), 16);
    }

    #[tokio::test]
    async fn test_corrupt_history_is_error() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(HISTORY_KEY, serde_json::json!({"not": "a list"}))
            .await
            .unwrap();

        let ledger = HistoryLedger::new(store);
        assert!(matches!(
            ledger.list(0, 10).await,
            Err(HistoryError::Serde(_))
        ));
    }
}
