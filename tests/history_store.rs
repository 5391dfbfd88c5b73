//! File-backed history ledger tests

use alloy::primitives::{Address, Bytes, B256, U256};
use chrono::Utc;
use futures::TryStreamExt;
use std::sync::Arc;
use tokio_test::assert_ok;

use forwarder::history::{HistoryError, HISTORY_KEY};
use forwarder::{HistoryLedger, JsonFileStore, KeyValueStore, TransferRecord};

fn record(n: u8, memo: Option<&'static [u8]>) -> TransferRecord {
    TransferRecord {
        timestamp: Utc::now(),
        from: Address::repeat_byte(0x5e),
        to: Address::repeat_byte(0x42),
        tx_hash: B256::repeat_byte(n),
        amount: U256::from(1_000_000u64) * U256::from(n),
        destination_domain: 3,
        memo: memo.map(Bytes::from_static),
    }
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");

    {
        let ledger = HistoryLedger::new(Arc::new(JsonFileStore::new(&path)));
        assert_ok!(ledger.append(record(1, None)).await);
        assert_ok!(ledger.append(record(2, Some(b"invoice 42"))).await);
    }

    let reopened = HistoryLedger::new(Arc::new(JsonFileStore::new(&path)));
    let records = reopened.list(0, 10).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0], {
        let mut expected = record(2, Some(b"invoice 42"));
        expected.timestamp = records[0].timestamp;
        expected
    });
    assert_eq!(records[1].tx_hash, B256::repeat_byte(1));
    assert_eq!(records[1].memo, None);
}

#[tokio::test]
async fn test_missing_file_is_empty_history() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = HistoryLedger::new(Arc::new(JsonFileStore::new(dir.path().join("absent.json"))));

    assert!(ledger.is_empty().await.unwrap());
    let pages: Vec<Vec<TransferRecord>> = ledger.pages(5).try_collect().await.unwrap();
    assert!(pages.is_empty());
}

#[tokio::test]
async fn test_store_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state").join("history.json");
    let ledger = HistoryLedger::new(Arc::new(JsonFileStore::new(&path)));

    assert!(ledger.append(record(7, None)).await.unwrap());
    assert!(path.exists());
}

#[tokio::test]
async fn test_store_keeps_other_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("state.json")));
    store
        .put("ui:last-domain", serde_json::json!(3))
        .await
        .unwrap();

    let ledger = HistoryLedger::new(store.clone());
    ledger.append(record(1, None)).await.unwrap();

    assert_eq!(
        store.get("ui:last-domain").await.unwrap(),
        Some(serde_json::json!(3))
    );
    assert!(store.get(HISTORY_KEY).await.unwrap().is_some());
}

#[tokio::test]
async fn test_corrupt_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    std::fs::write(&path, b"{ not json").unwrap();

    let ledger = HistoryLedger::new(Arc::new(JsonFileStore::new(&path)));
    assert!(matches!(
        ledger.list(0, 10).await,
        Err(HistoryError::Serde(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_ledgers_sharing_a_file_keep_every_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    let first = Arc::new(HistoryLedger::new(Arc::new(JsonFileStore::new(&path))));
    let second = Arc::new(HistoryLedger::new(Arc::new(JsonFileStore::new(&path))));

    let mut handles = Vec::new();
    for n in 1..=20u8 {
        let ledger = if n % 2 == 0 { first.clone() } else { second.clone() };
        handles.push(tokio::spawn(async move { ledger.append(record(n, None)).await }));
    }
    for handle in handles {
        assert!(assert_ok!(handle.await.unwrap()));
    }

    assert_eq!(first.len().await.unwrap(), 20);
    let reopened = HistoryLedger::new(Arc::new(JsonFileStore::new(&path)));
    assert_eq!(reopened.len().await.unwrap(), 20);
}

#[tokio::test]
async fn test_duplicate_from_another_ledger_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    let first = HistoryLedger::new(Arc::new(JsonFileStore::new(&path)));
    let second = HistoryLedger::new(Arc::new(JsonFileStore::new(&path)));

    assert!(first.append(record(9, None)).await.unwrap());
    assert!(!second.append(record(9, None)).await.unwrap());
    assert_eq!(second.len().await.unwrap(), 1);
}
