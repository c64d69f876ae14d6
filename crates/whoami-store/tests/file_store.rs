use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use whoami_core::{ClientId, CounterStore, VisitCounts, VisitTotals};
use whoami_store::{FileStore, StoreError};

/// Fresh, existing directory for one test's ledger.
fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("whoami-store-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

#[tokio::test]
async fn test_file_store_dyn_dispatch() {
    let dir = temp_dir();
    let store: Arc<dyn CounterStore> = Arc::new(FileStore::new(dir.join("visits.json")));

    let counts = store
        .increment(&ClientId::from("1.2.3.4"))
        .await
        .expect("increment");
    assert_eq!(
        counts,
        VisitCounts {
            total: 1,
            unique: 1,
            your_visits: 1
        }
    );
    assert_eq!(store.name(), "file");
    assert!(store.is_ready());
}

#[tokio::test]
async fn test_sequential_scenarios() {
    let dir = temp_dir();
    let store = FileStore::new(dir.join("visits.json"));
    let a = ClientId::from("1.2.3.4");
    let b = ClientId::from("5.6.7.8");

    let first = store.increment(&a).await.expect("first");
    let second = store.increment(&a).await.expect("second");
    let third = store.increment(&b).await.expect("third");

    assert_eq!((first.total, first.unique, first.your_visits), (1, 1, 1));
    assert_eq!((second.total, second.unique, second.your_visits), (2, 1, 2));
    assert_eq!((third.total, third.unique, third.your_visits), (3, 2, 1));
    assert_eq!(
        store.snapshot().await.expect("snapshot"),
        VisitTotals {
            total: 3,
            unique: 2
        }
    );
}

#[tokio::test]
async fn test_snapshot_of_missing_ledger_is_empty() {
    let dir = temp_dir();
    let store = FileStore::new(dir.join("visits.json"));
    assert_eq!(
        store.snapshot().await.expect("snapshot"),
        VisitTotals::default()
    );
    assert!(!dir.join("visits.json").exists(), "snapshot must not write");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_increments_are_not_lost() {
    let dir = temp_dir();
    let store = Arc::new(FileStore::new(dir.join("visits.json")));
    let clients = ["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4"];
    let per_client = 25;

    let mut handles = Vec::new();
    for client in clients {
        for _ in 0..per_client {
            let store = Arc::clone(&store);
            let id = ClientId::from(client);
            handles.push(tokio::spawn(async move {
                let counts = store.increment(&id).await.expect("increment");
                (id, counts)
            }));
        }
    }

    let mut seen: HashMap<ClientId, Vec<u64>> = HashMap::new();
    let mut totals = Vec::new();
    for handle in handles {
        let (id, counts) = handle.await.expect("join");
        seen.entry(id).or_default().push(counts.your_visits);
        totals.push(counts.total);
    }

    // Every total 1..=100 handed out exactly once.
    totals.sort_unstable();
    let expected: Vec<u64> = (1..=(clients.len() * per_client) as u64).collect();
    assert_eq!(totals, expected);

    // Each client saw its own 1..=25 exactly once.
    for client in clients {
        let mut visits = seen.remove(&ClientId::from(client)).expect("client seen");
        visits.sort_unstable();
        assert_eq!(visits, (1..=per_client as u64).collect::<Vec<_>>());
    }

    let snapshot = store.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.total, 100);
    assert_eq!(snapshot.unique, 4);
}

#[tokio::test]
async fn test_restart_resumes_from_persisted_ledger() {
    let dir = temp_dir();
    let path = dir.join("visits.json");

    {
        let store = FileStore::new(&path);
        for _ in 0..3 {
            store
                .increment(&ClientId::from("1.2.3.4"))
                .await
                .expect("increment");
        }
    }

    let reopened = FileStore::new(&path);
    let counts = reopened
        .increment(&ClientId::from("1.2.3.4"))
        .await
        .expect("increment after restart");
    assert_eq!((counts.total, counts.unique, counts.your_visits), (4, 1, 4));
}

#[tokio::test]
async fn test_persisted_layout() {
    let dir = temp_dir();
    let path = dir.join("visits.json");
    let store = FileStore::new(&path);
    store
        .increment(&ClientId::from("1.2.3.4"))
        .await
        .expect("increment");
    store
        .increment(&ClientId::from("5.6.7.8"))
        .await
        .expect("increment");

    let raw = std::fs::read(&path).expect("read ledger");
    let json: serde_json::Value = serde_json::from_slice(&raw).expect("ledger is JSON");
    assert_eq!(json["total"], 2);
    assert_eq!(json["byClient"]["1.2.3.4"], 1);
    assert_eq!(json["byClient"]["5.6.7.8"], 1);
    assert!(
        !dir.join("visits.json.tmp").exists(),
        "temp file must be renamed away"
    );
}

#[tokio::test]
async fn test_corrupt_ledger_resets_to_empty() {
    let dir = temp_dir();
    let path = dir.join("visits.json");
    std::fs::write(&path, b"{ this is not json").expect("write garbage");

    let store = FileStore::new(&path);
    let counts = store
        .increment(&ClientId::from("1.2.3.4"))
        .await
        .expect("corruption is not an error");
    assert_eq!((counts.total, counts.unique, counts.your_visits), (1, 1, 1));
}

#[tokio::test]
async fn test_write_failure_is_reported_and_not_persisted() {
    let dir = temp_dir();
    // Parent directory does not exist: reads see "no ledger", writes fail.
    let store = FileStore::new(dir.join("missing").join("visits.json"));
    let id = ClientId::from("1.2.3.4");

    for _ in 0..2 {
        let err = store.increment(&id).await.expect_err("write must fail");
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Write(_))
        ));
    }
    assert_eq!(
        store.snapshot().await.expect("snapshot"),
        VisitTotals::default()
    );
}

#[tokio::test]
async fn test_write_failure_keeps_last_persisted_counts() {
    let dir = temp_dir();
    let path = dir.join("visits.json");
    let store = FileStore::new(&path);
    let id = ClientId::from("1.2.3.4");
    store.increment(&id).await.expect("first increment");

    // Block the temp file so the next write fails.
    std::fs::create_dir_all(dir.join("visits.json.tmp")).expect("block tmp path");
    assert!(store.increment(&id).await.is_err());

    let totals = store.snapshot().await.expect("snapshot");
    assert_eq!(totals, VisitTotals { total: 1, unique: 1 });
}

#[tokio::test]
async fn test_unreadable_ledger_is_an_error() {
    let dir = temp_dir();
    // A directory where the document should be cannot be read as a file.
    let store = FileStore::new(&dir);
    assert!(store.increment(&ClientId::from("1.2.3.4")).await.is_err());
    assert!(store.snapshot().await.is_err());
}

#[tokio::test]
async fn test_unknown_client_accumulates_under_empty_key() {
    let dir = temp_dir();
    let store = FileStore::new(dir.join("visits.json"));
    let unknown = ClientId::default();

    store.increment(&unknown).await.expect("first");
    let counts = store.increment(&unknown).await.expect("second");
    assert_eq!((counts.total, counts.unique, counts.your_visits), (2, 1, 2));
}
