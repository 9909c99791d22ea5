use std::sync::Arc;

use bytes::Bytes;
use csv_agent::storage::{Database, FileId, FileStore, SqliteStore};

async fn backends(dir: &tempfile::TempDir) -> Vec<(&'static str, Arc<dyn FileStore>)> {
    let redb = Database::open(dir.path().join("redb")).unwrap();
    let sqlite = SqliteStore::open(dir.path().join("sqlite").join("files.sqlite3"))
        .await
        .unwrap();
    vec![("redb", Arc::new(redb)), ("sqlite", Arc::new(sqlite))]
}

#[tokio::test]
async fn test_put_and_get_content() {
    let dir = tempfile::tempdir().unwrap();
    for (name, store) in backends(&dir).await {
        let record = store
            .put("sales.csv", Bytes::from_static(b"A\n40\n2\n"))
            .await
            .unwrap();
        assert_eq!(record.filename, "sales.csv", "{name}");
        assert_eq!(record.byte_size, 7, "{name}");

        let content = store.get(record.id).await.unwrap();
        assert_eq!(
            content.as_deref(),
            Some(&b"A\n40\n2\n"[..]),
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_empty_content_is_stored() {
    let dir = tempfile::tempdir().unwrap();
    for (name, store) in backends(&dir).await {
        let record = store.put("empty.csv", Bytes::new()).await.unwrap();
        assert_eq!(record.byte_size, 0, "{name}");
        assert_eq!(
            store.get(record.id).await.unwrap().as_deref(),
            Some(&b""[..]),
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_get_unknown_id() {
    let dir = tempfile::tempdir().unwrap();
    for (name, store) in backends(&dir).await {
        assert!(store.get(FileId(404)).await.unwrap().is_none(), "{name}");
    }
}

#[tokio::test]
async fn test_ids_increase_and_are_not_reused() {
    let dir = tempfile::tempdir().unwrap();
    for (name, store) in backends(&dir).await {
        let first = store.put("a.csv", Bytes::from_static(b"a\n")).await.unwrap();
        let second = store.put("b.csv", Bytes::from_static(b"b\n")).await.unwrap();
        assert!(second.id > first.id, "{name}");

        assert!(store.delete(second.id).await.unwrap(), "{name}");
        let third = store.put("c.csv", Bytes::from_static(b"c\n")).await.unwrap();
        assert!(third.id > second.id, "{name}");
    }
}

#[tokio::test]
async fn test_delete_removes_record_and_content() {
    let dir = tempfile::tempdir().unwrap();
    for (name, store) in backends(&dir).await {
        let record = store.put("a.csv", Bytes::from_static(b"x\n1\n")).await.unwrap();

        assert!(store.delete(record.id).await.unwrap(), "{name}");
        assert!(store.get(record.id).await.unwrap().is_none(), "{name}");
        assert!(store.list().await.unwrap().is_empty(), "{name}");

        assert!(!store.delete(record.id).await.unwrap(), "{name}");
        assert!(!store.delete(FileId(9999)).await.unwrap(), "{name}");
    }
}

#[tokio::test]
async fn test_list_is_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    for (name, store) in backends(&dir).await {
        for filename in ["first.csv", "second.csv", "third.csv"] {
            store.put(filename, Bytes::from_static(b"x\n")).await.unwrap();
        }

        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.filename)
            .collect();
        assert_eq!(names, vec!["third.csv", "second.csv", "first.csv"], "{name}");
    }
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let id = {
        let db = Database::open(dir.path().join("redb")).unwrap();
        db.put("kept.csv", Bytes::from_static(b"k\n1\n")).await.unwrap().id
    };
    let db = Database::open(dir.path().join("redb")).unwrap();
    assert_eq!(
        db.get(id).await.unwrap().as_deref(),
        Some(&b"k\n1\n"[..])
    );
    let next = db.put("next.csv", Bytes::new()).await.unwrap();
    assert!(next.id > id);

    let path = dir.path().join("sqlite").join("files.sqlite3");
    let id = {
        let store = SqliteStore::open(&path).await.unwrap();
        store.put("kept.csv", Bytes::from_static(b"k\n2\n")).await.unwrap().id
    };
    let store = SqliteStore::open(&path).await.unwrap();
    let records = store.list().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, id);
    assert_eq!(records[0].filename, "kept.csv");
}

#[tokio::test]
async fn test_ping() {
    let dir = tempfile::tempdir().unwrap();
    for (name, store) in backends(&dir).await {
        assert!(store.ping().await, "{name}");
    }
}
