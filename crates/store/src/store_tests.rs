use super::*;

use std::{sync::Arc, thread};

use keeper_fs::UNKNOWN_OWNER;
use tempfile::TempDir;

fn temp_store() -> (IndexStore, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = IndexStore::open(&dir.path().join("db").join("index.db")).expect("open store");
    (store, dir)
}

fn record(path: &str, size_kb: u64) -> FileRecord {
    let p = Path::new(path);
    let (name, extension) = keeper_fs::split_name(p);
    FileRecord {
        path: path.to_owned(),
        name,
        extension,
        size_kb,
        modified_at: "2024-05-01 10:00:00".into(),
        owner: UNKNOWN_OWNER.into(),
        observed_delta_size: 0,
    }
}

fn paths(store: &IndexStore) -> Vec<String> {
    store.all().unwrap().into_iter().map(|r| r.path).collect()
}

#[test]
fn open_creates_parent_directories() {
    let (store, dir) = temp_store();
    assert!(dir.path().join("db").is_dir());
    assert_eq!(store.path(), dir.path().join("db").join("index.db"));
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn upsert_inserts_then_replaces() {
    let (store, _dir) = temp_store();

    store.upsert(&record("/a/report.pdf", 12)).unwrap();
    assert_eq!(store.count().unwrap(), 1);

    let mut updated = record("/a/report.pdf", 20);
    updated.owner = "alice".into();
    store.upsert(&updated).unwrap();

    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(store.get("/a/report.pdf").unwrap(), Some(updated));
}

#[test]
fn delete_exact_is_a_noop_for_unknown_paths() {
    let (store, _dir) = temp_store();
    store.upsert(&record("/a/x", 1)).unwrap();

    assert_eq!(store.delete_exact("/a/y").unwrap(), 0);
    assert_eq!(store.delete_exact("/a/x").unwrap(), 1);
    assert_eq!(store.delete_exact("/a/x").unwrap(), 0);
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn delete_prefix_removes_only_the_subtree() {
    let (store, _dir) = temp_store();
    for p in ["/a/b/x", "/a/b/y", "/a/c", "/a/bb/z"] {
        store.upsert(&record(p, 1)).unwrap();
    }

    assert_eq!(store.delete_prefix("/a/b/").unwrap(), 2);
    assert_eq!(paths(&store), vec!["/a/bb/z", "/a/c"]);

    assert_eq!(store.delete_prefix("/a/b/").unwrap(), 0);
}

#[test]
fn delete_prefix_treats_wildcards_literally() {
    let (store, _dir) = temp_store();
    for p in ["/data/a_b/f", "/data/axb/f", "/data/100%/f", "/data/1000/f"] {
        store.upsert(&record(p, 1)).unwrap();
    }

    assert_eq!(store.delete_prefix("/data/a_b/").unwrap(), 1);
    assert_eq!(store.delete_prefix("/data/100%/").unwrap(), 1);
    assert_eq!(paths(&store), vec!["/data/1000/f", "/data/axb/f"]);
}

#[test]
fn delete_prefix_with_empty_prefix_deletes_nothing() {
    let (store, _dir) = temp_store();
    store.upsert(&record("/a", 1)).unwrap();

    assert_eq!(store.delete_prefix("").unwrap(), 0);
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn update_observed_size_touches_only_that_field() {
    let (store, _dir) = temp_store();
    let original = record("/a/report.pdf", 12);
    store.upsert(&original).unwrap();

    assert_eq!(store.update_observed_size("/a/report.pdf", 20).unwrap(), 1);

    let got = store.get("/a/report.pdf").unwrap().unwrap();
    assert_eq!(got.observed_delta_size, 20);
    assert_eq!(got.without_observed_size(), original);
}

#[test]
fn update_observed_size_never_creates() {
    let (store, _dir) = temp_store();

    assert_eq!(store.update_observed_size("/a/missing.txt", 5).unwrap(), 0);
    assert_eq!(store.count().unwrap(), 0);
    assert_eq!(store.get("/a/missing.txt").unwrap(), None);
}

#[test]
fn all_paths_enumerates_every_key() {
    let (store, _dir) = temp_store();
    for p in ["/a", "/b", "/c"] {
        store.upsert(&record(p, 1)).unwrap();
    }

    let got = store.all_paths().unwrap();
    let expected: HashSet<String> = ["/a", "/b", "/c"].iter().map(|s| s.to_string()).collect();
    assert_eq!(got, expected);
}

#[test]
fn writes_survive_reopen() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("index.db");

    {
        let store = IndexStore::open(&path).unwrap();
        store.upsert(&record("/kept", 7)).unwrap();
        store.upsert(&record("/dropped", 1)).unwrap();
        store.delete_exact("/dropped").unwrap();
    }

    let store = IndexStore::open(&path).unwrap();
    assert_eq!(paths(&store), vec!["/kept"]);
    assert_eq!(store.get("/kept").unwrap().unwrap().size_kb, 7);
}

#[test]
fn read_only_handle_sees_writes_and_rejects_its_own() {
    let (store, dir) = temp_store();
    store.upsert(&record("/a/x", 1)).unwrap();

    let reader = IndexStore::open_read_only(&dir.path().join("db").join("index.db")).unwrap();
    assert_eq!(reader.count().unwrap(), 1);

    store.upsert(&record("/a/y", 1)).unwrap();
    assert_eq!(reader.all().unwrap().len(), 2);

    assert!(matches!(
        reader.upsert(&record("/a/z", 1)),
        Err(StoreError::Sqlite(_))
    ));
}

#[test]
fn open_read_only_fails_for_missing_store() {
    let dir = tempfile::tempdir().expect("create temp dir");
    assert!(IndexStore::open_read_only(&dir.path().join("absent.db")).is_err());
}

#[test]
fn concurrent_writers_never_tear_rows() {
    let (store, _dir) = temp_store();
    let store = Arc::new(store);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..50 {
                    store.upsert(&record(&format!("/t{t}/f{i}"), i)).unwrap();
                    store.upsert(&record("/shared", t)).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(store.count().unwrap(), 4 * 50 + 1);
    let shared = store.get("/shared").unwrap().unwrap();
    assert!(shared.size_kb < 4);
    assert_eq!(shared.name, "shared");
}
