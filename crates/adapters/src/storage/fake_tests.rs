// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn fake_file_lifecycle() {
    let storage = FakeStorage::new();
    let dir = Path::new("/data");
    let path = Path::new("/data/db.jsonl");

    storage.mkdirp(dir).await.unwrap();
    storage.write_file(path, b"one\n").await.unwrap();
    storage.append_file(path, b"two\n").await.unwrap();
    assert_eq!(storage.read_file(path).await.unwrap(), b"one\ntwo\n");

    storage.unlink(path).await.unwrap();
    assert!(!storage.exists(path).await.unwrap());
    assert!(storage.exists(dir).await.unwrap());
}

#[tokio::test]
async fn fake_write_requires_parent_dir() {
    let storage = FakeStorage::new();
    let err = storage
        .write_file(Path::new("/missing/db"), b"x")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn fake_crash_fails_every_later_call() {
    let storage = FakeStorage::new();
    storage.mkdirp(Path::new("/d")).await.unwrap();
    storage.crash_after(1);

    storage.write_file(Path::new("/d/a"), b"1").await.unwrap();
    assert!(storage.write_file(Path::new("/d/b"), b"2").await.is_err());
    assert!(storage.exists(Path::new("/d/a")).await.is_err());

    storage.recover();
    assert!(storage.exists(Path::new("/d/a")).await.unwrap());
    assert!(!storage.exists(Path::new("/d/b")).await.unwrap());
}

#[tokio::test]
async fn fake_flush_reports_both_failures() {
    let storage = FakeStorage::new();
    storage.set_file(Path::new("/d/a"), "x");
    storage.fail_flush(true, true);

    let err = storage.flush(Path::new("/d/a"), false).await.unwrap_err();
    match err {
        StorageError::Flush(e) => {
            assert!(e.on_fsync.is_some());
            assert!(e.on_close.is_some());
            assert!(e.to_string().contains("fsync"));
            assert!(e.to_string().contains("close"));
        }
        other => panic!("expected flush error, got {other:?}"),
    }
}

#[tokio::test]
async fn fake_flush_missing_file_fails_to_open() {
    let storage = FakeStorage::new();
    let err = storage.flush(Path::new("/nope"), false).await.unwrap_err();
    assert!(err.is_not_found());
}
