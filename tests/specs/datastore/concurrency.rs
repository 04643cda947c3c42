//! Concurrency specs
//!
//! Mutations from many tasks are applied one at a time; reads never wait.

use crate::prelude::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_all_land_in_the_datafile() {
    let data = DataDir::new();
    let ds = data.open().await;
    ds.ensure_index(IndexSpec::new("n").unique(true))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for task in 0..8 {
        let ds = ds.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..10 {
                ds.insert(doc(json!({"n": task * 10 + i}))).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(ds.len(), 80);
    assert_eq!(data.records().len(), 81);
    drop(ds);
    assert_eq!(data.open().await.len(), 80);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_unique_inserts_admit_exactly_one() {
    let data = DataDir::new();
    let ds = data.open().await;
    ds.ensure_index(IndexSpec::new("email").unique(true))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let ds = ds.clone();
        handles.push(tokio::spawn(async move {
            ds.insert(doc(json!({"email": "same@x"}))).await
        }));
    }
    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(e) => assert!(matches!(e, DatastoreError::Constraint(_)), "{e}"),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(ds.count(&FieldEq::new("email", "same@x")), 1);
}

#[tokio::test]
async fn writes_are_committed_in_submission_order() {
    let data = DataDir::new();
    let ds = data.open().await;

    let (first, second, third) = tokio::join!(
        ds.insert(doc(json!({"_id": "a", "v": 1}))),
        ds.update(FieldEq::id("a"), |_: &Document| doc(json!({"v": 2}))),
        ds.remove(FieldEq::id("a")),
    );

    first.unwrap();
    assert_eq!(second.unwrap().len(), 1);
    assert_eq!(third.unwrap(), 1);
    similar_asserts::assert_eq!(
        data.records(),
        vec![
            json!({"_id": "a", "v": 1}),
            json!({"_id": "a", "v": 2}),
            json!({"$$deleted": true, "_id": "a"}),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reads_proceed_while_writes_are_queued() {
    let data = DataDir::new();
    let ds = data.open().await;
    ds.insert(doc(json!({"_id": "seed"}))).await.unwrap();

    let writer = {
        let ds = ds.clone();
        tokio::spawn(async move {
            for i in 0..50 {
                ds.insert(doc(json!({"i": i}))).await.unwrap();
            }
        })
    };
    for _ in 0..50 {
        assert!(ds.get("seed").is_some());
        assert!(ds.count(&MatchAll) >= 1);
        tokio::task::yield_now().await;
    }
    writer.await.unwrap();

    assert_eq!(ds.len(), 51);
}

#[tokio::test]
async fn closed_datastore_rejects_writes() {
    let data = DataDir::new();
    let ds = data.open().await;
    ds.insert(doc(json!({"_id": "a"}))).await.unwrap();

    ds.close().await.unwrap();

    let err = ds.insert(doc(json!({"_id": "b"}))).await.unwrap_err();
    assert!(matches!(err, DatastoreError::Closed));
    assert_eq!(ds.get("a"), Some(doc(json!({"_id": "a"}))));
}
