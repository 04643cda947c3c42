//! Datastore scenario specs
//!
//! Insert, update, compact and reload against a real directory.

use crate::prelude::*;

#[tokio::test]
async fn compacted_update_reloads_as_single_record() {
    let data = DataDir::new();
    let ds = data.open().await;

    let inserted = ds.insert(doc(json!({"a": 1}))).await.unwrap();
    let id = inserted.id().unwrap().to_string();
    ds.update(FieldEq::id(&id), |_: &Document| doc(json!({"a": 2})))
        .await
        .unwrap();
    ds.compact().await.unwrap();
    ds.reload().await.unwrap();

    similar_asserts::assert_eq!(data.records(), vec![json!({"_id": id, "a": 2})]);
    similar_asserts::assert_eq!(ds.all(), vec![doc(json!({"_id": id, "a": 2}))]);
}

#[tokio::test]
async fn unique_index_rejects_second_insert() {
    let data = DataDir::new();
    let ds = data.open().await;
    ds.ensure_index(IndexSpec::new("email").unique(true))
        .await
        .unwrap();

    ds.insert(doc(json!({"email": "x@y"}))).await.unwrap();
    let err = ds.insert(doc(json!({"email": "x@y"}))).await.unwrap_err();

    assert!(matches!(err, DatastoreError::Constraint(_)), "{err}");
    assert_eq!(ds.len(), 1);
    // index definition plus the one accepted document
    assert_eq!(data.records().len(), 2);
}

#[tokio::test]
async fn disabled_directory_flush_succeeds_without_opening() {
    let data = DataDir::new();
    let missing = data.root().join("never-created");

    let storage = FsStorage::new().with_dir_sync(false);
    storage.flush(&missing, true).await.unwrap();

    let fake = FakeStorage::new().with_dir_sync(false);
    fake.flush(Path::new("/nowhere"), true).await.unwrap();
    assert_eq!(
        fake.calls(),
        vec![StorageCall::Flush {
            path: PathBuf::from("/nowhere"),
            is_dir: true,
        }]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn enabled_directory_flush_opens_the_directory() {
    let data = DataDir::new();
    let missing = data.root().join("never-created");

    assert!(FsStorage::new().flush(&missing, true).await.is_err());
    FsStorage::new().flush(data.root(), true).await.unwrap();
}

#[tokio::test]
async fn datastore_works_without_directory_flush() {
    let data = DataDir::new();
    {
        let storage = TracedStorage::new(FsStorage::new().with_dir_sync(false));
        let ds = Datastore::open(storage, data.config())
            .await
            .unwrap();
        ds.insert(doc(json!({"_id": "a"}))).await.unwrap();
        ds.compact().await.unwrap();
    }

    let ds = data.open().await;
    assert_eq!(ds.get("a"), Some(doc(json!({"_id": "a"}))));
}

#[tokio::test]
async fn index_queries_follow_value_order() {
    let data = DataDir::new();
    let ds = data.open().await;
    ds.ensure_index(IndexSpec::new("score")).await.unwrap();
    ds.insert_many(vec![
        doc(json!({"_id": "s", "score": "high"})),
        doc(json!({"_id": "n", "score": 7})),
        doc(json!({"_id": "z", "score": null})),
        doc(json!({"_id": "m"})),
        doc(json!({"_id": "f", "score": 1.5})),
    ])
    .await
    .unwrap();

    let lo = json!(0);
    let hi = json!(10);
    let numbers = ds
        .find_range(
            "score",
            std::ops::Bound::Included(&lo),
            std::ops::Bound::Excluded(&hi),
        )
        .unwrap();
    let ids: Vec<_> = numbers.iter().filter_map(Document::id).collect();
    assert_eq!(ids, ["f", "n"]);

    let either = ds.find_by_index("score", &json!([7, "high"])).unwrap();
    let ids: Vec<_> = either.iter().filter_map(Document::id).collect();
    assert_eq!(ids, ["n", "s"]);
}
