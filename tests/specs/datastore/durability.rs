//! Durability specs
//!
//! What survives a reopen, an interrupted rewrite or a torn datafile.

use crate::prelude::*;

#[tokio::test]
async fn reopen_restores_documents_and_indexes() {
    let data = DataDir::new();
    {
        let ds = data.open().await;
        ds.ensure_index(IndexSpec::new("email").unique(true))
            .await
            .unwrap();
        ds.insert(doc(json!({"_id": "a", "email": "a@x"})))
            .await
            .unwrap();
        ds.insert(doc(json!({"_id": "b", "email": "b@x"})))
            .await
            .unwrap();
        ds.remove(FieldEq::id("b")).await.unwrap();
        ds.close().await.unwrap();
    }

    let ds = data.open().await;
    assert_eq!(ds.all(), vec![doc(json!({"_id": "a", "email": "a@x"}))]);
    assert_eq!(ds.indexes().len(), 2);
    let err = ds
        .insert(doc(json!({"_id": "c", "email": "a@x"})))
        .await
        .unwrap_err();
    assert!(matches!(err, DatastoreError::Constraint(_)));
}

#[tokio::test]
async fn interrupted_rewrite_is_promoted_on_open() {
    let data = DataDir::new();
    data.write(&data.temp_path(), "{\"_id\":\"a\",\"v\":1}\n");

    let ds = data.open().await;

    assert_eq!(ds.get("a"), Some(doc(json!({"_id": "a", "v": 1}))));
    assert!(data.path().exists());
    assert!(!data.temp_path().exists());
}

#[tokio::test]
async fn leftover_temp_file_loses_to_existing_datafile() {
    let data = DataDir::new();
    data.write(data.path(), "{\"_id\":\"kept\"}\n");
    data.write(&data.temp_path(), "{\"_id\":\"stale\"}\n");

    let ds = data.open().await;

    let ids: Vec<_> = ds.all().iter().filter_map(|d| d.id().map(String::from)).collect();
    assert_eq!(ids, ["kept"]);
    similar_asserts::assert_eq!(data.contents(), "{\"_id\":\"kept\"}\n");
}

#[tokio::test]
async fn torn_last_line_is_dropped_and_repaired() {
    let data = DataDir::new();
    data.write(data.path(), "{\"_id\":\"a\"}\n{\"_id\":\"b\"}\n{\"_id\":\"c\",\"na");

    let ds = data.open().await;

    assert_eq!(ds.len(), 2);
    assert_eq!(ds.load_report().dropped_lines, 1);
    similar_asserts::assert_eq!(data.contents(), "{\"_id\":\"a\"}\n{\"_id\":\"b\"}\n");

    ds.insert(doc(json!({"_id": "d"}))).await.unwrap();
    drop(ds);
    assert_eq!(data.open().await.len(), 3);
}

#[tokio::test]
async fn strict_policy_refuses_torn_datafile() {
    let data = DataDir::new();
    data.write(data.path(), "{\"_id\":\"a\"}\n{\"_id\":");
    let config = data.config().with_corruption(CorruptionPolicy::Strict);

    let result = Datastore::open(FsStorage::new(), config).await;

    assert!(matches!(result, Err(DatastoreError::Persistence(_))));
    // nothing was rewritten
    similar_asserts::assert_eq!(data.contents(), "{\"_id\":\"a\"}\n{\"_id\":");
}

#[tokio::test]
async fn corruption_before_the_last_line_is_fatal() {
    let data = DataDir::new();
    data.write(data.path(), "{\"_id\":\"a\"}\nnot json\n{\"_id\":\"b\"}\n");

    let err = Datastore::open(FsStorage::new(), data.config())
        .await
        .err()
        .unwrap();

    assert!(err.to_string().contains("line 2"), "{err}");
}

#[tokio::test]
async fn dropped_database_starts_empty() {
    let data = DataDir::new();
    let ds = data.open().await;
    ds.insert(doc(json!({"_id": "a"}))).await.unwrap();

    ds.drop_database().await.unwrap();
    assert!(!data.path().exists());
    drop(ds);

    let ds = data.open().await;
    assert!(ds.is_empty());
}

#[tokio::test]
async fn config_file_drives_open() {
    let data = DataDir::new();
    let config_path = data.root().join("holt.toml");
    let toml = format!(
        "filename = {:?}\ncompaction_threshold = 2\n",
        data.path().display().to_string()
    );
    data.write(&config_path, &toml);

    let config = DatastoreConfig::load(&config_path).unwrap();
    let ds = data.open_with(config).await;
    ds.insert(doc(json!({"_id": "a", "v": 1}))).await.unwrap();
    ds.update(FieldEq::id("a"), |_: &Document| doc(json!({"v": 2})))
        .await
        .unwrap();

    // the second append crossed the threshold
    similar_asserts::assert_eq!(data.records(), vec![json!({"_id": "a", "v": 2})]);
}
