//! Test helpers for datastore specs

pub use holt_adapters::{FakeStorage, FsStorage, StorageAdapter, StorageCall, TracedStorage};
pub use holt_core::{json, Document, FieldEq, MatchAll, Value};
pub use holt_engine::{CorruptionPolicy, Datastore, DatastoreConfig, DatastoreError, IndexSpec};
pub use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A datafile location inside a fresh temp directory
pub struct DataDir {
    dir: TempDir,
    path: PathBuf,
}

impl DataDir {
    /// The datafile sits in a subdirectory that does not exist yet
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("users.db");
        Self { dir, path }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn temp_path(&self) -> PathBuf {
        holt_adapters::temp_path(&self.path)
    }

    pub fn config(&self) -> DatastoreConfig {
        DatastoreConfig::persistent(self.path.clone())
    }

    pub async fn open(&self) -> Datastore<FsStorage> {
        self.open_with(self.config()).await
    }

    pub async fn open_with(&self, config: DatastoreConfig) -> Datastore<FsStorage> {
        Datastore::open(FsStorage::new(), config).await.unwrap()
    }

    /// Raw datafile text
    pub fn contents(&self) -> String {
        std::fs::read_to_string(&self.path).unwrap()
    }

    /// Datafile records parsed as JSON
    pub fn records(&self) -> Vec<Value> {
        self.contents()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// Replace the datafile, creating its directory
    pub fn write(&self, path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

pub fn doc(value: Value) -> Document {
    Document::from_value(value).unwrap()
}
