// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Datastore: documents, indexes and the datafile behind them
//!
//! Every mutation runs on the [`Sequencer`]. It changes the in-memory
//! [`Collection`] synchronously, then commits the matching records to the
//! datafile. If the commit fails the in-memory change is undone, so a failed
//! operation leaves no trace. Reads go straight to the collection and never
//! wait on the queue.

use crate::config::{ConfigError, DatastoreConfig};
use crate::error::DatastoreError;
use crate::sequencer::Sequencer;
use crate::state::Collection;
use holt_adapters::StorageAdapter;
use holt_core::{Document, IdGen, Selector, UuidIdGen, Value};
use holt_storage::{CompactionResult, IndexSpec, LoadReport, Persistence, Record};
use std::collections::HashSet;
use std::ops::Bound;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// An embedded document collection
pub struct Datastore<S, G = UuidIdGen> {
    inner: Arc<Inner<S, G>>,
}

impl<S, G> Clone for Datastore<S, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S, G> {
    state: Mutex<Collection>,
    /// `None` for memory-only datastores
    log: Option<Persistence<S>>,
    config: DatastoreConfig,
    id_gen: G,
    sequencer: Sequencer,
    last_load: Mutex<LoadReport>,
    autocompaction: Mutex<Option<JoinHandle<()>>>,
}

impl<S: StorageAdapter> Datastore<S, UuidIdGen> {
    /// Open a datastore, loading its datafile if it has one
    pub async fn open(storage: S, config: DatastoreConfig) -> Result<Self, DatastoreError> {
        Self::open_with_id_gen(storage, config, UuidIdGen).await
    }
}

impl<S: StorageAdapter, G: IdGen> Datastore<S, G> {
    /// Open a datastore that names new documents with `id_gen`
    pub async fn open_with_id_gen(
        storage: S,
        config: DatastoreConfig,
        id_gen: G,
    ) -> Result<Self, DatastoreError> {
        config.validate()?;
        let log = config
            .filename
            .as_ref()
            .map(|path| Persistence::new(storage, path.clone(), config.log_options()));

        let (state, report) = match &log {
            Some(log) => load_collection(log).await?,
            None => (Collection::new(), LoadReport::default()),
        };
        tracing::info!(
            filename = ?config.filename,
            documents = state.len(),
            records = report.records,
            dropped_lines = report.dropped_lines,
            "datastore opened"
        );

        let inner = Arc::new(Inner {
            state: Mutex::new(state),
            log,
            config,
            id_gen,
            sequencer: Sequencer::start(),
            last_load: Mutex::new(report),
            autocompaction: Mutex::new(None),
        });
        inner.compact_after_load().await?;

        let datastore = Self { inner };
        if let Some(interval) = datastore.inner.config.autocompaction_interval {
            datastore.set_autocompaction_interval(interval)?;
        }
        Ok(datastore)
    }

    // -------------------------------------------------------------------------
    // Mutations (queued)
    // -------------------------------------------------------------------------

    /// Insert a document, generating an `_id` if it has none
    pub async fn insert(&self, doc: Document) -> Result<Document, DatastoreError> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .sequencer
            .run(move || async move { inner.insert(doc).await })
            .await?
    }

    /// Insert several documents; either all are inserted or none
    pub async fn insert_many(&self, docs: Vec<Document>) -> Result<Vec<Document>, DatastoreError> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .sequencer
            .run(move || async move { inner.insert_many(docs).await })
            .await?
    }

    /// Replace every matching document with `modifier`'s output
    ///
    /// Documents are committed one at a time. If one fails, the ones before
    /// it stay committed and [`DatastoreError::PartialUpdate`] names the
    /// failing id.
    pub async fn update<Sel, F>(&self, selector: Sel, modifier: F) -> Result<Vec<Document>, DatastoreError>
    where
        Sel: Selector,
        F: Fn(&Document) -> Document + Send + Sync + 'static,
    {
        let inner = Arc::clone(&self.inner);
        self.inner
            .sequencer
            .run(move || async move { inner.update(&selector, &modifier).await })
            .await?
    }

    /// Remove every matching document, returning how many were removed
    pub async fn remove<Sel: Selector>(&self, selector: Sel) -> Result<usize, DatastoreError> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .sequencer
            .run(move || async move { inner.remove(&selector).await })
            .await?
    }

    /// Create an index unless one exists on the same field
    ///
    /// Returns whether a new index was created.
    pub async fn ensure_index(&self, spec: IndexSpec) -> Result<bool, DatastoreError> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .sequencer
            .run(move || async move { inner.ensure_index(spec).await })
            .await?
    }

    /// Remove a secondary index
    pub async fn remove_index(&self, field: &str) -> Result<(), DatastoreError> {
        let inner = Arc::clone(&self.inner);
        let field = field.to_string();
        self.inner
            .sequencer
            .run(move || async move { inner.remove_index(&field).await })
            .await?
    }

    /// Discard memory and load the datafile again
    pub async fn reload(&self) -> Result<LoadReport, DatastoreError> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .sequencer
            .run(move || async move { inner.reload().await })
            .await?
    }

    /// Rewrite the datafile with only live state
    ///
    /// Returns `None` for memory-only datastores.
    pub async fn compact(&self) -> Result<Option<CompactionResult>, DatastoreError> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .sequencer
            .run(move || async move { inner.compact_now().await })
            .await?
    }

    /// Remove every document and secondary index and delete the datafile
    pub async fn drop_database(&self) -> Result<(), DatastoreError> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .sequencer
            .run(move || async move { inner.drop_database().await })
            .await?
    }

    /// Wait for queued operations, then refuse new ones
    pub async fn close(&self) -> Result<(), DatastoreError> {
        self.stop_autocompaction();
        self.inner.sequencer.run(|| async {}).await?;
        self.inner.sequencer.close();
        tracing::debug!(filename = ?self.inner.config.filename, "datastore closed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Autocompaction
    // -------------------------------------------------------------------------

    /// Compact every `interval`, replacing any previous schedule
    pub fn set_autocompaction_interval(&self, interval: Duration) -> Result<(), DatastoreError> {
        if interval.is_zero() {
            return Err(ConfigError::Invalid("autocompaction interval must be non-zero".into()).into());
        }
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(autocompact(weak, interval));
        if let Some(previous) = self.inner.autocompaction().replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    pub fn stop_autocompaction(&self) {
        if let Some(handle) = self.inner.autocompaction().take() {
            handle.abort();
        }
    }

    // -------------------------------------------------------------------------
    // Reads (not queued)
    // -------------------------------------------------------------------------

    pub fn get(&self, id: &str) -> Option<Document> {
        self.inner.lock().get(id).cloned()
    }

    /// Matching documents in `_id` order
    pub fn find(&self, selector: &dyn Selector) -> Vec<Document> {
        let state = self.inner.lock();
        state
            .documents()
            .filter(|doc| selector.matches(doc))
            .cloned()
            .collect()
    }

    pub fn find_one(&self, selector: &dyn Selector) -> Option<Document> {
        let state = self.inner.lock();
        let found = state.documents().find(|doc| selector.matches(doc)).cloned();
        found
    }

    pub fn count(&self, selector: &dyn Selector) -> usize {
        let state = self.inner.lock();
        state.documents().filter(|doc| selector.matches(doc)).count()
    }

    /// Every document in `_id` order
    pub fn all(&self) -> Vec<Document> {
        self.inner.lock().documents().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Documents whose indexed `field` equals `value`
    ///
    /// An array `value` matches documents holding any of its elements.
    pub fn find_by_index(&self, field: &str, value: &Value) -> Result<Vec<Document>, DatastoreError> {
        self.inner.lock().find_by_index(field, value)
    }

    /// Documents whose indexed `field` lies between the bounds
    pub fn find_range(
        &self,
        field: &str,
        lower: Bound<&Value>,
        upper: Bound<&Value>,
    ) -> Result<Vec<Document>, DatastoreError> {
        self.inner.lock().find_range(field, lower, upper)
    }

    /// Definitions of every index, `_id` included
    pub fn indexes(&self) -> Vec<IndexSpec> {
        self.inner.lock().index_specs()
    }

    /// What the most recent load found in the datafile
    pub fn load_report(&self) -> LoadReport {
        self.inner
            .last_load
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn filename(&self) -> Option<&Path> {
        self.inner.config.filename.as_deref()
    }

    pub fn config(&self) -> &DatastoreConfig {
        &self.inner.config
    }
}

impl<S, G> Drop for Inner<S, G> {
    fn drop(&mut self) {
        let handle = self
            .autocompaction
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl<S, G> Inner<S, G> {
    fn lock(&self) -> MutexGuard<'_, Collection> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn autocompaction(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.autocompaction.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<S: StorageAdapter, G: IdGen> Inner<S, G> {
    async fn insert(&self, doc: Document) -> Result<Document, DatastoreError> {
        let doc = {
            let mut state = self.lock();
            let doc = self.prepare(&state, doc, &HashSet::new())?;
            state.insert(doc.clone())?;
            doc
        };

        if let Err(e) = self.commit(&[Record::Upsert(doc.clone())]).await {
            if let Some(id) = doc.id() {
                self.lock().remove(id);
            }
            self.repair().await;
            return Err(e);
        }
        tracing::debug!(id = doc.id().unwrap_or_default(), "inserted");
        Ok(doc)
    }

    async fn insert_many(&self, docs: Vec<Document>) -> Result<Vec<Document>, DatastoreError> {
        let docs = {
            let mut state = self.lock();
            let mut taken = HashSet::new();
            let mut prepared = Vec::with_capacity(docs.len());
            for doc in docs {
                let doc = self.prepare(&state, doc, &taken)?;
                taken.extend(doc.id().map(str::to_string));
                prepared.push(doc);
            }
            state.insert_many(&prepared)?;
            prepared
        };
        if docs.is_empty() {
            return Ok(docs);
        }

        let records: Vec<Record> = docs.iter().cloned().map(Record::Upsert).collect();
        if let Err(e) = self.commit(&records).await {
            {
                let mut state = self.lock();
                for id in docs.iter().filter_map(Document::id) {
                    state.remove(id);
                }
            }
            self.repair().await;
            return Err(e);
        }
        tracing::debug!(count = docs.len(), "inserted batch");
        Ok(docs)
    }

    async fn update<Sel, F>(&self, selector: &Sel, modifier: &F) -> Result<Vec<Document>, DatastoreError>
    where
        Sel: Selector,
        F: Fn(&Document) -> Document + Send + Sync,
    {
        let ids = self.lock().matching_ids(selector);
        let mut updated = Vec::with_capacity(ids.len());

        for id in ids {
            match self.update_one(&id, modifier).await {
                Ok(Some(doc)) => updated.push(doc),
                Ok(None) => {}
                Err(e) if updated.is_empty() => return Err(e),
                Err(e) => {
                    return Err(DatastoreError::PartialUpdate {
                        failed_id: id,
                        committed: updated.len(),
                        source: Box::new(e),
                    })
                }
            }
        }
        tracing::debug!(count = updated.len(), "updated");
        Ok(updated)
    }

    async fn update_one<F>(&self, id: &str, modifier: &F) -> Result<Option<Document>, DatastoreError>
    where
        F: Fn(&Document) -> Document + Send + Sync,
    {
        let (old, new) = {
            let mut state = self.lock();
            let Some(old) = state.get(id).cloned() else {
                return Ok(None);
            };
            let new = replacement(&old, modifier(&old))?;
            state.upsert(new.clone())?;
            (old, new)
        };

        if let Err(e) = self.commit(&[Record::Upsert(new.clone())]).await {
            // Putting back the previous version cannot collide
            let _ = self.lock().upsert(old);
            self.repair().await;
            return Err(e);
        }
        Ok(Some(new))
    }

    async fn remove<Sel: Selector>(&self, selector: &Sel) -> Result<usize, DatastoreError> {
        let removed: Vec<Document> = {
            let mut state = self.lock();
            let ids = state.matching_ids(selector);
            ids.iter().filter_map(|id| state.remove(id)).collect()
        };
        if removed.is_empty() {
            return Ok(0);
        }

        let records: Vec<Record> = removed
            .iter()
            .filter_map(Document::id)
            .map(|id| Record::Tombstone(id.to_string()))
            .collect();
        if let Err(e) = self.commit(&records).await {
            {
                let mut state = self.lock();
                for doc in removed {
                    let _ = state.insert(doc);
                }
            }
            self.repair().await;
            return Err(e);
        }
        tracing::debug!(count = removed.len(), "removed");
        Ok(removed.len())
    }

    async fn ensure_index(&self, spec: IndexSpec) -> Result<bool, DatastoreError> {
        let created = self.lock().ensure_index(spec.clone())?;
        if !created {
            return Ok(false);
        }
        if let Err(e) = self.commit(&[Record::IndexCreated(spec.clone())]).await {
            let _ = self.lock().remove_index(&spec.field_name);
            self.repair().await;
            return Err(e);
        }
        tracing::info!(field = %spec.field_name, unique = spec.unique, sparse = spec.sparse, "index created");
        Ok(true)
    }

    async fn remove_index(&self, field: &str) -> Result<(), DatastoreError> {
        let index = self.lock().remove_index(field)?;
        if let Err(e) = self.commit(&[Record::IndexRemoved(field.to_string())]).await {
            self.lock().restore_index(index);
            self.repair().await;
            return Err(e);
        }
        tracing::info!(field, "index removed");
        Ok(())
    }

    async fn reload(&self) -> Result<LoadReport, DatastoreError> {
        let Some(log) = &self.log else {
            return Ok(LoadReport::default());
        };
        // Memory is authoritative while a failed commit may linger on disk
        if log.needs_rewrite() {
            self.compact_now().await?;
        }
        let (state, report) = load_collection(log).await?;
        *self.lock() = state;
        *self.last_load.lock().unwrap_or_else(|e| e.into_inner()) = report.clone();
        self.compact_after_load().await?;
        Ok(report)
    }

    async fn drop_database(&self) -> Result<(), DatastoreError> {
        let previous = std::mem::take(&mut *self.lock());
        if let Some(log) = &self.log {
            if let Err(e) = log.destroy().await {
                *self.lock() = previous;
                return Err(e.into());
            }
        }
        tracing::info!(filename = ?self.config.filename, "database dropped");
        Ok(())
    }

    async fn compact_now(&self) -> Result<Option<CompactionResult>, DatastoreError> {
        let Some(log) = &self.log else {
            return Ok(None);
        };
        let snapshot = self.lock().snapshot()?;
        Ok(Some(log.compact(&snapshot).await?))
    }

    async fn compact_after_load(&self) -> Result<(), DatastoreError> {
        let Some(log) = &self.log else {
            return Ok(());
        };
        if self.config.compact_on_load || log.needs_rewrite() {
            self.compact_now().await?;
        }
        Ok(())
    }

    /// Make the records of an in-memory change durable
    ///
    /// While the datafile may end in a partial line, commits rewrite the
    /// whole file instead of appending to it.
    async fn commit(&self, records: &[Record]) -> Result<(), DatastoreError> {
        let Some(log) = &self.log else {
            return Ok(());
        };
        if log.needs_rewrite() {
            self.compact_now().await?;
            return Ok(());
        }
        if let Err(e) = log.append_all(records).await {
            log.mark_needs_rewrite();
            return Err(e.into());
        }

        if let Some(threshold) = self.config.compaction_threshold {
            if log.appended_since_compaction() >= threshold {
                if let Err(e) = self.compact_now().await {
                    tracing::warn!(error = %e, "threshold compaction failed");
                }
            }
        }
        Ok(())
    }

    /// Rewrite the datafile from memory after a failed commit
    ///
    /// A record may have reached the file even though its commit failed.
    /// If the rewrite fails too, the flag stays set and the next commit or
    /// reload retries it.
    async fn repair(&self) {
        let Some(log) = &self.log else {
            return;
        };
        if !log.needs_rewrite() {
            return;
        }
        match self.compact_now().await {
            Ok(_) => tracing::info!(filename = ?self.config.filename, "datafile repaired after failed commit"),
            Err(e) => tracing::warn!(error = %e, "datafile repair failed"),
        }
    }

    /// Validate a new document and give it an `_id` not in use
    fn prepare(
        &self,
        state: &Collection,
        mut doc: Document,
        taken: &HashSet<String>,
    ) -> Result<Document, DatastoreError> {
        doc.validate()?;
        if doc.id().is_none() {
            let id = loop {
                let id = self.id_gen.next();
                if !state.contains(&id) && !taken.contains(&id) {
                    break id;
                }
            };
            doc.set_id(id);
        }
        Ok(doc)
    }
}

async fn load_collection<S: StorageAdapter>(
    log: &Persistence<S>,
) -> Result<(Collection, LoadReport), DatastoreError> {
    log.prepare().await?;
    let loaded = log.load().await?;
    let state = Collection::replay(&loaded.records)?;
    Ok((state, loaded.report))
}

/// Check a replacement against the document it replaces
fn replacement(old: &Document, mut new: Document) -> Result<Document, DatastoreError> {
    let id = old.id().unwrap_or_default();
    match new.id() {
        None => new.set_id(id),
        Some(to) if to != id => {
            return Err(DatastoreError::ImmutableId {
                from: id.to_string(),
                to: to.to_string(),
            })
        }
        Some(_) => {}
    }
    new.validate()?;
    Ok(new)
}

async fn autocompact<S: StorageAdapter, G: IdGen>(inner: Weak<Inner<S, G>>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let datastore = Datastore { inner };
        match datastore.compact().await {
            Ok(_) => {}
            Err(DatastoreError::Closed) => break,
            Err(e) => tracing::warn!(error = %e, "autocompaction failed"),
        }
    }
}

#[cfg(test)]
#[path = "datastore_tests.rs"]
mod tests;
