// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory collection state
//!
//! Documents by id plus the indexes over them. Every method is synchronous
//! and all-or-nothing: on error the documents and every index are exactly
//! as they were before the call.

use crate::error::DatastoreError;
use crate::index::Index;
use holt_core::{Document, DocumentError, Selector, Value, ID_FIELD};
use holt_storage::{IndexSpec, Record, Snapshot};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

/// Live documents and their indexes
#[derive(Debug, Clone)]
pub struct Collection {
    docs: HashMap<String, Document>,
    indexes: BTreeMap<String, Index>,
}

impl Default for Collection {
    fn default() -> Self {
        Self::new()
    }
}

impl Collection {
    /// Empty collection with only the `_id` index
    pub fn new() -> Self {
        let mut indexes = BTreeMap::new();
        indexes.insert(
            ID_FIELD.to_string(),
            Index::new(IndexSpec::new(ID_FIELD).unique(true)),
        );
        Self {
            docs: HashMap::new(),
            indexes,
        }
    }

    /// Rebuild state by applying records in order
    pub fn replay<'a>(records: impl IntoIterator<Item = &'a Record>) -> Result<Self, DatastoreError> {
        let mut collection = Self::new();
        for record in records {
            collection.apply(record)?;
        }
        Ok(collection)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.docs.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.docs.contains_key(id)
    }

    pub fn index(&self, field: &str) -> Option<&Index> {
        self.indexes.get(field)
    }

    /// Definitions of every index, `_id` included
    pub fn index_specs(&self) -> Vec<IndexSpec> {
        self.indexes.values().map(|i| i.spec().clone()).collect()
    }

    /// Documents in `_id` order
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.id_index()
            .into_iter()
            .flat_map(Index::all_ids)
            .filter_map(move |id| self.docs.get(&id))
    }

    /// Ids of matching documents, in `_id` order
    pub fn matching_ids(&self, selector: &dyn Selector) -> Vec<String> {
        self.documents()
            .filter(|doc| selector.matches(doc))
            .filter_map(|doc| doc.id().map(str::to_string))
            .collect()
    }

    /// Documents stored under `value` in the index on `field`
    pub fn find_by_index(&self, field: &str, value: &Value) -> Result<Vec<Document>, DatastoreError> {
        let index = self.require_index(field)?;
        Ok(self.resolve(index.get_matching(value)))
    }

    /// Documents whose `field` lies between the bounds, in value order
    pub fn find_range(
        &self,
        field: &str,
        lower: Bound<&Value>,
        upper: Bound<&Value>,
    ) -> Result<Vec<Document>, DatastoreError> {
        let index = self.require_index(field)?;
        Ok(self.resolve(index.get_between(lower, upper)))
    }

    /// Add a new document to the map and every index
    pub fn insert(&mut self, doc: Document) -> Result<(), DatastoreError> {
        let id = require_id(&doc)?;
        if self.docs.contains_key(&id) {
            return Err(DatastoreError::DuplicateId(id));
        }

        let mut done: Vec<&mut Index> = Vec::new();
        for index in self.indexes.values_mut() {
            if let Err(e) = index.insert(&doc) {
                for index in done {
                    index.remove(&doc);
                }
                tracing::debug!(id = %id, error = %e, "insert rejected");
                return Err(e.into());
            }
            done.push(index);
        }

        self.docs.insert(id, doc);
        Ok(())
    }

    /// Add several new documents, all or none
    pub fn insert_many(&mut self, docs: &[Document]) -> Result<(), DatastoreError> {
        for (i, doc) in docs.iter().enumerate() {
            if let Err(e) = self.insert(doc.clone()) {
                for done in &docs[..i] {
                    if let Some(id) = done.id() {
                        self.remove(id);
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Insert or replace a document, returning the previous version
    pub fn upsert(&mut self, new: Document) -> Result<Option<Document>, DatastoreError> {
        let id = require_id(&new)?;
        let Some(old) = self.docs.get(&id).cloned() else {
            return self.insert(new).map(|()| None);
        };

        let mut done: Vec<&mut Index> = Vec::new();
        for index in self.indexes.values_mut() {
            if let Err(e) = index.update(&old, &new) {
                for index in done {
                    // Restoring the previous state cannot collide
                    let _ = index.update(&new, &old);
                }
                tracing::debug!(id = %id, error = %e, "update rejected");
                return Err(e.into());
            }
            done.push(index);
        }

        self.docs.insert(id, new);
        Ok(Some(old))
    }

    /// Remove a document from the map and every index
    pub fn remove(&mut self, id: &str) -> Option<Document> {
        let doc = self.docs.remove(id)?;
        for index in self.indexes.values_mut() {
            index.remove(&doc);
        }
        Some(doc)
    }

    /// Build an index over the current documents
    ///
    /// Returns `false` if an index on the field already exists.
    pub fn ensure_index(&mut self, spec: IndexSpec) -> Result<bool, DatastoreError> {
        if self.indexes.contains_key(&spec.field_name) {
            return Ok(false);
        }
        let mut index = Index::new(spec);
        let docs: Vec<&Document> = self.docs.values().collect();
        index.insert_all(&docs)?;
        self.indexes.insert(index.field_name().to_string(), index);
        Ok(true)
    }

    /// Drop a secondary index
    pub fn remove_index(&mut self, field: &str) -> Result<Index, DatastoreError> {
        if field == ID_FIELD {
            return Err(DatastoreError::ProtectedIndex(field.to_string()));
        }
        self.indexes
            .remove(field)
            .ok_or_else(|| DatastoreError::IndexNotFound(field.to_string()))
    }

    /// Put back an index taken out by [`Collection::remove_index`]
    pub fn restore_index(&mut self, index: Index) {
        self.indexes.insert(index.field_name().to_string(), index);
    }

    /// Apply one datafile record the way the live mutation did
    pub fn apply(&mut self, record: &Record) -> Result<(), DatastoreError> {
        match record {
            Record::Upsert(doc) => {
                self.upsert(doc.clone())?;
            }
            Record::Tombstone(id) => {
                self.remove(id);
            }
            Record::IndexCreated(spec) => {
                self.ensure_index(spec.clone())?;
            }
            Record::IndexRemoved(field) => match self.remove_index(field) {
                Ok(_) | Err(DatastoreError::IndexNotFound(_)) => {}
                Err(e) => return Err(e),
            },
        }
        Ok(())
    }

    /// Encode the secondary index definitions and every live document
    pub fn snapshot(&self) -> Result<Snapshot, serde_json::Error> {
        let specs = self
            .indexes
            .values()
            .map(Index::spec)
            .filter(|spec| spec.field_name != ID_FIELD);
        Snapshot::encode(specs, self.documents())
    }

    fn id_index(&self) -> Option<&Index> {
        self.indexes.get(ID_FIELD)
    }

    fn require_index(&self, field: &str) -> Result<&Index, DatastoreError> {
        self.indexes
            .get(field)
            .ok_or_else(|| DatastoreError::IndexNotFound(field.to_string()))
    }

    fn resolve(&self, ids: Vec<String>) -> Vec<Document> {
        ids.iter().filter_map(|id| self.docs.get(id)).cloned().collect()
    }
}

fn require_id(doc: &Document) -> Result<String, DatastoreError> {
    match doc.id() {
        Some(id) => Ok(id.to_string()),
        None => Err(DocumentError::InvalidId("missing").into()),
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
