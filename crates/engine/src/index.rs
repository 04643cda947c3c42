// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered secondary index
//!
//! Maps field values to the ids of the documents holding them. Array values
//! are indexed once per distinct element. Every mutation either applies in
//! full or leaves the tree as it was.

use holt_core::{compare_values, Document, IndexKey, Value};
use holt_storage::IndexSpec;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use thiserror::Error;

/// Errors from index mutations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("unique constraint violated on `{field}`: key {key} already used by `{id}`")]
    UniqueViolation {
        field: String,
        key: String,
        id: String,
    },
}

/// Index over one field path
#[derive(Debug, Clone)]
pub struct Index {
    spec: IndexSpec,
    tree: BTreeMap<IndexKey, BTreeSet<String>>,
}

impl Index {
    pub fn new(spec: IndexSpec) -> Self {
        Self {
            spec,
            tree: BTreeMap::new(),
        }
    }

    pub fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    pub fn field_name(&self) -> &str {
        &self.spec.field_name
    }

    /// Number of distinct keys in the tree
    pub fn key_count(&self) -> usize {
        self.tree.len()
    }

    /// Keys under which `doc` is stored
    pub fn keys_for(&self, doc: &Document) -> Vec<IndexKey> {
        match doc.dot_value(&self.spec.field_name) {
            None if self.spec.sparse => Vec::new(),
            None => vec![IndexKey::Missing],
            Some(Value::Array(items)) => items
                .into_iter()
                .map(IndexKey::Value)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            Some(value) => vec![IndexKey::Value(value)],
        }
    }

    /// Add a document under all of its keys
    pub fn insert(&mut self, doc: &Document) -> Result<(), IndexError> {
        let id = doc_id(doc);
        let mut added = Vec::new();

        for key in self.keys_for(doc) {
            if self.spec.unique {
                if let Some(other) = self
                    .tree
                    .get(&key)
                    .and_then(|ids| ids.iter().find(|other| *other != id))
                {
                    let err = IndexError::UniqueViolation {
                        field: self.spec.field_name.clone(),
                        key: key.to_string(),
                        id: other.clone(),
                    };
                    for key in added {
                        self.detach(&key, id);
                    }
                    return Err(err);
                }
            }
            if self.tree.entry(key.clone()).or_default().insert(id.to_string()) {
                added.push(key);
            }
        }
        Ok(())
    }

    /// Remove a document from all of its keys
    pub fn remove(&mut self, doc: &Document) {
        let id = doc_id(doc);
        for key in self.keys_for(doc) {
            self.detach(&key, id);
        }
    }

    /// Move a document from its old keys to its new keys
    pub fn update(&mut self, old: &Document, new: &Document) -> Result<(), IndexError> {
        self.remove(old);
        if let Err(e) = self.insert(new) {
            self.attach_unchecked(old);
            return Err(e);
        }
        Ok(())
    }

    /// Insert several documents, all or none
    pub fn insert_all(&mut self, docs: &[&Document]) -> Result<(), IndexError> {
        for (i, doc) in docs.iter().enumerate() {
            if let Err(e) = self.insert(doc) {
                for done in &docs[..i] {
                    self.remove(done);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Ids stored under `value`; an array value matches any of its elements
    pub fn get_matching(&self, value: &Value) -> Vec<String> {
        let ids: BTreeSet<&String> = match value {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| self.tree.get(&IndexKey::Value(item.clone())))
                .flatten()
                .collect(),
            _ => self
                .tree
                .get(&IndexKey::Value(value.clone()))
                .into_iter()
                .flatten()
                .collect(),
        };
        ids.into_iter().cloned().collect()
    }

    /// Ids of documents missing the field (always empty for sparse indexes)
    pub fn get_missing(&self) -> Vec<String> {
        self.tree
            .get(&IndexKey::Missing)
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }

    /// Ids whose key falls between the bounds, in key order
    ///
    /// Documents missing the field never match a range.
    pub fn get_between(&self, lower: Bound<&Value>, upper: Bound<&Value>) -> Vec<String> {
        if range_is_empty(&lower, &upper) {
            return Vec::new();
        }
        let lower = match lower {
            Bound::Unbounded => Bound::Excluded(IndexKey::Missing),
            other => other.map(|v| IndexKey::Value(v.clone())),
        };
        let upper = upper.map(|v| IndexKey::Value(v.clone()));

        let mut seen = BTreeSet::new();
        self.tree
            .range((lower, upper))
            .flat_map(|(_, ids)| ids.iter())
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect()
    }

    /// Every indexed id, in key order
    pub fn all_ids(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.tree
            .values()
            .flatten()
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect()
    }

    fn detach(&mut self, key: &IndexKey, id: &str) {
        if let Some(ids) = self.tree.get_mut(key) {
            ids.remove(id);
            if ids.is_empty() {
                self.tree.remove(key);
            }
        }
    }

    /// Put back a document that was indexed before, skipping the unique check
    fn attach_unchecked(&mut self, doc: &Document) {
        let id = doc_id(doc).to_string();
        for key in self.keys_for(doc) {
            self.tree.entry(key).or_default().insert(id.clone());
        }
    }
}

fn doc_id(doc: &Document) -> &str {
    doc.id().unwrap_or_default()
}

/// `BTreeMap::range` panics on inverted bounds and on equal excluded bounds
fn range_is_empty(lower: &Bound<&Value>, upper: &Bound<&Value>) -> bool {
    let (lo, lo_incl) = match lower {
        Bound::Included(v) => (*v, true),
        Bound::Excluded(v) => (*v, false),
        Bound::Unbounded => return false,
    };
    let (hi, hi_incl) = match upper {
        Bound::Included(v) => (*v, true),
        Bound::Excluded(v) => (*v, false),
        Bound::Unbounded => return false,
    };
    match compare_values(lo, hi) {
        Ordering::Greater => true,
        Ordering::Equal => !(lo_incl && hi_incl),
        Ordering::Less => false,
    }
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod tests;
