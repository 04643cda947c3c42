// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Datafile records
//!
//! Each record is one JSON object on its own line. Documents are stored as
//! themselves; the other record kinds are told apart by reserved `$$` keys
//! that validated documents can never contain:
//!
//! ```text
//! {"_id":"X","a":2}                                                    upsert
//! {"$$deleted":true,"_id":"X"}                                         tombstone
//! {"$$indexCreated":{"fieldName":"email","unique":true,"sparse":false}} index created
//! {"$$indexRemoved":"email"}                                           index removed
//! ```

use holt_core::{Document, ID_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

const DELETED: &str = "$$deleted";
const INDEX_CREATED: &str = "$$indexCreated";
const INDEX_REMOVED: &str = "$$indexRemoved";

/// Errors decoding a single datafile line
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid UTF-8")]
    Utf8,
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("record has no string _id")]
    MissingId,
    #[error("malformed {0} marker")]
    BadMarker(&'static str),
}

/// Definition of a secondary index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSpec {
    pub field_name: String,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub sparse: bool,
}

impl IndexSpec {
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            unique: false,
            sparse: false,
        }
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn sparse(mut self, sparse: bool) -> Self {
        self.sparse = sparse;
        self
    }
}

/// One entry of the append-only log
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Full current contents of a document
    Upsert(Document),
    /// Deletion of the document with this id
    Tombstone(String),
    IndexCreated(IndexSpec),
    IndexRemoved(String),
}

impl Record {
    /// Serialize to a single line of JSON, without the trailing newline
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Upsert(doc) => serde_json::to_string(doc),
            Self::Tombstone(id) => serde_json::to_string(&json!({ DELETED: true, ID_FIELD: id })),
            Self::IndexCreated(spec) => serde_json::to_string(&json!({ INDEX_CREATED: spec })),
            Self::IndexRemoved(field) => serde_json::to_string(&json!({ INDEX_REMOVED: field })),
        }
    }

    /// Parse one line of the datafile
    pub fn from_line(line: &str) -> Result<Self, RecordError> {
        let Value::Object(mut map) = serde_json::from_str::<Value>(line)? else {
            return Err(RecordError::NotAnObject);
        };

        if let Some(marker) = map.remove(DELETED) {
            if marker != Value::Bool(true) {
                return Err(RecordError::BadMarker(DELETED));
            }
            return Ok(Self::Tombstone(take_id(&mut map)?));
        }

        if let Some(spec) = map.remove(INDEX_CREATED) {
            let spec: IndexSpec =
                serde_json::from_value(spec).map_err(|_| RecordError::BadMarker(INDEX_CREATED))?;
            return Ok(Self::IndexCreated(spec));
        }

        if let Some(field) = map.remove(INDEX_REMOVED) {
            return match field {
                Value::String(field) => Ok(Self::IndexRemoved(field)),
                _ => Err(RecordError::BadMarker(INDEX_REMOVED)),
            };
        }

        match map.get(ID_FIELD) {
            Some(Value::String(_)) => Ok(Self::Upsert(Document::from_map_unchecked(map))),
            _ => Err(RecordError::MissingId),
        }
    }

    /// Parse a raw line that may not be valid UTF-8
    pub fn from_bytes(line: &[u8]) -> Result<Self, RecordError> {
        let line = std::str::from_utf8(line).map_err(|_| RecordError::Utf8)?;
        Self::from_line(line)
    }

    /// Id of the document this record touches, if any
    pub fn doc_id(&self) -> Option<&str> {
        match self {
            Self::Upsert(doc) => doc.id(),
            Self::Tombstone(id) => Some(id),
            Self::IndexCreated(_) | Self::IndexRemoved(_) => None,
        }
    }
}

fn take_id(map: &mut Map<String, Value>) -> Result<String, RecordError> {
    match map.remove(ID_FIELD) {
        Some(Value::String(id)) => Ok(id),
        _ => Err(RecordError::MissingId),
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
