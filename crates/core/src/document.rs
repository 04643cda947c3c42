// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema-less documents
//!
//! A document is an ordered field map of JSON values with one reserved
//! field, `_id`, holding its identifier. Field names may not start with `$`
//! or contain `.`: `$`-prefixed keys are reserved for log record markers and
//! `.` separates the parts of a field path.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Name of the reserved identifier field
pub const ID_FIELD: &str = "_id";

/// Errors from document validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("document must be a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("field names cannot begin with '$': {0}")]
    ReservedFieldName(String),
    #[error("field names cannot contain '.': {0}")]
    DottedFieldName(String),
    #[error("_id must be a string, got {0}")]
    InvalidId(&'static str),
}

/// A stored document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from a JSON value, validating field names
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        match value {
            Value::Object(map) => {
                let doc = Self(map);
                doc.validate()?;
                Ok(doc)
            }
            other => Err(DocumentError::NotAnObject(kind_name(&other))),
        }
    }

    /// Wrap a map without validating it (used when decoding trusted log lines)
    pub fn from_map_unchecked(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// The document identifier, if one has been assigned
    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    /// Set the identifier, keeping `_id` as the first field for new documents
    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = Value::String(id.into());
        if let Some(slot) = self.0.get_mut(ID_FIELD) {
            *slot = id;
            return;
        }
        let mut map = Map::with_capacity(self.0.len() + 1);
        map.insert(ID_FIELD.to_string(), id);
        map.append(&mut self.0);
        self.0 = map;
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.shift_remove(field)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Check field names recursively and the type of `_id`
    pub fn validate(&self) -> Result<(), DocumentError> {
        if let Some(id) = self.0.get(ID_FIELD) {
            if !id.is_string() {
                return Err(DocumentError::InvalidId(kind_name(id)));
            }
        }
        validate_map(&self.0)
    }

    /// Resolve a dotted field path such as `address.city` or `tags.0`
    ///
    /// Crossing an array with a non-numeric part maps the rest of the path
    /// over every element, so `items.sku` on `{items: [{sku: 1}, {sku: 2}]}`
    /// yields `[1, 2]`. Elements missing the rest of the path are skipped.
    pub fn dot_value(&self, path: &str) -> Option<Value> {
        let parts: Vec<&str> = path.split('.').collect();
        let (first, rest) = parts.split_first()?;
        dot_value_in(self.0.get(*first)?, rest)
    }
}

impl TryFrom<Value> for Document {
    type Error = DocumentError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.into_value()
    }
}

fn dot_value_in(value: &Value, parts: &[&str]) -> Option<Value> {
    let Some((first, rest)) = parts.split_first() else {
        return Some(value.clone());
    };

    match value {
        Value::Object(map) => dot_value_in(map.get(*first)?, rest),
        Value::Array(items) => match first.parse::<usize>() {
            Ok(i) => dot_value_in(items.get(i)?, rest),
            Err(_) => Some(Value::Array(
                items
                    .iter()
                    .filter_map(|item| dot_value_in(item, parts))
                    .collect(),
            )),
        },
        _ => None,
    }
}

fn validate_map(map: &Map<String, Value>) -> Result<(), DocumentError> {
    for (key, value) in map {
        if key.starts_with('$') {
            return Err(DocumentError::ReservedFieldName(key.clone()));
        }
        if key.contains('.') {
            return Err(DocumentError::DottedFieldName(key.clone()));
        }
        validate_value(value)?;
    }
    Ok(())
}

fn validate_value(value: &Value) -> Result<(), DocumentError> {
    match value {
        Value::Object(map) => validate_map(map),
        Value::Array(items) => items.iter().try_for_each(validate_value),
        _ => Ok(()),
    }
}

pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
