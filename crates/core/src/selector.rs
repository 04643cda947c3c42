// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document selection
//!
//! Query languages live outside the engine; anything that can answer
//! "does this document match" plugs in through [`Selector`].

use crate::compare::compare_values;
use crate::document::{Document, ID_FIELD};
use serde_json::Value;
use std::cmp::Ordering;

/// Predicate deciding whether a document takes part in an operation
pub trait Selector: Send + Sync + 'static {
    fn matches(&self, doc: &Document) -> bool;
}

impl<F> Selector for F
where
    F: Fn(&Document) -> bool + Send + Sync + 'static,
{
    fn matches(&self, doc: &Document) -> bool {
        self(doc)
    }
}

/// Matches every document
#[derive(Clone, Copy, Debug, Default)]
pub struct MatchAll;

impl Selector for MatchAll {
    fn matches(&self, _doc: &Document) -> bool {
        true
    }
}

/// Matches documents whose field path equals a value
///
/// An array-valued path matches when any element equals the value.
#[derive(Clone, Debug)]
pub struct FieldEq {
    path: String,
    value: Value,
}

impl FieldEq {
    pub fn new(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Match a single document by identifier
    pub fn id(id: impl Into<String>) -> Self {
        Self::new(ID_FIELD, Value::String(id.into()))
    }
}

impl Selector for FieldEq {
    fn matches(&self, doc: &Document) -> bool {
        let Some(found) = doc.dot_value(&self.path) else {
            return false;
        };
        let equal = |v: &Value| compare_values(v, &self.value) == Ordering::Equal;
        match &found {
            Value::Array(items) if !self.value.is_array() => items.iter().any(equal),
            other => equal(other),
        }
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
