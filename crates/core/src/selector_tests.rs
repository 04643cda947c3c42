// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn doc(value: Value) -> Document {
    Document::from_value(value).unwrap()
}

#[test]
fn closures_are_selectors() {
    let sel = |d: &Document| d.get("a") == Some(&json!(1));
    assert!(sel.matches(&doc(json!({"a": 1}))));
    assert!(!sel.matches(&doc(json!({"a": 2}))));
}

#[test]
fn field_eq_matches_array_elements() {
    let sel = FieldEq::new("tags", "red");
    assert!(sel.matches(&doc(json!({"tags": ["blue", "red"]}))));
    assert!(!sel.matches(&doc(json!({"tags": ["blue"]}))));
    assert!(!sel.matches(&doc(json!({"other": 1}))));
}

#[test]
fn field_eq_by_id() {
    let sel = FieldEq::id("X");
    assert!(sel.matches(&doc(json!({"_id": "X"}))));
    assert!(!sel.matches(&doc(json!({"_id": "Y"}))));
}
