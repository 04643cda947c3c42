// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! holt-core: document model shared by the holt crates
//!
//! This crate provides:
//! - Schema-less documents with dotted field-path access
//! - The total value ordering used by index trees
//! - Identifier generation
//! - The selector seam for pluggable query matching

pub mod compare;
pub mod document;
pub mod id;
pub mod selector;

pub use compare::{compare_values, IndexKey};
pub use document::{Document, DocumentError, ID_FIELD};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use selector::{FieldEq, MatchAll, Selector};
pub use serde_json::{json, Value};
