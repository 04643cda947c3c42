// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! holt-storage: the append-only datafile

mod persistence;
mod record;

pub use persistence::{
    CompactionResult, CorruptionPolicy, LoadReport, Loaded, LogOptions, Persistence,
    PersistenceError, Snapshot,
};
pub use record::{IndexSpec, Record, RecordError};
