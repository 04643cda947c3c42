// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O

pub mod storage;
pub mod traced;

pub use storage::{
    parent_dir, temp_path, FlushError, FsStorage, Integrity, StorageAdapter, StorageError,
    StorageOp, TEMP_SUFFIX,
};
pub use traced::TracedStorage;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use storage::{FakeStorage, StorageCall};
