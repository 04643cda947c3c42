// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! holt-engine: indexed document datastore

mod config;
mod datastore;
mod error;
pub mod index;
mod sequencer;
pub mod state;

pub use config::{ConfigError, DatastoreConfig};
pub use datastore::Datastore;
pub use error::DatastoreError;
pub use index::{Index, IndexError};
pub use sequencer::{Sequencer, SequencerError};
pub use state::Collection;

pub use holt_storage::{CompactionResult, CorruptionPolicy, IndexSpec, LoadReport};
