// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the datastore

use crate::config::ConfigError;
use crate::index::IndexError;
use crate::sequencer::SequencerError;
use holt_core::DocumentError;
use holt_storage::PersistenceError;
use thiserror::Error;

/// Errors returned by datastore operations
#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("document `{0}` already exists")]
    DuplicateId(String),
    #[error("invalid document: {0}")]
    InvalidDocument(#[from] DocumentError),
    #[error("cannot change _id of `{from}` to `{to}`")]
    ImmutableId { from: String, to: String },
    #[error("no index on field `{0}`")]
    IndexNotFound(String),
    #[error("index on `{0}` cannot be removed")]
    ProtectedIndex(String),
    #[error(transparent)]
    Constraint(#[from] IndexError),
    #[error("update stopped at `{failed_id}` after {committed} documents: {source}")]
    PartialUpdate {
        failed_id: String,
        committed: usize,
        source: Box<DatastoreError>,
    },
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("datastore is closed")]
    Closed,
    #[error("operation panicked: {0}")]
    Panicked(String),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<SequencerError> for DatastoreError {
    fn from(err: SequencerError) -> Self {
        match err {
            SequencerError::Closed => Self::Closed,
            SequencerError::Panicked(message) => Self::Panicked(message),
        }
    }
}
