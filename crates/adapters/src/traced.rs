// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrapper for consistent observability

use crate::storage::{StorageAdapter, StorageError};
use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;
use tracing::Instrument;

/// Wrapper that adds tracing to any StorageAdapter
///
/// The crash-safe write and integrity recovery protocols run against the
/// wrapper, so each of their steps is logged individually.
#[derive(Clone)]
pub struct TracedStorage<S> {
    inner: S,
}

impl<S> TracedStorage<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

fn log_result<T>(result: &Result<T, StorageError>, start: Instant, done: &str) {
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(_) => tracing::debug!(elapsed_ms, "{}", done),
        Err(e) => tracing::error!(elapsed_ms, error = %e, "failed"),
    }
}

#[async_trait]
impl<S: StorageAdapter> StorageAdapter for TracedStorage<S> {
    async fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        let result = self.inner.exists(path).await;
        tracing::trace!(path = %path.display(), exists = ?result.as_ref().ok(), "checked");
        result
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError> {
        let span = tracing::info_span!(
            "storage.rename",
            from = %from.display(),
            to = %to.display()
        );
        async {
            let start = Instant::now();
            let result = self.inner.rename(from, to).await;
            log_result(&result, start, "renamed");
            result
        }
        .instrument(span)
        .await
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let span = tracing::info_span!("storage.write", path = %path.display(), bytes = data.len());
        async {
            let start = Instant::now();
            let result = self.inner.write_file(path, data).await;
            log_result(&result, start, "written");
            result
        }
        .instrument(span)
        .await
    }

    async fn append_file(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let span = tracing::info_span!("storage.append", path = %path.display(), bytes = data.len());
        async {
            let start = Instant::now();
            let result = self.inner.append_file(path, data).await;
            log_result(&result, start, "appended");
            result
        }
        .instrument(span)
        .await
    }

    async fn unlink(&self, path: &Path) -> Result<(), StorageError> {
        let span = tracing::info_span!("storage.unlink", path = %path.display());
        async {
            let result = self.inner.unlink(path).await;
            match &result {
                Ok(()) => tracing::info!("unlinked"),
                Err(e) => tracing::warn!(error = %e, "unlink failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn mkdirp(&self, path: &Path) -> Result<(), StorageError> {
        let result = self.inner.mkdirp(path).await;
        match &result {
            Ok(()) => tracing::debug!(path = %path.display(), "directory ready"),
            Err(e) => tracing::error!(path = %path.display(), error = %e, "mkdirp failed"),
        }
        result
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        let span = tracing::info_span!("storage.read", path = %path.display());
        async {
            let start = Instant::now();
            let result = self.inner.read_file(path).await;
            match &result {
                Ok(data) => tracing::debug!(
                    bytes = data.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "read"
                ),
                Err(e) => tracing::error!(error = %e, "read failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn flush(&self, path: &Path, is_dir: bool) -> Result<(), StorageError> {
        let span = tracing::info_span!("storage.flush", path = %path.display(), is_dir);
        async {
            let start = Instant::now();
            let result = self.inner.flush(path, is_dir).await;
            log_result(&result, start, "flushed");
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
