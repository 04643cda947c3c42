// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem storage adapter backed by tokio::fs

use super::{FlushError, StorageAdapter, StorageError, StorageOp};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Storage adapter for the local filesystem
#[derive(Clone, Copy, Debug)]
pub struct FsStorage {
    dir_sync: bool,
}

impl FsStorage {
    /// Create an adapter; directory fsync is enabled except on Windows,
    /// which cannot flush directory handles
    pub fn new() -> Self {
        Self {
            dir_sync: !cfg!(windows),
        }
    }

    /// Enable or disable fsync of directory handles
    pub fn with_dir_sync(mut self, enabled: bool) -> Self {
        self.dir_sync = enabled;
        self
    }

    pub fn dir_sync(&self) -> bool {
        self.dir_sync
    }
}

impl Default for FsStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageAdapter for FsStorage {
    async fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        fs::try_exists(path)
            .await
            .map_err(|e| StorageError::io(StorageOp::Exists, path, e))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError> {
        fs::rename(from, to)
            .await
            .map_err(|e| StorageError::io(StorageOp::Rename, from, e))
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        fs::write(path, data)
            .await
            .map_err(|e| StorageError::io(StorageOp::Write, path, e))
    }

    async fn append_file(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let io_err = |e| StorageError::io(StorageOp::Append, path, e);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(io_err)?;
        file.write_all(data).await.map_err(io_err)?;
        // tokio completes writes in the background; wait for them before drop
        file.flush().await.map_err(io_err)
    }

    async fn unlink(&self, path: &Path) -> Result<(), StorageError> {
        fs::remove_file(path)
            .await
            .map_err(|e| StorageError::io(StorageOp::Unlink, path, e))
    }

    async fn mkdirp(&self, path: &Path) -> Result<(), StorageError> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| StorageError::io(StorageOp::Mkdir, path, e))
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        fs::read(path)
            .await
            .map_err(|e| StorageError::io(StorageOp::Read, path, e))
    }

    async fn flush(&self, path: &Path, is_dir: bool) -> Result<(), StorageError> {
        if is_dir && !self.dir_sync {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(!is_dir)
            .open(path)
            .await
            .map_err(|e| StorageError::io(StorageOp::Open, path, e))?;

        let on_fsync = file.sync_all().await.err();
        // std offers no fallible close; shutdown is the last point a
        // deferred error on this handle can surface
        let on_close = if is_dir {
            None
        } else {
            file.shutdown().await.err()
        };
        drop(file);

        if on_fsync.is_some() || on_close.is_some() {
            return Err(FlushError {
                path: path.to_path_buf(),
                on_fsync,
                on_close,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
