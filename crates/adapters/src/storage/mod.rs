// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage adapters
//!
//! A [`StorageAdapter`] exposes the handful of filesystem primitives the
//! engine needs. The crash-safe rewrite protocol and startup integrity
//! recovery are built on top of those primitives as provided methods, so
//! every backend gets them unmodified.

mod fs;

pub use fs::FsStorage;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeStorage, StorageCall};

use async_trait::async_trait;
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Suffix of the sibling file used during crash-safe rewrites
pub const TEMP_SUFFIX: &str = "~";

/// Primitive that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    Exists,
    Rename,
    Write,
    Append,
    Unlink,
    Mkdir,
    Read,
    Open,
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exists => "exists",
            Self::Rename => "rename",
            Self::Write => "write",
            Self::Append => "append",
            Self::Unlink => "unlink",
            Self::Mkdir => "mkdir",
            Self::Read => "read",
            Self::Open => "open",
        };
        f.write_str(name)
    }
}

/// Errors from storage primitives
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{op} failed for {}: {source}", .path.display())]
    Io {
        op: StorageOp,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Flush(#[from] FlushError),
}

impl StorageError {
    pub fn io(op: StorageOp, path: &Path, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this error means the target did not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// A flush that failed on fsync, on close, or on both
#[derive(Debug)]
pub struct FlushError {
    pub path: PathBuf,
    pub on_fsync: Option<io::Error>,
    pub on_close: Option<io::Error>,
}

impl fmt::Display for FlushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to flush {} to storage", self.path.display())?;
        if let Some(e) = &self.on_fsync {
            write!(f, "; fsync: {}", e)?;
        }
        if let Some(e) = &self.on_close {
            write!(f, "; close: {}", e)?;
        }
        Ok(())
    }
}

impl std::error::Error for FlushError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.on_fsync
            .as_ref()
            .or(self.on_close.as_ref())
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Outcome of [`StorageAdapter::ensure_integrity`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integrity {
    /// The datafile exists; the last rewrite either finished or never started
    Intact,
    /// Only the temp sibling existed and was renamed over the datafile
    Promoted,
    /// Neither existed; an empty datafile was created
    Initialized,
}

/// Path of the temp sibling used while rewriting `path`
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Directory containing `path`, `.` for bare file names
pub fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Adapter over filesystem primitives
#[async_trait]
pub trait StorageAdapter: Clone + Send + Sync + 'static {
    /// Check whether a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool, StorageError>;

    /// Atomically rename `from` over `to`
    async fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError>;

    /// Create or truncate a file and write `data` to it
    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), StorageError>;

    /// Append `data` to a file, creating it if needed
    async fn append_file(&self, path: &Path, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a file
    async fn unlink(&self, path: &Path) -> Result<(), StorageError>;

    /// Create a directory and all missing parents
    async fn mkdirp(&self, path: &Path) -> Result<(), StorageError>;

    /// Read a whole file
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError>;

    /// Flush a file or directory to durable storage
    ///
    /// Opens the target (read-write for files, read-only for directories),
    /// fsyncs and closes it. Backends that cannot sync directory handles
    /// treat a directory flush as a successful no-op.
    async fn flush(&self, path: &Path, is_dir: bool) -> Result<(), StorageError>;

    /// Delete a file if it exists
    async fn ensure_file_absent(&self, path: &Path) -> Result<(), StorageError> {
        if self.exists(path).await? {
            self.unlink(path).await?;
        }
        Ok(())
    }

    /// Replace `path` with `data` so that a crash at any point leaves either
    /// the untouched original or the complete new contents at `path`
    async fn crash_safe_write(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let dir = parent_dir(path);
        let temp = temp_path(path);

        self.flush(&dir, true).await?;
        if self.exists(path).await? {
            self.flush(path, false).await?;
        }
        self.write_file(&temp, data).await?;
        self.flush(&temp, false).await?;
        self.rename(&temp, path).await?;
        self.flush(&dir, true).await?;
        Ok(())
    }

    /// Recover the datafile after a crash, before it is first loaded
    async fn ensure_integrity(&self, path: &Path) -> Result<Integrity, StorageError> {
        if self.exists(path).await? {
            return Ok(Integrity::Intact);
        }

        let temp = temp_path(path);
        if self.exists(&temp).await? {
            self.rename(&temp, path).await?;
            return Ok(Integrity::Promoted);
        }

        self.write_file(path, b"").await?;
        Ok(Integrity::Initialized)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
