// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory storage adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{FlushError, StorageAdapter, StorageError, StorageOp};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Recorded storage call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    Exists(PathBuf),
    Rename { from: PathBuf, to: PathBuf },
    Write { path: PathBuf, len: usize },
    Append { path: PathBuf, len: usize },
    Unlink(PathBuf),
    Mkdirp(PathBuf),
    Read(PathBuf),
    Flush { path: PathBuf, is_dir: bool },
    /// A handle was opened to service a flush
    Open(PathBuf),
}

#[derive(Default)]
struct FakeState {
    files: HashMap<PathBuf, Vec<u8>>,
    dirs: HashSet<PathBuf>,
    calls: Vec<StorageCall>,
    /// Calls allowed before every later call fails, simulating a crash
    crash_after: Option<usize>,
    fail_fsync: bool,
    fail_close: bool,
    /// File flushes left to fail on fsync before flushing works again
    failing_flushes: usize,
}

/// In-memory storage adapter with call recording and fault injection
#[derive(Clone)]
pub struct FakeStorage {
    state: Arc<Mutex<FakeState>>,
    dir_sync: bool,
}

impl Default for FakeStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeStorage {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            dir_sync: true,
        }
    }

    /// Enable or disable fsync of directory handles
    pub fn with_dir_sync(mut self, enabled: bool) -> Self {
        self.dir_sync = enabled;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<StorageCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Current contents of a file
    pub fn file(&self, path: &Path) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }

    /// Current contents of a file as UTF-8 text
    pub fn file_text(&self, path: &Path) -> Option<String> {
        self.file(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Place a file directly, bypassing call recording
    pub fn set_file(&self, path: &Path, data: impl Into<Vec<u8>>) {
        let mut state = self.lock();
        add_ancestors(&mut state.dirs, path.parent());
        state.files.insert(path.to_path_buf(), data.into());
    }

    /// Remove a file directly, bypassing call recording
    pub fn delete_file(&self, path: &Path) {
        self.lock().files.remove(path);
    }

    /// Let `n` more calls succeed, then fail every call after them
    pub fn crash_after(&self, n: usize) {
        let mut state = self.lock();
        let made = state.calls.len();
        state.crash_after = Some(made + n);
    }

    /// Stop failing calls
    pub fn recover(&self) {
        self.lock().crash_after = None;
    }

    /// Make file flushes fail on fsync and/or close
    pub fn fail_flush(&self, fsync: bool, close: bool) {
        let mut state = self.lock();
        state.fail_fsync = fsync;
        state.fail_close = close;
    }

    /// Make only the next `n` file flushes fail on fsync
    pub fn fail_next_flushes(&self, n: usize) {
        self.lock().failing_flushes = n;
    }

    fn record(&self, call: StorageCall, op: StorageOp, path: &Path) -> Result<(), StorageError> {
        let mut state = self.lock();
        let limit = state.crash_after;
        let crashed = limit.is_some_and(|limit| state.calls.len() >= limit);
        state.calls.push(call);
        if crashed {
            return Err(StorageError::io(
                op,
                path,
                io::Error::other("simulated crash"),
            ));
        }
        Ok(())
    }
}

fn not_found(op: StorageOp, path: &Path) -> StorageError {
    StorageError::io(op, path, io::Error::from(io::ErrorKind::NotFound))
}

fn is_root(path: &Path) -> bool {
    path.as_os_str().is_empty() || path == Path::new(".") || path == Path::new("/")
}

fn dir_exists(state: &FakeState, dir: Option<&Path>) -> bool {
    match dir {
        None => true,
        Some(d) => is_root(d) || state.dirs.contains(d),
    }
}

fn add_ancestors(dirs: &mut HashSet<PathBuf>, dir: Option<&Path>) {
    let mut current = dir;
    while let Some(d) = current {
        if is_root(d) {
            break;
        }
        dirs.insert(d.to_path_buf());
        current = d.parent();
    }
}

#[async_trait]
impl StorageAdapter for FakeStorage {
    async fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        self.record(StorageCall::Exists(path.to_path_buf()), StorageOp::Exists, path)?;
        let state = self.lock();
        Ok(state.files.contains_key(path) || is_root(path) || state.dirs.contains(path))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError> {
        self.record(
            StorageCall::Rename {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
            },
            StorageOp::Rename,
            from,
        )?;
        let mut state = self.lock();
        let data = state
            .files
            .remove(from)
            .ok_or_else(|| not_found(StorageOp::Rename, from))?;
        state.files.insert(to.to_path_buf(), data);
        Ok(())
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        self.record(
            StorageCall::Write {
                path: path.to_path_buf(),
                len: data.len(),
            },
            StorageOp::Write,
            path,
        )?;
        let mut state = self.lock();
        if !dir_exists(&state, path.parent()) {
            return Err(not_found(StorageOp::Write, path));
        }
        state.files.insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    async fn append_file(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        self.record(
            StorageCall::Append {
                path: path.to_path_buf(),
                len: data.len(),
            },
            StorageOp::Append,
            path,
        )?;
        let mut state = self.lock();
        if !dir_exists(&state, path.parent()) {
            return Err(not_found(StorageOp::Append, path));
        }
        state
            .files
            .entry(path.to_path_buf())
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    async fn unlink(&self, path: &Path) -> Result<(), StorageError> {
        self.record(StorageCall::Unlink(path.to_path_buf()), StorageOp::Unlink, path)?;
        let mut state = self.lock();
        match state.files.remove(path) {
            Some(_) => Ok(()),
            None => Err(not_found(StorageOp::Unlink, path)),
        }
    }

    async fn mkdirp(&self, path: &Path) -> Result<(), StorageError> {
        self.record(StorageCall::Mkdirp(path.to_path_buf()), StorageOp::Mkdir, path)?;
        add_ancestors(&mut self.lock().dirs, Some(path));
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        self.record(StorageCall::Read(path.to_path_buf()), StorageOp::Read, path)?;
        self.lock()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(StorageOp::Read, path))
    }

    async fn flush(&self, path: &Path, is_dir: bool) -> Result<(), StorageError> {
        self.record(
            StorageCall::Flush {
                path: path.to_path_buf(),
                is_dir,
            },
            StorageOp::Open,
            path,
        )?;
        if is_dir && !self.dir_sync {
            return Ok(());
        }

        let mut state = self.lock();
        let present = if is_dir {
            dir_exists(&state, Some(path))
        } else {
            state.files.contains_key(path)
        };
        if !present {
            return Err(not_found(StorageOp::Open, path));
        }
        state.calls.push(StorageCall::Open(path.to_path_buf()));

        if !is_dir && state.failing_flushes > 0 {
            state.failing_flushes -= 1;
            return Err(FlushError {
                path: path.to_path_buf(),
                on_fsync: Some(io::Error::other("fsync failed")),
                on_close: None,
            }
            .into());
        }
        if is_dir || !(state.fail_fsync || state.fail_close) {
            return Ok(());
        }
        let on_fsync = state
            .fail_fsync
            .then(|| io::Error::other("fsync failed"));
        let on_close = state
            .fail_close
            .then(|| io::Error::other("close failed"));
        Err(FlushError {
            path: path.to_path_buf(),
            on_fsync,
            on_close,
        }
        .into())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
