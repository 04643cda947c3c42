// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only datafile
//!
//! Mutations are appended as one record per line. Loading reads the whole
//! file and returns records in file order for replay. Compaction rewrites
//! the file through [`StorageAdapter::crash_safe_write`] with one record per
//! live document, dropping superseded history.

use crate::record::{IndexSpec, Record};
use holt_adapters::{parent_dir, Integrity, StorageAdapter, StorageError};
use holt_core::Document;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;

/// Errors from datafile operations
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("corrupt datafile {} at line {line}: {reason}", .path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// How malformed lines are handled on load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptionPolicy {
    /// Drop a malformed last line (a crash mid-append); fail on any other
    #[default]
    Lenient,
    /// Fail on any malformed line
    Strict,
}

/// Datafile options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogOptions {
    pub corruption: CorruptionPolicy,
    /// Flush the datafile after every append
    pub sync_appends: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            corruption: CorruptionPolicy::Lenient,
            sync_appends: true,
        }
    }
}

/// What a load found in the datafile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records parsed
    pub records: usize,
    /// Malformed trailing lines dropped under the lenient policy
    pub dropped_lines: usize,
    pub bytes: u64,
    /// The file did not end with a newline
    pub unterminated: bool,
}

/// Records read from the datafile, in file order
#[derive(Debug, Clone, Default)]
pub struct Loaded {
    pub records: Vec<Record>,
    pub report: LoadReport,
}

/// Result of a compaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionResult {
    /// Lines in the datafile before compaction that were not rewritten
    pub records_removed: u64,
    /// Records in the rewritten datafile
    pub records_written: u64,
    pub bytes_written: u64,
    pub bytes_reclaimed: u64,
}

/// Snapshot of live state, encoded and ready to be written
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    buf: Vec<u8>,
    records: u64,
}

impl Snapshot {
    /// Encode index definitions followed by every live document
    pub fn encode<'a>(
        indexes: impl IntoIterator<Item = &'a IndexSpec>,
        docs: impl IntoIterator<Item = &'a Document>,
    ) -> Result<Self, serde_json::Error> {
        let mut snapshot = Self::default();
        for spec in indexes {
            snapshot.push(&Record::IndexCreated(spec.clone()))?;
        }
        for doc in docs {
            serde_json::to_writer(&mut snapshot.buf, doc)?;
            snapshot.buf.push(b'\n');
            snapshot.records += 1;
        }
        Ok(snapshot)
    }

    fn push(&mut self, record: &Record) -> Result<(), serde_json::Error> {
        self.buf.extend_from_slice(record.to_line()?.as_bytes());
        self.buf.push(b'\n');
        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// Append-only log of records backed by a [`StorageAdapter`]
pub struct Persistence<S> {
    storage: S,
    path: PathBuf,
    options: LogOptions,
    /// Lines currently in the datafile
    lines: AtomicU64,
    bytes: AtomicU64,
    /// Records appended since the last load or compaction
    appended: AtomicU64,
    /// The file tail may hold a partial line, so the next write must be a
    /// full rewrite rather than an append
    needs_rewrite: AtomicBool,
}

impl<S: StorageAdapter> Persistence<S> {
    pub fn new(storage: S, path: impl Into<PathBuf>, options: LogOptions) -> Self {
        Self {
            storage,
            path: path.into(),
            options,
            lines: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            appended: AtomicU64::new(0),
            needs_rewrite: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn options(&self) -> LogOptions {
        self.options
    }

    /// Records appended since the last load or compaction
    pub fn appended_since_compaction(&self) -> u64 {
        self.appended.load(Ordering::SeqCst)
    }

    /// Whether the next write must rewrite the whole file
    pub fn needs_rewrite(&self) -> bool {
        self.needs_rewrite.load(Ordering::SeqCst)
    }

    /// Force the next write to be a full rewrite
    pub fn mark_needs_rewrite(&self) {
        self.needs_rewrite.store(true, Ordering::SeqCst);
    }

    /// Create the containing directory and recover from an interrupted rewrite
    pub async fn prepare(&self) -> Result<Integrity, PersistenceError> {
        self.storage.mkdirp(&parent_dir(&self.path)).await?;
        let integrity = self.storage.ensure_integrity(&self.path).await?;
        if integrity == Integrity::Promoted {
            tracing::warn!(path = %self.path.display(), "recovered datafile from interrupted rewrite");
        }
        Ok(integrity)
    }

    /// Read and parse the whole datafile
    pub async fn load(&self) -> Result<Loaded, PersistenceError> {
        let data = self.storage.read_file(&self.path).await?;

        let lines: Vec<(usize, &[u8])> = data
            .split(|b| *b == b'\n')
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim_ascii()))
            .filter(|(_, line)| !line.is_empty())
            .collect();

        let mut loaded = Loaded::default();
        loaded.report.bytes = data.len() as u64;
        loaded.report.unterminated = data.last().is_some_and(|b| *b != b'\n');

        let last = lines.len().saturating_sub(1);
        for (i, (line_no, line)) in lines.iter().enumerate() {
            match Record::from_bytes(line) {
                Ok(record) => loaded.records.push(record),
                Err(e) if i == last && self.options.corruption == CorruptionPolicy::Lenient => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = line_no,
                        error = %e,
                        "dropping malformed trailing line"
                    );
                    loaded.report.dropped_lines += 1;
                }
                Err(e) => {
                    return Err(PersistenceError::Corrupt {
                        path: self.path.clone(),
                        line: *line_no,
                        reason: e.to_string(),
                    });
                }
            }
        }
        loaded.report.records = loaded.records.len();

        self.lines.store(lines.len() as u64, Ordering::SeqCst);
        self.bytes.store(loaded.report.bytes, Ordering::SeqCst);
        self.appended.store(0, Ordering::SeqCst);
        self.needs_rewrite.store(
            loaded.report.dropped_lines > 0 || loaded.report.unterminated,
            Ordering::SeqCst,
        );

        tracing::debug!(
            path = %self.path.display(),
            records = loaded.report.records,
            dropped = loaded.report.dropped_lines,
            bytes = loaded.report.bytes,
            "datafile loaded"
        );
        Ok(loaded)
    }

    /// Append one record
    pub async fn append(&self, record: &Record) -> Result<(), PersistenceError> {
        self.append_all(std::slice::from_ref(record)).await
    }

    /// Append records in order with a single write
    pub async fn append_all(&self, records: &[Record]) -> Result<(), PersistenceError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buf = String::new();
        for record in records {
            buf.push_str(&record.to_line()?);
            buf.push('\n');
        }

        self.storage.append_file(&self.path, buf.as_bytes()).await?;
        if self.options.sync_appends {
            self.storage.flush(&self.path, false).await?;
        }

        let count = records.len() as u64;
        self.lines.fetch_add(count, Ordering::SeqCst);
        self.bytes.fetch_add(buf.len() as u64, Ordering::SeqCst);
        self.appended.fetch_add(count, Ordering::SeqCst);
        Ok(())
    }

    /// Replace the datafile with a snapshot of live state
    pub async fn compact(&self, snapshot: &Snapshot) -> Result<CompactionResult, PersistenceError> {
        self.storage
            .crash_safe_write(&self.path, snapshot.as_bytes())
            .await?;

        let written = snapshot.records();
        let bytes_written = snapshot.as_bytes().len() as u64;
        let old_lines = self.lines.swap(written, Ordering::SeqCst);
        let old_bytes = self.bytes.swap(bytes_written, Ordering::SeqCst);
        self.appended.store(0, Ordering::SeqCst);
        self.needs_rewrite.store(false, Ordering::SeqCst);

        let result = CompactionResult {
            records_removed: old_lines.saturating_sub(written),
            records_written: written,
            bytes_written,
            bytes_reclaimed: old_bytes.saturating_sub(bytes_written),
        };
        tracing::info!(
            path = %self.path.display(),
            records_written = result.records_written,
            records_removed = result.records_removed,
            bytes_reclaimed = result.bytes_reclaimed,
            "datafile compacted"
        );
        Ok(result)
    }

    /// Delete the datafile
    pub async fn destroy(&self) -> Result<(), PersistenceError> {
        self.storage.ensure_file_absent(&self.path).await?;
        self.storage
            .ensure_file_absent(&holt_adapters::temp_path(&self.path))
            .await?;
        self.lines.store(0, Ordering::SeqCst);
        self.bytes.store(0, Ordering::SeqCst);
        self.appended.store(0, Ordering::SeqCst);
        self.needs_rewrite.store(false, Ordering::SeqCst);
        tracing::info!(path = %self.path.display(), "datafile removed");
        Ok(())
    }
}

#[cfg(test)]
#[path = "persistence_tests.rs"]
mod tests;
