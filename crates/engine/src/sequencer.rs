// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-writer operation queue
//!
//! Jobs run one at a time on a dedicated task, in submission order. A job's
//! result is delivered to its caller before the next job starts. Dropping
//! the caller's future after submission does not cancel the job. A job that
//! panics fails its own caller and the queue moves on.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinError;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Job = Box<dyn FnOnce() -> BoxFuture + Send>;

/// Why a job produced no output
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencerError {
    #[error("sequencer is closed")]
    Closed,
    #[error("job panicked: {0}")]
    Panicked(String),
}

/// FIFO queue with exactly one job in flight
pub struct Sequencer {
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
}

impl Sequencer {
    /// Spawn the worker task on the current runtime
    pub fn start() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job().await;
            }
            tracing::debug!("sequencer stopped");
        });
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    /// Queue `f` and wait for its output
    pub async fn run<F, Fut, T>(&self, f: F) -> Result<T, SequencerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move || -> BoxFuture {
            Box::pin(async move {
                // Run on its own task so a panic cannot take the worker down
                let out = tokio::spawn(async move { f().await })
                    .await
                    .map_err(join_failure);
                // The caller may have gone away; the job still counts as done
                let _ = reply_tx.send(out);
            })
        });

        self.sender()
            .ok_or(SequencerError::Closed)?
            .send(job)
            .map_err(|_| SequencerError::Closed)?;
        reply_rx.await.map_err(|_| SequencerError::Closed)?
    }

    /// Stop accepting jobs; jobs already queued still run
    pub fn close(&self) {
        self.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().as_ref().is_none_or(|tx| tx.is_closed())
    }

    fn sender(&self) -> Option<mpsc::UnboundedSender<Job>> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<Job>>> {
        self.tx.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn join_failure(err: JoinError) -> SequencerError {
    if !err.is_panic() {
        return SequencerError::Closed;
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    tracing::error!(%message, "sequenced job panicked");
    SequencerError::Panicked(message)
}

#[cfg(test)]
#[path = "sequencer_tests.rs"]
mod tests;
