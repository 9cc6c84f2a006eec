// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Background task queue for fire-and-forget work.
//!
//! Post-login side effects (dashboard refresh, telemetry, achievements) run
//! here, off the critical state transition. Each task is isolated: an error
//! or panic is logged with the task name and goes no further.

use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

use crate::error::Result;

const MAX_CONCURRENT_TASKS: usize = 8;

/// Handle to the queue; clones share the same accounting.
#[derive(Clone)]
pub struct BackgroundTasks {
    inner: Arc<Inner>,
}

struct Inner {
    permits: Semaphore,
    pending: AtomicUsize,
    failed: AtomicUsize,
    idle: Notify,
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                permits: Semaphore::new(MAX_CONCURRENT_TASKS),
                pending: AtomicUsize::new(0),
                failed: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Queue a task. Must be called from within a Tokio runtime.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let task: BoxFuture<'static, Result<()>> = Box::pin(task);
        let inner = self.inner.clone();
        inner.pending.fetch_add(1, Ordering::AcqRel);

        tokio::spawn(async move {
            let outcome = {
                let _permit = inner.permits.acquire().await;
                // Run in its own task so a panic is contained and observable.
                tokio::spawn(task).await
            };

            match outcome {
                Ok(Ok(())) => tracing::debug!(task = name, "Background task finished"),
                Ok(Err(e)) => {
                    inner.failed.fetch_add(1, Ordering::AcqRel);
                    tracing::warn!(task = name, error = %e, "Background task failed");
                }
                Err(join_err) => {
                    inner.failed.fetch_add(1, Ordering::AcqRel);
                    tracing::error!(task = name, error = %join_err, "Background task panicked");
                }
            }

            if inner.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                inner.idle.notify_waiters();
            }
        });
    }

    /// Tasks queued or running.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Tasks that ended in an error or panic since creation.
    pub fn failed(&self) -> usize {
        self.inner.failed.load(Ordering::Acquire)
    }

    /// Wait until every queued task has finished.
    pub async fn flush(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}
