//! Tracking of in-flight units of work.
//!
//! # Responsibilities
//! - Spawn work onto the runtime without blocking the caller
//! - Count outstanding work so shutdown can wait for it
//!
//! # Design Decisions
//! - Registration happens before the task starts; deregistration is a drop
//!   guard owned by the task, so it also runs when the work panics
//! - `wait` arms a `Notify` before reading the count, so the final decrement
//!   can never slip between the check and the sleep

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct Inner {
    outstanding: AtomicUsize,
    drained: Notify,
}

/// A group of independently running tasks that can be waited on as a whole.
///
/// Cloning yields another handle to the same group.
#[derive(Debug, Clone, Default)]
pub struct TaskGroup {
    inner: Arc<Inner>,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` concurrently as a member of this group.
    ///
    /// The work is counted as outstanding before this returns.
    pub fn spawn<F>(&self, work: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.register();
        tokio::spawn(async move {
            let _guard = guard;
            work.await;
        })
    }

    /// Number of spawned tasks that have not finished yet.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    /// Wait until every spawned task has finished.
    ///
    /// Spawning after `wait` has started is a caller bug: the new task may or
    /// may not be waited for.
    pub async fn wait(&self) {
        loop {
            let drained = self.inner.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();

            if self.outstanding() == 0 {
                return;
            }
            drained.await;
        }
    }

    fn register(&self) -> TaskGuard {
        self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
        TaskGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Decrements the outstanding count when dropped.
#[derive(Debug)]
struct TaskGuard {
    inner: Arc<Inner>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if self.inner.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.drained.notify_waiters();
        }
    }
}
