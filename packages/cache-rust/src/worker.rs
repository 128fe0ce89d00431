//! Dedicated single-consumer background worker.
//!
//! Provides a generic `BackgroundWorker<R>` that drains a FIFO channel one
//! task at a time through a `BackgroundRunnable` implementation. Tasks never
//! run concurrently with each other, which is what gives the page-fetch and
//! id-scan workers their ordering guarantees.

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::error::CacheError;

// ---------------------------------------------------------------------------
// BackgroundRunnable trait
// ---------------------------------------------------------------------------

/// Trait for task handlers executed by `BackgroundWorker`.
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    /// The type of task this runnable processes.
    type Task: Send + 'static;

    /// Process a single task. The next task is not started until this returns.
    async fn run(&mut self, task: Self::Task);

    /// Called once when the worker is shutting down. Default is a no-op.
    async fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// BackgroundWorker
// ---------------------------------------------------------------------------

/// Single-task background worker fed by an unbounded FIFO channel.
///
/// The worker spawns one tokio task that:
/// 1. Receives tasks in submission order
/// 2. Awaits `BackgroundRunnable::run()` for each, strictly sequentially
/// 3. Calls `BackgroundRunnable::shutdown()` when stopped or when every
///    handle has been dropped
///
/// `submit` is synchronous and never blocks, so it is safe to call from a UI
/// thread that is not part of the tokio runtime.
pub struct BackgroundWorker<R: BackgroundRunnable> {
    name: &'static str,
    tx: Option<mpsc::UnboundedSender<R::Task>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl<R: BackgroundRunnable> BackgroundWorker<R> {
    /// Start the worker on the runtime of the calling context.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime; use [`Self::start_on`]
    /// from plain threads.
    pub fn start(name: &'static str, runnable: R) -> Self {
        Self::start_on(&Handle::current(), name, runnable)
    }

    /// Start the worker on an explicit runtime handle.
    pub fn start_on(runtime: &Handle, name: &'static str, mut runnable: R) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<R::Task>();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = runtime.spawn(async move {
            info!(worker = name, "background worker started");

            loop {
                tokio::select! {
                    // A shutdown request wins over queued tasks.
                    biased;
                    _ = &mut shutdown_rx => {
                        break;
                    }
                    task = rx.recv() => {
                        match task {
                            Some(t) => runnable.run(t).await,
                            None => break, // Every sender dropped.
                        }
                    }
                }
            }

            runnable.shutdown().await;
            info!(worker = name, "background worker stopped");
        });

        Self {
            name,
            tx: Some(tx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueue a task behind every task submitted before it.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::WorkerStopped`] if the worker has been stopped.
    pub fn submit(&self, task: R::Task) -> Result<(), CacheError> {
        let stopped = CacheError::WorkerStopped { worker: self.name };
        match &self.tx {
            Some(tx) => tx.send(task).map_err(|_| stopped),
            None => Err(stopped),
        }
    }

    /// Stop the worker, waiting for the task currently running to finish.
    ///
    /// Tasks still queued behind it are dropped.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                debug!(worker = self.name, error = %err, "background worker join failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
