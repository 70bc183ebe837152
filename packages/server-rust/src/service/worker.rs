//! Background worker for fire-and-forget tasks.
//!
//! Provides a generic `BackgroundWorker<R>` that processes tasks from a bounded
//! mpsc channel via a `BackgroundRunnable` implementation, with optional
//! periodic tick callbacks. Stopping the worker drains tasks that were already
//! accepted before calling `shutdown`.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

// ---------------------------------------------------------------------------
// BackgroundRunnable trait
// ---------------------------------------------------------------------------

/// Trait for task handlers executed by `BackgroundWorker`.
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    /// The type of task this runnable processes.
    type Task: Send + 'static;

    /// Process a single task.
    async fn run(&mut self, task: Self::Task);

    /// Called on each tick interval. Default is a no-op.
    async fn on_tick(&mut self) {}

    /// Called once when the worker is shutting down. Default is a no-op.
    async fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// Submission errors
// ---------------------------------------------------------------------------

/// Reason a task was not accepted. Carries the task back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError<T> {
    #[error("worker queue is full")]
    Full(T),
    #[error("worker is not running")]
    Stopped(T),
}

impl<T> SubmitError<T> {
    /// The rejected task.
    pub fn into_task(self) -> T {
        match self {
            Self::Full(t) | Self::Stopped(t) => t,
        }
    }
}

/// Queue and tick settings of a worker.
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub queue_capacity: usize,
    /// `None` disables `on_tick`.
    pub tick_interval: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            tick_interval: None,
        }
    }
}

// ---------------------------------------------------------------------------
// BackgroundWorker
// ---------------------------------------------------------------------------

/// Generic background worker that processes tasks via a bounded mpsc channel.
///
/// The worker spawns a tokio task that:
/// 1. Listens for tasks on the channel and calls `BackgroundRunnable::run()`
/// 2. Calls `BackgroundRunnable::on_tick()` at the configured interval, if any
/// 3. On stop, runs every task still queued, then calls `shutdown()`
pub struct BackgroundWorker<R: BackgroundRunnable> {
    tx: Option<mpsc::Sender<R::Task>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl<R: BackgroundRunnable> BackgroundWorker<R> {
    /// Start the background worker with the given runnable.
    #[must_use]
    pub fn start(mut runnable: R, config: WorkerConfig) -> Self {
        let (tx, mut rx) = mpsc::channel::<R::Task>(config.queue_capacity.max(1));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = config.tick_interval.map(|every| {
                let mut interval = tokio::time::interval(every);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                interval
            });
            if let Some(ticker) = ticker.as_mut() {
                // Skip the first immediate tick so on_tick doesn't fire at startup.
                ticker.tick().await;
            }

            loop {
                tokio::select! {
                    task = rx.recv() => {
                        match task {
                            Some(t) => runnable.run(t).await,
                            None => break, // Channel closed.
                        }
                    }
                    () = next_tick(ticker.as_mut()) => {
                        runnable.on_tick().await;
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }

            rx.close();
            while let Some(t) = rx.recv().await {
                runnable.run(t).await;
            }
            runnable.shutdown().await;
        });

        Self {
            tx: Some(tx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// A handle that accepts nothing. Spawns no task.
    #[must_use]
    pub fn stopped() -> Self {
        Self {
            tx: None,
            shutdown_tx: None,
            handle: None,
        }
    }

    /// Submit a task without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Full`] if the queue is at capacity, or
    /// [`SubmitError::Stopped`] if the worker has been stopped.
    pub fn try_submit(&self, task: R::Task) -> Result<(), SubmitError<R::Task>> {
        match &self.tx {
            Some(tx) => tx.try_send(task).map_err(|e| match e {
                mpsc::error::TrySendError::Full(t) => SubmitError::Full(t),
                mpsc::error::TrySendError::Closed(t) => SubmitError::Stopped(t),
            }),
            None => Err(SubmitError::Stopped(task)),
        }
    }

    /// Stop the worker, waiting for queued tasks and `shutdown` to complete.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "background worker task failed");
            }
        }
    }
}

async fn next_tick(ticker: Option<&mut tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use tokio::sync::Semaphore;

    use super::*;

    #[derive(Default, Clone)]
    struct Counts {
        runs: Arc<AtomicU32>,
        ticks: Arc<AtomicU32>,
        shutdowns: Arc<AtomicU32>,
    }

    struct CountingRunnable {
        counts: Counts,
        /// When set, each run waits for a permit.
        gate: Option<Arc<Semaphore>>,
    }

    #[async_trait]
    impl BackgroundRunnable for CountingRunnable {
        type Task = String;

        async fn run(&mut self, _task: String) {
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            self.counts.runs.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_tick(&mut self) {
            self.counts.ticks.fetch_add(1, Ordering::SeqCst);
        }

        async fn shutdown(&mut self) {
            self.counts.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn runnable(counts: &Counts) -> CountingRunnable {
        CountingRunnable {
            counts: counts.clone(),
            gate: None,
        }
    }

    #[tokio::test]
    async fn stop_drains_accepted_tasks() {
        let counts = Counts::default();
        let mut worker = BackgroundWorker::start(runnable(&counts), WorkerConfig::default());

        for i in 0..3 {
            worker.try_submit(format!("task-{i}")).unwrap();
        }
        worker.stop().await;

        assert_eq!(counts.runs.load(Ordering::SeqCst), 3);
        assert_eq!(counts.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_fires_periodically() {
        let counts = Counts::default();
        let config = WorkerConfig {
            queue_capacity: 4,
            tick_interval: Some(Duration::from_millis(20)),
        };
        let mut worker = BackgroundWorker::start(runnable(&counts), config);

        tokio::time::sleep(Duration::from_millis(100)).await;
        worker.stop().await;

        assert!(counts.ticks.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn try_submit_reports_full_queue() {
        let counts = Counts::default();
        let gate = Arc::new(Semaphore::new(0));
        let worker = BackgroundWorker::start(
            CountingRunnable {
                counts: counts.clone(),
                gate: Some(Arc::clone(&gate)),
            },
            WorkerConfig {
                queue_capacity: 1,
                tick_interval: None,
            },
        );

        // The worker may already hold the first task; keep pushing until the
        // single queue slot is taken.
        let mut rejected = None;
        for i in 0..3 {
            if let Err(e) = worker.try_submit(format!("task-{i}")) {
                rejected = Some(e);
                break;
            }
        }
        let err = rejected.expect("queue of one should fill");
        assert!(matches!(err, SubmitError::Full(_)));
        assert!(err.into_task().starts_with("task-"));
        gate.add_permits(10);
    }

    #[tokio::test]
    async fn try_submit_after_stop_returns_error() {
        let counts = Counts::default();
        let mut worker = BackgroundWorker::start(runnable(&counts), WorkerConfig::default());
        worker.stop().await;

        assert!(matches!(
            worker.try_submit("late".to_string()),
            Err(SubmitError::Stopped(_))
        ));
    }
}
