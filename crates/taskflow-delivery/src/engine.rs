//! Worker pool lifecycle.
//!
//! Spawns a bounded number of delivery workers, owns the shared cancellation
//! token, and implements graceful shutdown: cancel, then wait for in-flight
//! deliveries up to a drain timeout.

use std::sync::Arc;

use taskflow_core::{Clock, JobQueue};
use tokio::{sync::RwLock, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    error::{DeliveryError, Result},
    invalidation::InvalidationSink,
    worker::{DeliveryConfig, DeliveryMode, PushWorker, WorkerStats},
};

/// Coordinates the delivery worker pool.
pub struct PushEngine {
    config: DeliveryConfig,
    mode: DeliveryMode,
    sink: Arc<dyn InvalidationSink>,
    clock: Arc<dyn Clock>,
    stats: Arc<RwLock<WorkerStats>>,
    cancellation_token: CancellationToken,
    worker_handles: Vec<JoinHandle<()>>,
}

impl PushEngine {
    /// Creates an engine; no workers run until [`start`](Self::start).
    pub fn new(
        config: DeliveryConfig,
        mode: DeliveryMode,
        sink: Arc<dyn InvalidationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            mode,
            sink,
            clock,
            stats: Arc::new(RwLock::new(WorkerStats::default())),
            cancellation_token: CancellationToken::new(),
            worker_handles: Vec::new(),
        }
    }

    /// Spawns one worker per queue handle and returns immediately.
    ///
    /// Each worker gets its own queue because a blocking pop parks the
    /// connection it runs on; the pool size is therefore `queues.len()`.
    pub async fn start(&mut self, queues: Vec<Arc<dyn JobQueue>>) {
        info!(
            worker_count = queues.len(),
            dry_run = self.mode.is_dry_run(),
            "starting push delivery workers"
        );

        self.stats.write().await.active_workers = queues.len();

        for (worker_id, queue) in queues.into_iter().enumerate() {
            let worker = PushWorker::new(
                worker_id,
                queue,
                self.mode.clone(),
                self.sink.clone(),
                self.config.clone(),
                self.stats.clone(),
                self.cancellation_token.clone(),
                self.clock.clone(),
            );

            self.worker_handles.push(tokio::spawn(async move { worker.run().await }));
        }
    }

    /// Gracefully shuts down the pool.
    ///
    /// Signals cancellation, then waits for every worker to finish its
    /// current delivery, bounded by the configured drain timeout.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ShutdownTimeout` if workers do not drain in
    /// time; the process should exit regardless.
    pub async fn shutdown(mut self) -> Result<()> {
        let timeout = self.config.drain_timeout;
        info!(
            worker_count = self.worker_handles.len(),
            timeout_secs = timeout.as_secs(),
            "shutting down push delivery workers"
        );

        self.cancellation_token.cancel();

        let handles = std::mem::take(&mut self.worker_handles);
        let stats = self.stats.clone();
        let drain = async move {
            for (worker_id, handle) in handles.into_iter().enumerate() {
                if let Err(join_error) = handle.await {
                    error!(
                        worker_id,
                        error = %join_error,
                        "worker task panicked during shutdown"
                    );
                }
            }
            stats.write().await.active_workers = 0;
        };

        match tokio::time::timeout(timeout, drain).await {
            Ok(()) => {
                info!("push delivery workers stopped");
                Ok(())
            },
            Err(_) => {
                error!(
                    timeout_secs = timeout.as_secs(),
                    "worker shutdown timed out, some deliveries may be unfinished"
                );
                Err(DeliveryError::ShutdownTimeout { timeout })
            },
        }
    }

    /// Snapshot of the pool counters.
    pub async fn stats(&self) -> WorkerStats {
        self.stats.read().await.clone()
    }

    /// Whether any worker task is still running.
    pub fn has_active_workers(&self) -> bool {
        self.worker_handles.iter().any(|handle| !handle.is_finished())
    }

    /// Token shared by all workers, for wiring into external shutdown
    /// signals.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }
}

impl Drop for PushEngine {
    fn drop(&mut self) {
        let active = self.worker_handles.iter().filter(|handle| !handle.is_finished()).count();
        if active > 0 && !self.cancellation_token.is_cancelled() {
            self.cancellation_token.cancel();
            warn!(
                active_workers = active,
                "engine dropped without shutdown, cancelling workers"
            );
        }
    }
}
