//! Queue consumption loop and delivery policy.
//!
//! Each worker runs one sequential loop: pop a job, parse it, apply the
//! dry-run guard, deliver, classify, then act — acknowledge, retry with
//! backoff, retire the subscription, or drop. Job-level failures never
//! escape the loop; everything is observable through logs and counters.

use std::{sync::Arc, time::Duration};

use taskflow_core::{Clock, JobQueue, PushJob, WorkerConfig};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    classify::{classify, Outcome},
    error::Result,
    invalidation::InvalidationSink,
    retry::{RetryDecision, RetryPolicy},
    transport::{ClientConfig, Transport, WebPushClient},
    vapid::VapidKeys,
};

/// Configuration for the delivery workers.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,

    /// Length of one blocking-pop window on the queue.
    pub dequeue_wait: Duration,

    /// Fixed pause after a failed dequeue, to avoid a tight error loop.
    pub queue_retry_interval: Duration,

    /// Maximum time to wait for in-flight deliveries on shutdown.
    pub drain_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            dequeue_wait: Duration::from_secs(5),
            queue_retry_interval: Duration::from_secs(2),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&WorkerConfig> for DeliveryConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            retry: RetryPolicy {
                max_attempts: config.max_attempts,
                base_delay: config.retry_base,
                max_delay: config.retry_cap,
            },
            dequeue_wait: config.dequeue_wait,
            queue_retry_interval: Duration::from_secs(2),
            drain_timeout: config.drain_timeout,
        }
    }
}

/// Counters for monitoring the worker pool.
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    /// Number of running worker loops.
    pub active_workers: usize,
    /// Queue entries taken off the queue.
    pub processed: u64,
    /// Jobs the push service accepted.
    pub delivered: u64,
    /// Jobs re-enqueued after a transient failure.
    pub retried: u64,
    /// Subscriptions handed to the invalidation sink.
    pub invalidated: u64,
    /// Jobs acknowledged in dry-run mode without delivery.
    pub dry_run: u64,
    /// Entries discarded because they did not parse.
    pub dropped_malformed: u64,
    /// Jobs dropped after exhausting retries.
    pub dropped_exhausted: u64,
    /// Jobs dropped because the request itself was invalid.
    pub dropped_config: u64,
    /// Jobs currently being delivered.
    pub in_flight: u64,
}

/// Operating mode, fixed for the process lifetime.
///
/// Decided once at startup from the presence of signing credentials. In
/// dry-run mode the transport client is never constructed, so no job can
/// reach it; the queue keeps draining instead of growing unbounded on a
/// mis-configured deployment.
#[derive(Clone)]
pub enum DeliveryMode {
    /// Credentials present: deliver through the transport.
    Configured(Arc<dyn Transport>),
    /// Credentials absent: log and acknowledge every job.
    DryRun,
}

impl DeliveryMode {
    /// Builds the mode from configuration, constructing the production
    /// transport when signing credentials are present.
    ///
    /// # Errors
    ///
    /// Returns an error when credentials are present but invalid: a worker
    /// that could never deliver anything should fail at startup, not drop
    /// every job one by one.
    pub fn from_config(config: &WorkerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        match config.vapid() {
            Some(settings) => {
                let keys = VapidKeys::parse(&settings)?;
                let client_config = ClientConfig {
                    timeout: config.http_timeout,
                    ttl: config.ttl,
                    ..ClientConfig::default()
                };
                let client = WebPushClient::new(client_config, keys, clock)?;
                Ok(Self::Configured(Arc::new(client)))
            },
            None => Ok(Self::DryRun),
        }
    }

    /// Whether jobs are acknowledged without real delivery.
    pub fn is_dry_run(&self) -> bool {
        matches!(self, Self::DryRun)
    }
}

/// One delivery worker running the sequential consumption loop.
pub struct PushWorker {
    id: usize,
    queue: Arc<dyn JobQueue>,
    mode: DeliveryMode,
    sink: Arc<dyn InvalidationSink>,
    config: DeliveryConfig,
    stats: Arc<RwLock<WorkerStats>>,
    cancellation_token: CancellationToken,
    clock: Arc<dyn Clock>,
}

impl PushWorker {
    /// Creates a worker bound to its own queue connection.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        queue: Arc<dyn JobQueue>,
        mode: DeliveryMode,
        sink: Arc<dyn InvalidationSink>,
        config: DeliveryConfig,
        stats: Arc<RwLock<WorkerStats>>,
        cancellation_token: CancellationToken,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { id, queue, mode, sink, config, stats, cancellation_token, clock }
    }

    /// Main loop: consumes jobs until cancellation.
    ///
    /// Never returns on the success path. A dequeue window that elapses
    /// empty simply re-issues the pop, so the wait is unbounded overall
    /// while cancellation latency stays bounded by the window.
    pub async fn run(&self) {
        info!(worker_id = self.id, "delivery worker starting");

        loop {
            if self.cancellation_token.is_cancelled() {
                break;
            }

            match self.queue.dequeue(self.config.dequeue_wait).await {
                Ok(Some(entry)) => self.process_entry(entry).await,
                Ok(None) => {},
                Err(error) => {
                    // Nothing was consumed, so nothing can be lost; pause
                    // before retrying to avoid hammering a dead queue.
                    error!(worker_id = self.id, error = %error, "queue dequeue failed");
                    tokio::select! {
                        () = self.clock.sleep(self.config.queue_retry_interval) => {},
                        () = self.cancellation_token.cancelled() => {},
                    }
                },
            }
        }

        info!(worker_id = self.id, "delivery worker stopped");
    }

    /// Handles one raw queue entry.
    async fn process_entry(&self, entry: String) {
        {
            let mut stats = self.stats.write().await;
            stats.processed += 1;
            stats.in_flight += 1;
        }

        match PushJob::from_queue_entry(&entry) {
            Ok(job) => self.deliver(job).await,
            Err(error) => {
                // A job that does not parse today will not parse tomorrow.
                error!(
                    worker_id = self.id,
                    error = %error,
                    payload = %entry,
                    "discarding malformed job"
                );
                self.stats.write().await.dropped_malformed += 1;
            },
        }

        self.stats.write().await.in_flight -= 1;
    }

    /// Delivers one parsed job and applies outcome policy.
    async fn deliver(&self, job: PushJob) {
        let job_id = Uuid::new_v4();
        let endpoint = job.subscription.endpoint.clone();

        let transport = match &self.mode {
            DeliveryMode::DryRun => {
                let payload = serde_json::to_string(&job.payload)
                    .unwrap_or_else(|_| "{}".to_string());
                info!(
                    worker_id = self.id,
                    job_id = %job_id,
                    endpoint = %endpoint,
                    payload = %payload,
                    "dry-run: would send push notification"
                );
                self.stats.write().await.dry_run += 1;
                return;
            },
            DeliveryMode::Configured(transport) => transport,
        };

        let result = transport.send(&job).await;

        match classify(&result) {
            Outcome::Success { status } => {
                self.stats.write().await.delivered += 1;
                info!(
                    worker_id = self.id,
                    job_id = %job_id,
                    endpoint = %endpoint,
                    status,
                    "push notification sent"
                );
            },
            Outcome::Transient { reason } => self.handle_transient(job, job_id, &reason).await,
            Outcome::Permanent { status } => {
                self.stats.write().await.invalidated += 1;
                warn!(
                    worker_id = self.id,
                    job_id = %job_id,
                    endpoint = %endpoint,
                    status,
                    "subscription gone, retiring it"
                );
                if let Err(error) = self.sink.remove(&endpoint).await {
                    warn!(
                        worker_id = self.id,
                        endpoint = %endpoint,
                        error = %error,
                        "failed to record dead subscription"
                    );
                }
            },
            Outcome::Config { reason } => {
                self.stats.write().await.dropped_config += 1;
                error!(
                    worker_id = self.id,
                    job_id = %job_id,
                    endpoint = %endpoint,
                    reason = %reason,
                    "dropping undeliverable job"
                );
            },
        }
    }

    /// Applies retry policy after a transient failure.
    async fn handle_transient(&self, mut job: PushJob, job_id: Uuid, reason: &str) {
        let endpoint = job.subscription.endpoint.clone();

        match self.config.retry.decide(job.attempt_count) {
            RetryDecision::GiveUp { reason: verdict } => {
                self.stats.write().await.dropped_exhausted += 1;
                error!(
                    worker_id = self.id,
                    job_id = %job_id,
                    endpoint = %endpoint,
                    attempts = job.attempt_count,
                    last_error = %reason,
                    verdict = %verdict,
                    "retries exhausted, dropping job"
                );
            },
            RetryDecision::Retry { delay } => {
                job.attempt_count += 1;
                warn!(
                    worker_id = self.id,
                    job_id = %job_id,
                    endpoint = %endpoint,
                    attempt = job.attempt_count,
                    delay_secs = delay.as_secs(),
                    error = %reason,
                    "transient delivery failure, retrying after backoff"
                );

                // On shutdown the sleep is abandoned and the job re-enqueued
                // immediately so it is not lost.
                tokio::select! {
                    () = self.clock.sleep(delay) => {},
                    () = self.cancellation_token.cancelled() => {},
                }

                self.requeue(job).await;
            },
        }
    }

    /// Puts a job back on the queue for another attempt.
    async fn requeue(&self, job: PushJob) {
        let entry = match job.to_queue_entry() {
            Ok(entry) => entry,
            Err(error) => {
                error!(worker_id = self.id, error = %error, "failed to serialize job for retry");
                return;
            },
        };

        match self.queue.enqueue(&entry).await {
            Ok(()) => self.stats.write().await.retried += 1,
            Err(error) => {
                // The job was already consumed; the verbatim payload in the
                // log is the only remaining copy.
                error!(
                    worker_id = self.id,
                    error = %error,
                    job = %entry,
                    "failed to re-enqueue job, payload logged for manual recovery"
                );
            },
        }
    }
}
