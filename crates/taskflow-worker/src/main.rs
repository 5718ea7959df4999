//! TaskFlow push worker.
//!
//! Standalone queue consumer that delivers browser push notifications for
//! the TaskFlow web application. Initializes configuration, connects to the
//! queue, spawns the delivery workers, and coordinates graceful shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use taskflow_core::{JobQueue, RedisQueue, SystemClock, WorkerConfig};
use taskflow_delivery::{DeliveryMode, PushEngine, RedisInvalidationSink};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = WorkerConfig::from_env()?;
    info!(
        redis_url = %config.redis_url,
        queue_key = %config.queue_key,
        concurrency = config.concurrency,
        max_attempts = config.max_attempts,
        "starting taskflow push worker"
    );

    let clock = Arc::new(SystemClock::new());
    let mode = DeliveryMode::from_config(&config, clock.clone())
        .context("signing credentials are present but invalid")?;
    if mode.is_dry_run() {
        warn!(
            "VAPID keys are not configured; consuming jobs in dry-run mode, \
             no notifications will be delivered"
        );
    }

    let sink = Arc::new(
        connect_sink(&config).await.context("failed to connect invalidation sink")?,
    );

    // One queue connection per worker: a blocking pop parks the connection
    // it runs on.
    let mut queues: Vec<Arc<dyn JobQueue>> = Vec::with_capacity(config.concurrency);
    for _ in 0..config.concurrency {
        let queue = connect_queue(&config).await.context("failed to connect job queue")?;
        queues.push(Arc::new(queue));
    }

    let mut engine = PushEngine::new((&config).into(), mode, sink, clock);
    engine.start(queues).await;
    info!("push worker is consuming the queue");

    shutdown_signal().await;
    info!("shutdown signal received, draining in-flight deliveries");

    if let Err(e) = engine.shutdown().await {
        error!(error = %e, "shutdown did not complete cleanly");
    }

    info!("push worker stopped");
    Ok(())
}

/// Initializes tracing with environment-based filtering.
fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,taskflow=debug"))
        .expect("invalid RUST_LOG environment variable");

    tracing_subscriber::registry().with(filter).with(fmt::layer().with_target(true)).init();
}

/// Connects the job queue, retrying while Redis comes up.
async fn connect_queue(config: &WorkerConfig) -> anyhow::Result<RedisQueue> {
    with_connect_retries(config, || {
        RedisQueue::connect(&config.redis_url, &config.queue_key)
    })
    .await
}

/// Connects the invalidation sink, retrying while Redis comes up.
async fn connect_sink(config: &WorkerConfig) -> anyhow::Result<RedisInvalidationSink> {
    with_connect_retries(config, || {
        RedisInvalidationSink::connect(&config.redis_url, &config.invalidation_key)
    })
    .await
}

/// Runs a connect attempt with a bounded retry loop.
///
/// The worker usually starts alongside Redis in the same deployment, so the
/// first attempts may race the server becoming ready.
async fn with_connect_retries<T, E, F, Fut>(
    config: &WorkerConfig,
    mut connect: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    let mut retries = 0;
    loop {
        match connect().await {
            Ok(value) => return Ok(value),
            Err(_) if retries < MAX_RETRIES => {
                retries += 1;
                info!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    redis_url = %config.redis_url,
                    "redis connection failed, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("failed to connect to redis after retries");
            },
        }
    }
}

/// Waits for a shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received CTRL+C signal");
        },
        _ = terminate => {
            info!("received SIGTERM signal");
        },
    }
}
