//! Push notification delivery engine.
//!
//! Consumes push jobs from the shared queue and delivers them to browser
//! push services with bounded retry, dead-subscription retirement, and a
//! dry-run mode for deployments without signing credentials.
//!
//! # Architecture
//!
//! A pool of workers each runs one sequential consumption loop. Every job
//! goes through the same pipeline:
//!
//! 1. **Pop** - blocking dequeue from the shared Redis list
//! 2. **Parse** - malformed entries are logged and discarded
//! 3. **Guard** - dry-run mode acknowledges without delivering
//! 4. **Send** - HTTP POST to the subscription endpoint
//! 5. **Classify** - map the raw result onto success / transient /
//!    permanent / config
//! 6. **Act** - acknowledge, retry with exponential backoff, retire the
//!    subscription, or drop
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use taskflow_core::{JobQueue, RedisQueue, SystemClock, WorkerConfig};
//! use taskflow_delivery::{
//!     DeliveryMode, PushEngine, RedisInvalidationSink,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WorkerConfig::from_env()?;
//! let clock = Arc::new(SystemClock::new());
//! let mode = DeliveryMode::from_config(&config, clock.clone())?;
//! let sink = Arc::new(
//!     RedisInvalidationSink::connect(&config.redis_url, &config.invalidation_key).await?,
//! );
//!
//! let mut engine = PushEngine::new((&config).into(), mode, sink, clock);
//! let queue: Arc<dyn JobQueue> =
//!     Arc::new(RedisQueue::connect(&config.redis_url, &config.queue_key).await?);
//! engine.start(vec![queue]).await;
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod engine;
pub mod error;
pub mod invalidation;
pub mod retry;
pub mod transport;
pub mod vapid;
pub mod worker;

pub use classify::{classify, Outcome};
pub use engine::PushEngine;
pub use error::{DeliveryError, Result};
pub use invalidation::{InvalidationSink, RedisInvalidationSink};
pub use retry::{RetryDecision, RetryPolicy};
pub use transport::{ClientConfig, Transport, TransportResponse, WebPushClient};
pub use vapid::VapidKeys;
pub use worker::{DeliveryConfig, DeliveryMode, PushWorker, WorkerStats};
