//! Core domain models and infrastructure adapters for the push worker.
//!
//! Defines the push job wire format, the job queue abstraction with its Redis
//! and in-memory implementations, worker configuration, and the clock
//! abstraction used to make time-dependent behavior testable. The delivery
//! crate builds on these foundational types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod models;
pub mod queue;
pub mod time;

pub use config::{VapidSettings, WorkerConfig};
pub use error::{CoreError, Result};
pub use models::{NotificationPayload, PushJob, Subscription, SubscriptionKeys};
pub use queue::{JobQueue, RedisQueue};
pub use time::{Clock, SystemClock, TestClock};
