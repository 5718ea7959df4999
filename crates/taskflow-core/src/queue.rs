//! Job queue abstraction over the shared Redis list.
//!
//! The web application RPUSHes one serialized job per list entry; workers
//! consume with a blocking pop, so every entry is handed to exactly one
//! consumer even when several workers (or worker processes) share the list.
//! The trait exists so delivery logic can be tested against the in-memory
//! implementation without a Redis server.

use std::{future::Future, pin::Pin, time::Duration};

use redis::{aio::ConnectionManager, AsyncCommands};

use crate::error::Result;

/// Queue operations required by the delivery worker.
///
/// `dequeue` is one bounded blocking-pop window; callers loop it to get an
/// unbounded wait while keeping cancellation latency bounded by the window.
/// A `None` return means nothing arrived within the window and nothing was
/// consumed.
pub trait JobQueue: Send + Sync {
    /// Waits up to `wait` for the next entry and removes it from the queue.
    fn dequeue(
        &self,
        wait: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + '_>>;

    /// Appends an entry to the back of the queue.
    fn enqueue<'a>(
        &'a self,
        entry: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Production queue backed by a Redis list.
///
/// Each instance owns its own connection. A blocking pop parks the
/// connection it runs on, so every worker loop gets a dedicated `RedisQueue`
/// rather than sharing one multiplexed connection.
pub struct RedisQueue {
    conn: ConnectionManager,
    key: String,
}

impl RedisQueue {
    /// Connects to Redis and binds the queue to `key`.
    ///
    /// # Errors
    ///
    /// Returns a queue error if the URL is invalid or the initial connection
    /// fails.
    pub async fn connect(url: &str, key: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn, key: key.into() })
    }

    /// The Redis list key this queue reads and writes.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl JobQueue for RedisQueue {
    fn dequeue(
        &self,
        wait: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + '_>> {
        let mut conn = self.conn.clone();
        let key = self.key.clone();
        Box::pin(async move {
            // BLPOP returns (key, value) or nil on timeout.
            let reply: Option<(String, String)> =
                conn.blpop(&key, wait.as_secs_f64()).await?;
            Ok(reply.map(|(_, entry)| entry))
        })
    }

    fn enqueue<'a>(
        &'a self,
        entry: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        let mut conn = self.conn.clone();
        let key = self.key.clone();
        Box::pin(async move {
            let _len: i64 = conn.rpush(&key, entry).await?;
            Ok(())
        })
    }
}

pub mod mock {
    //! In-memory queue for testing delivery logic without Redis.

    use std::{collections::VecDeque, future::Future, pin::Pin, sync::Arc, time::Duration};

    use tokio::sync::{Mutex, Notify};

    use super::JobQueue;
    use crate::error::{CoreError, Result};

    /// In-memory FIFO with the same hand-each-entry-to-one-consumer
    /// semantics as the Redis list.
    ///
    /// Supports injecting one-shot failures to exercise the worker's
    /// queue-unavailable paths.
    #[derive(Clone, Default)]
    pub struct InMemoryQueue {
        inner: Arc<Mutex<VecDeque<String>>>,
        notify: Arc<Notify>,
        dequeue_error: Arc<Mutex<Option<String>>>,
        enqueue_error: Arc<Mutex<Option<String>>>,
    }

    impl InMemoryQueue {
        /// Creates an empty queue.
        pub fn new() -> Self {
            Self::default()
        }

        /// Pushes an entry without going through the trait, for test setup.
        pub async fn push(&self, entry: impl Into<String>) {
            self.inner.lock().await.push_back(entry.into());
            self.notify.notify_one();
        }

        /// Number of entries currently queued.
        pub async fn len(&self) -> usize {
            self.inner.lock().await.len()
        }

        /// Whether the queue is currently empty.
        pub async fn is_empty(&self) -> bool {
            self.inner.lock().await.is_empty()
        }

        /// Fails the next `dequeue` call with the given message.
        pub async fn inject_dequeue_error(&self, message: impl Into<String>) {
            *self.dequeue_error.lock().await = Some(message.into());
        }

        /// Fails the next `enqueue` call with the given message.
        pub async fn inject_enqueue_error(&self, message: impl Into<String>) {
            *self.enqueue_error.lock().await = Some(message.into());
        }
    }

    impl JobQueue for InMemoryQueue {
        fn dequeue(
            &self,
            wait: Duration,
        ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + '_>> {
            Box::pin(async move {
                if let Some(message) = self.dequeue_error.lock().await.take() {
                    return Err(CoreError::queue(message));
                }

                let deadline = tokio::time::Instant::now() + wait;
                loop {
                    if let Some(entry) = self.inner.lock().await.pop_front() {
                        return Ok(Some(entry));
                    }
                    let notified = self.notify.notified();
                    // Re-check: an entry may have landed between the pop and
                    // registering the waiter.
                    if let Some(entry) = self.inner.lock().await.pop_front() {
                        return Ok(Some(entry));
                    }
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return Ok(None);
                    }
                }
            })
        }

        fn enqueue<'a>(
            &'a self,
            entry: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
            Box::pin(async move {
                if let Some(message) = self.enqueue_error.lock().await.take() {
                    return Err(CoreError::queue(message));
                }
                self.inner.lock().await.push_back(entry.to_string());
                self.notify.notify_one();
                Ok(())
            })
        }
    }
}
