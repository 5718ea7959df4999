//! Subscription invalidation sink.
//!
//! When the push service answers 404/410 the subscription is gone for good;
//! the worker hands the endpoint to an [`InvalidationSink`] exactly once so
//! the web application stops producing jobs for it. Sink failures are logged
//! by the caller and never block queue draining.

use std::{future::Future, pin::Pin};

use redis::{aio::ConnectionManager, AsyncCommands};

use crate::error::{DeliveryError, Result};

/// Capability of retiring one confirmed-dead subscription.
pub trait InvalidationSink: Send + Sync {
    /// Records `endpoint` as dead.
    fn remove<'a>(
        &'a self,
        endpoint: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Production sink that records dead endpoints on a Redis list.
///
/// The web application reaps the list and deactivates the matching
/// subscription rows; the worker itself has no access to that store.
pub struct RedisInvalidationSink {
    conn: ConnectionManager,
    key: String,
}

impl RedisInvalidationSink {
    /// Connects to Redis and binds the sink to `key`.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Invalidation` if the URL is invalid or the
    /// initial connection fails.
    pub async fn connect(url: &str, key: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| DeliveryError::invalidation(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| DeliveryError::invalidation(e.to_string()))?;
        Ok(Self { conn, key: key.into() })
    }

    /// Wraps an existing connection, sharing it with other consumers.
    pub fn with_connection(conn: ConnectionManager, key: impl Into<String>) -> Self {
        Self { conn, key: key.into() }
    }
}

impl InvalidationSink for RedisInvalidationSink {
    fn remove<'a>(
        &'a self,
        endpoint: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        let mut conn = self.conn.clone();
        let key = self.key.clone();
        Box::pin(async move {
            let _len: i64 = conn
                .rpush(&key, endpoint)
                .await
                .map_err(|e| DeliveryError::invalidation(e.to_string()))?;
            Ok(())
        })
    }
}

pub mod mock {
    //! Recording sink for tests.

    use std::{future::Future, pin::Pin, sync::Mutex};

    use super::InvalidationSink;
    use crate::error::{DeliveryError, Result};

    /// Sink double that records removed endpoints in memory.
    #[derive(Default)]
    pub struct RecordingSink {
        removed: Mutex<Vec<String>>,
        fail_next: Mutex<Option<String>>,
    }

    impl RecordingSink {
        /// Creates an empty recording sink.
        pub fn new() -> Self {
            Self::default()
        }

        /// Endpoints removed so far, in call order.
        pub fn removed(&self) -> Vec<String> {
            self.removed.lock().expect("removed log poisoned").clone()
        }

        /// Fails the next `remove` call with the given message.
        pub fn fail_next(&self, message: impl Into<String>) {
            *self.fail_next.lock().expect("failure slot poisoned") = Some(message.into());
        }
    }

    impl InvalidationSink for RecordingSink {
        fn remove<'a>(
            &'a self,
            endpoint: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
            let injected = self.fail_next.lock().expect("failure slot poisoned").take();
            let result = match injected {
                Some(message) => Err(DeliveryError::invalidation(message)),
                None => {
                    self.removed
                        .lock()
                        .expect("removed log poisoned")
                        .push(endpoint.to_string());
                    Ok(())
                },
            };
            Box::pin(async move { result })
        }
    }
}
