//! Push transport client.
//!
//! The worker only depends on the [`Transport`] trait: one payload, one
//! subscription, one raw HTTP result. The production [`WebPushClient`] POSTs
//! the serialized payload to the subscription endpoint with a `TTL` header
//! and a VAPID `Authorization` header; everything beyond that (message
//! storage, fan-out to the device) is the push service's business.

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use taskflow_core::{Clock, PushJob};
use tracing::{debug, info_span, warn, Instrument};

use crate::{
    error::{DeliveryError, Result},
    vapid::VapidKeys,
};

/// Response body bytes kept for diagnostics.
const MAX_BODY_BYTES: usize = 1024;

/// Raw result of one delivery attempt that reached the push service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status returned by the push service.
    pub status: u16,
    /// Response body, truncated to [`MAX_BODY_BYTES`].
    pub body: String,
}

/// Capability of delivering one job to one subscription.
pub trait Transport: Send + Sync {
    /// Attempts delivery and returns the raw result.
    ///
    /// An `Ok` carries whatever status the push service answered with,
    /// including rejections; `Err` means no status was obtained at all.
    fn send<'a>(
        &'a self,
        job: &'a PushJob,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse>> + Send + 'a>>;
}

/// Configuration for the push HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout for one delivery attempt.
    pub timeout: Duration,
    /// How long the push service may hold an undelivered message.
    pub ttl: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            ttl: Duration::from_secs(1800),
            user_agent: "TaskFlow-Push-Worker/1.0".to_string(),
        }
    }
}

/// Production transport built on a pooled `reqwest` client.
pub struct WebPushClient {
    client: reqwest::Client,
    config: ClientConfig,
    keys: VapidKeys,
    clock: Arc<dyn Clock>,
}

impl WebPushClient {
    /// Creates a transport client with validated signing credentials.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the HTTP client cannot be
    /// built with the given settings.
    pub fn new(config: ClientConfig, keys: VapidKeys, clock: Arc<dyn Clock>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config, keys, clock })
    }
}

impl Transport for WebPushClient {
    fn send<'a>(
        &'a self,
        job: &'a PushJob,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse>> + Send + 'a>> {
        let span = info_span!(
            "push_send",
            endpoint = %job.subscription.endpoint,
            attempt = job.attempt_count
        );

        Box::pin(
            async move {
                let endpoint = &job.subscription.endpoint;
                let authorization =
                    self.keys.authorization(endpoint, self.clock.now_system())?;
                let body = serde_json::to_string(&job.payload).map_err(|e| {
                    DeliveryError::configuration(format!("payload not serializable: {e}"))
                })?;

                let started = self.clock.now();
                let response = self
                    .client
                    .post(endpoint)
                    .header("TTL", self.config.ttl.as_secs())
                    .header("Content-Type", "application/json")
                    .header("Authorization", authorization)
                    .body(body)
                    .send()
                    .await
                    .map_err(|e| {
                        if e.is_timeout() {
                            DeliveryError::timeout(self.config.timeout.as_secs())
                        } else if e.is_connect() {
                            DeliveryError::network(format!("connection failed: {e}"))
                        } else {
                            DeliveryError::network(e.to_string())
                        }
                    })?;

                let status = response.status().as_u16();
                let body = read_body(response).await;
                debug!(
                    status,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "push service answered"
                );

                Ok(TransportResponse { status, body })
            }
            .instrument(span),
        )
    }
}

/// Reads the response body, keeping at most [`MAX_BODY_BYTES`] for logs.
async fn read_body(response: reqwest::Response) -> String {
    match response.bytes().await {
        Ok(bytes) if bytes.len() > MAX_BODY_BYTES => {
            let truncated = String::from_utf8_lossy(&bytes[..MAX_BODY_BYTES]);
            format!("{truncated}... (truncated)")
        },
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!(error = %e, "failed to read push service response body");
            String::new()
        },
    }
}

pub mod mock {
    //! Scripted transport for testing worker policy without a push service.

    use std::{
        collections::VecDeque,
        future::Future,
        pin::Pin,
        sync::Mutex,
    };

    use taskflow_core::PushJob;

    use super::{Transport, TransportResponse};
    use crate::error::{DeliveryError, Result};

    /// Transport double that answers from a script and records every send.
    ///
    /// Scripted responses are consumed in order; once the script is empty the
    /// fallback answers (HTTP 201 unless overridden).
    pub struct MockTransport {
        script: Mutex<VecDeque<Result<TransportResponse>>>,
        fallback: Mutex<Result<TransportResponse>>,
        sent: Mutex<Vec<PushJob>>,
    }

    impl MockTransport {
        /// Creates a transport that accepts everything with HTTP 201.
        pub fn new() -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(Ok(TransportResponse { status: 201, body: String::new() })),
                sent: Mutex::new(Vec::new()),
            }
        }

        /// Queues one scripted HTTP status.
        pub fn respond(&self, status: u16) {
            self.respond_with(Ok(TransportResponse { status, body: String::new() }));
        }

        /// Queues one scripted result.
        pub fn respond_with(&self, result: Result<TransportResponse>) {
            self.script.lock().expect("script poisoned").push_back(result);
        }

        /// Replaces the fallback used once the script is exhausted.
        pub fn always_respond(&self, status: u16) {
            *self.fallback.lock().expect("fallback poisoned") =
                Ok(TransportResponse { status, body: String::new() });
        }

        /// Replaces the fallback with a transport-level failure.
        pub fn always_fail(&self, error: DeliveryError) {
            *self.fallback.lock().expect("fallback poisoned") = Err(error);
        }

        /// Every job handed to `send`, in order.
        pub fn sent(&self) -> Vec<PushJob> {
            self.sent.lock().expect("sent log poisoned").clone()
        }

        /// Number of delivery attempts observed.
        pub fn send_count(&self) -> usize {
            self.sent.lock().expect("sent log poisoned").len()
        }
    }

    impl Default for MockTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Transport for MockTransport {
        fn send<'a>(
            &'a self,
            job: &'a PushJob,
        ) -> Pin<Box<dyn Future<Output = Result<TransportResponse>> + Send + 'a>> {
            self.sent.lock().expect("sent log poisoned").push(job.clone());
            let result = self
                .script
                .lock()
                .expect("script poisoned")
                .pop_front()
                .unwrap_or_else(|| self.fallback.lock().expect("fallback poisoned").clone());
            Box::pin(async move { result })
        }
    }
}
