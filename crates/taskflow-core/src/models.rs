//! Push job wire format shared with the web application.
//!
//! The web application serializes one `PushJob` per queue entry; the worker
//! deserializes it back. Field names are part of the wire contract and must
//! not change without coordinating both sides.

use serde::{Deserialize, Serialize};

/// One push notification delivery, as taken from the queue.
///
/// Created by the producer, consumed at most once successfully (or discarded)
/// by exactly one worker. The worker never persists a job beyond the in-flight
/// attempt; on transient failure it re-enqueues the job with an incremented
/// `attempt_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushJob {
    /// Browser-issued delivery target.
    pub subscription: Subscription,

    /// Notification content forwarded to the renderer.
    #[serde(default)]
    pub payload: NotificationPayload,

    /// Number of delivery attempts already retried.
    ///
    /// Absent on producer-created jobs (defaults to 0); incremented only by
    /// the worker when it re-enqueues after a transient failure.
    #[serde(default)]
    pub attempt_count: u32,
}

/// Browser push subscription: endpoint URI plus key material.
///
/// The endpoint is the stable identity of a notification target. Two jobs
/// with the same endpoint are independent deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Push-service URI the notification is POSTed to.
    pub endpoint: String,

    /// Client key material required by the transport.
    pub keys: SubscriptionKeys,
}

/// Client-side key material from the browser's `PushSubscription`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// Client public key, base64url.
    pub p256dh: String,

    /// Shared authentication secret, base64url.
    pub auth: String,
}

/// Notification content rendered by the browser-side service worker.
///
/// All fields are optional; absent fields take transport-defined defaults.
/// The renderer depends on these exact field names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Notification title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Notification body text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// In-app URL opened when the notification is clicked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Grouping tag for notification replacement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl PushJob {
    /// Parses a raw queue entry.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MalformedJob` if the entry is not a valid job
    /// document.
    pub fn from_queue_entry(raw: &str) -> crate::Result<Self> {
        serde_json::from_str(raw).map_err(Into::into)
    }

    /// Serializes the job back into a queue entry for re-enqueueing.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MalformedJob` if serialization fails; with this
    /// data model that does not happen in practice.
    pub fn to_queue_entry(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCER_JOB: &str = r#"{
        "subscription": {
            "endpoint": "https://push.example/abc",
            "keys": { "p256dh": "X", "auth": "Y" }
        },
        "payload": {
            "title": "Task assigned",
            "body": "New task TD-123",
            "url": "/company/acme/tasks/TD-123"
        }
    }"#;

    #[test]
    fn producer_job_parses_without_attempt_count() {
        let job = PushJob::from_queue_entry(PRODUCER_JOB).unwrap();
        assert_eq!(job.subscription.endpoint, "https://push.example/abc");
        assert_eq!(job.subscription.keys.p256dh, "X");
        assert_eq!(job.subscription.keys.auth, "Y");
        assert_eq!(job.payload.title.as_deref(), Some("Task assigned"));
        assert_eq!(job.payload.tag, None);
        assert_eq!(job.attempt_count, 0);
    }

    #[test]
    fn reenqueued_job_round_trips_attempt_count() {
        let mut job = PushJob::from_queue_entry(PRODUCER_JOB).unwrap();
        job.attempt_count = 3;

        let entry = job.to_queue_entry().unwrap();
        let parsed = PushJob::from_queue_entry(&entry).unwrap();
        assert_eq!(parsed, job);
    }

    #[test]
    fn absent_payload_fields_are_omitted_from_wire() {
        let payload = NotificationPayload {
            title: Some("Task assigned".into()),
            ..Default::default()
        };
        let wire = serde_json::to_string(&payload).unwrap();
        assert_eq!(wire, r#"{"title":"Task assigned"}"#);
    }

    #[test]
    fn missing_endpoint_is_rejected() {
        let raw = r#"{"subscription":{"keys":{"p256dh":"X","auth":"Y"}},"payload":{}}"#;
        assert!(PushJob::from_queue_entry(raw).is_err());
    }

    #[test]
    fn empty_payload_defaults() {
        let raw = r#"{"subscription":{"endpoint":"https://push.example/a","keys":{"p256dh":"X","auth":"Y"}}}"#;
        let job = PushJob::from_queue_entry(raw).unwrap();
        assert_eq!(job.payload, NotificationPayload::default());
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let raw = r#"{
            "subscription": {
                "endpoint": "https://push.example/a",
                "keys": { "p256dh": "X", "auth": "Y", "extra": "ignored" }
            },
            "payload": { "title": "t", "badge": 3 },
            "origin": "api"
        }"#;
        let job = PushJob::from_queue_entry(raw).unwrap();
        assert_eq!(job.payload.title.as_deref(), Some("t"));
    }
}
