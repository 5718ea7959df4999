//! Worker configuration loaded from environment variables.
//!
//! Every variable has a default so the worker can start in an empty
//! environment; without signing keys it runs in dry-run mode.

use std::time::Duration;

use anyhow::Context;

/// Default Redis connection string (compose service name).
const DEFAULT_REDIS_URL: &str = "redis://redis:6379/0";

/// Default queue list key the web application pushes jobs onto.
const DEFAULT_QUEUE_KEY: &str = "taskflow:push:queue";

/// Default list key dead subscription endpoints are recorded on.
const DEFAULT_INVALIDATION_KEY: &str = "taskflow:push:invalidations";

/// Default contact subject carried in the sender-authentication token.
const DEFAULT_SUBJECT: &str = "mailto:admin@example.com";

/// Global worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Redis connection string.
    pub redis_url: String,

    /// Queue list key jobs are consumed from.
    pub queue_key: String,

    /// List key confirmed-dead subscription endpoints are recorded on.
    pub invalidation_key: String,

    /// Sender public key, uncompressed P-256 point, base64url.
    pub vapid_public_key: Option<String>,

    /// Sender private key, 32-byte scalar, base64url.
    pub vapid_private_key: Option<String>,

    /// Contact subject (`mailto:` or `https:` URI).
    pub vapid_subject: String,

    /// Maximum transient-failure retries per job.
    pub max_attempts: u32,

    /// First backoff delay; doubles per retry.
    pub retry_base: Duration,

    /// Upper bound on any single backoff delay.
    pub retry_cap: Duration,

    /// Number of concurrent delivery workers.
    pub concurrency: usize,

    /// Maximum time to wait for in-flight deliveries on shutdown.
    pub drain_timeout: Duration,

    /// How long the push service may hold an undelivered message.
    pub ttl: Duration,

    /// HTTP timeout for one delivery attempt.
    pub http_timeout: Duration,

    /// Length of one blocking-pop window on the queue.
    pub dequeue_wait: Duration,
}

/// Signing credential triple extracted from the configuration.
#[derive(Debug, Clone)]
pub struct VapidSettings {
    /// Sender public key, base64url.
    pub public_key: String,
    /// Sender private key, base64url.
    pub private_key: String,
    /// Contact subject.
    pub subject: String,
}

impl WorkerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when a numeric variable is present but unparseable.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            redis_url: env_or("REDIS_URL", DEFAULT_REDIS_URL),
            queue_key: env_or("PUSH_QUEUE_KEY", DEFAULT_QUEUE_KEY),
            invalidation_key: env_or("PUSH_INVALIDATION_KEY", DEFAULT_INVALIDATION_KEY),
            vapid_public_key: env_non_empty("VAPID_PUBLIC_KEY"),
            vapid_private_key: env_non_empty("VAPID_PRIVATE_KEY"),
            vapid_subject: env_or("VAPID_SUBJECT", DEFAULT_SUBJECT),
            max_attempts: env_parse("PUSH_MAX_ATTEMPTS", 5)?,
            retry_base: Duration::from_secs(env_parse("PUSH_RETRY_BASE_SECS", 2)?),
            retry_cap: Duration::from_secs(env_parse("PUSH_RETRY_CAP_SECS", 60)?),
            concurrency: env_parse("PUSH_CONCURRENCY", 4)?,
            drain_timeout: Duration::from_secs(env_parse("PUSH_DRAIN_TIMEOUT_SECS", 30)?),
            ttl: Duration::from_secs(env_parse("PUSH_TTL_SECS", 1800)?),
            http_timeout: Duration::from_secs(env_parse("PUSH_HTTP_TIMEOUT_SECS", 30)?),
            dequeue_wait: Duration::from_secs(env_parse("PUSH_DEQUEUE_WAIT_SECS", 5)?),
        })
    }

    /// Returns the signing credentials when both keys are configured.
    ///
    /// `None` means the worker must run in dry-run mode.
    pub fn vapid(&self) -> Option<VapidSettings> {
        match (&self.vapid_public_key, &self.vapid_private_key) {
            (Some(public_key), Some(private_key)) => Some(VapidSettings {
                public_key: public_key.clone(),
                private_key: private_key.clone(),
                subject: self.vapid_subject.clone(),
            }),
            _ => None,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            queue_key: DEFAULT_QUEUE_KEY.to_string(),
            invalidation_key: DEFAULT_INVALIDATION_KEY.to_string(),
            vapid_public_key: None,
            vapid_private_key: None,
            vapid_subject: DEFAULT_SUBJECT.to_string(),
            max_attempts: 5,
            retry_base: Duration::from_secs(2),
            retry_cap: Duration::from_secs(60),
            concurrency: 4,
            drain_timeout: Duration::from_secs(30),
            ttl: Duration::from_secs(1800),
            http_timeout: Duration::from_secs(30),
            dequeue_wait: Duration::from_secs(5),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) if !raw.is_empty() => {
            raw.parse().with_context(|| format!("invalid value for {name}: {raw:?}"))
        },
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_documentation() {
        let config = WorkerConfig::default();
        assert_eq!(config.queue_key, "taskflow:push:queue");
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.retry_base, Duration::from_secs(2));
        assert_eq!(config.retry_cap, Duration::from_secs(60));
        assert_eq!(config.ttl, Duration::from_secs(1800));
    }

    #[test]
    fn vapid_requires_both_keys() {
        let mut config = WorkerConfig::default();
        assert!(config.vapid().is_none());

        config.vapid_public_key = Some("pub".into());
        assert!(config.vapid().is_none());

        config.vapid_private_key = Some("priv".into());
        let vapid = config.vapid().expect("both keys configured");
        assert_eq!(vapid.public_key, "pub");
        assert_eq!(vapid.private_key, "priv");
        assert_eq!(vapid.subject, DEFAULT_SUBJECT);
    }
}
