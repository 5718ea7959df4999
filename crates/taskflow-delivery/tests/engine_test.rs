//! Engine lifecycle tests: spawning, shared-queue distribution, graceful
//! shutdown, and drop cleanup.

use std::{collections::HashSet, sync::Arc, time::Duration};

use taskflow_core::{
    queue::mock::InMemoryQueue, JobQueue, NotificationPayload, PushJob, Subscription,
    SubscriptionKeys, TestClock,
};
use taskflow_delivery::{
    invalidation::mock::RecordingSink,
    transport::mock::MockTransport,
    DeliveryConfig, DeliveryMode, PushEngine, RetryPolicy,
};

fn test_config() -> DeliveryConfig {
    DeliveryConfig {
        retry: RetryPolicy::default(),
        dequeue_wait: Duration::from_millis(20),
        queue_retry_interval: Duration::from_secs(2),
        drain_timeout: Duration::from_secs(5),
    }
}

fn tagged_job(tag: usize) -> String {
    let job = PushJob {
        subscription: Subscription {
            endpoint: format!("https://push.example/{tag}"),
            keys: SubscriptionKeys { p256dh: "X".to_string(), auth: "Y".to_string() },
        },
        payload: NotificationPayload {
            tag: Some(format!("job-{tag}")),
            ..Default::default()
        },
        attempt_count: 0,
    };
    job.to_queue_entry().expect("job serializes")
}

async fn wait_until(engine: &PushEngine, condition: impl Fn(u64) -> bool, field: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let stats = engine.stats().await;
            let value = match field {
                "delivered" => stats.delivered,
                "dry_run" => stats.dry_run,
                other => unreachable!("unknown counter {other}"),
            };
            if condition(value) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("engine did not reach expected state within 5s");
}

#[tokio::test]
async fn engine_spawns_workers_and_shuts_down_gracefully() {
    let sink = Arc::new(RecordingSink::new());
    let clock = Arc::new(TestClock::new());
    let mut engine = PushEngine::new(test_config(), DeliveryMode::DryRun, sink, clock);

    let queues: Vec<Arc<dyn JobQueue>> =
        (0..3).map(|_| Arc::new(InMemoryQueue::new()) as Arc<dyn JobQueue>).collect();
    engine.start(queues).await;

    assert!(engine.has_active_workers());
    assert_eq!(engine.stats().await.active_workers, 3);

    engine.shutdown().await.expect("graceful shutdown succeeds");
}

#[tokio::test]
async fn workers_sharing_one_queue_split_jobs_exclusively() {
    const JOBS: usize = 100;

    let queue = InMemoryQueue::new();
    let transport = Arc::new(MockTransport::new());
    let sink = Arc::new(RecordingSink::new());
    let clock = Arc::new(TestClock::new());
    let mut engine = PushEngine::new(
        test_config(),
        DeliveryMode::Configured(transport.clone()),
        sink,
        clock,
    );

    let queues: Vec<Arc<dyn JobQueue>> =
        (0..4).map(|_| Arc::new(queue.clone()) as Arc<dyn JobQueue>).collect();
    engine.start(queues).await;

    for tag in 0..JOBS {
        queue.push(tagged_job(tag)).await;
    }

    wait_until(&engine, |delivered| delivered == JOBS as u64, "delivered").await;

    let tags: Vec<String> = transport
        .sent()
        .iter()
        .map(|job| job.payload.tag.clone().expect("every job is tagged"))
        .collect();
    assert_eq!(tags.len(), JOBS, "every job delivered exactly once");
    let unique: HashSet<_> = tags.iter().collect();
    assert_eq!(unique.len(), JOBS, "no job was handed to two workers");

    assert!(queue.is_empty().await);
    engine.shutdown().await.expect("graceful shutdown succeeds");
}

#[tokio::test]
async fn dry_run_engine_drains_under_sustained_load() {
    const JOBS: usize = 50;

    let queue = InMemoryQueue::new();
    let sink = Arc::new(RecordingSink::new());
    let clock = Arc::new(TestClock::new());
    let mut engine = PushEngine::new(test_config(), DeliveryMode::DryRun, sink, clock);

    let queues: Vec<Arc<dyn JobQueue>> =
        (0..2).map(|_| Arc::new(queue.clone()) as Arc<dyn JobQueue>).collect();
    engine.start(queues).await;

    for tag in 0..JOBS {
        queue.push(tagged_job(tag)).await;
    }

    wait_until(&engine, |dry_run| dry_run == JOBS as u64, "dry_run").await;
    assert!(queue.is_empty().await);

    engine.shutdown().await.expect("graceful shutdown succeeds");
}

#[tokio::test]
async fn dropping_the_engine_cancels_workers() {
    let sink = Arc::new(RecordingSink::new());
    let clock = Arc::new(TestClock::new());
    let mut engine = PushEngine::new(test_config(), DeliveryMode::DryRun, sink, clock);

    engine.start(vec![Arc::new(InMemoryQueue::new()) as Arc<dyn JobQueue>]).await;
    let token = engine.cancellation_token();
    assert!(!token.is_cancelled());

    drop(engine);

    assert!(token.is_cancelled(), "drop must cancel the shared token");
}

#[tokio::test]
async fn shutdown_with_idle_workers_is_prompt() {
    let sink = Arc::new(RecordingSink::new());
    let clock = Arc::new(TestClock::new());
    let mut engine = PushEngine::new(test_config(), DeliveryMode::DryRun, sink, clock);

    engine.start(vec![Arc::new(InMemoryQueue::new()) as Arc<dyn JobQueue>]).await;
    assert_eq!(engine.stats().await.active_workers, 1);

    let started = tokio::time::Instant::now();
    engine.shutdown().await.expect("graceful shutdown succeeds");
    assert!(started.elapsed() < Duration::from_secs(2), "idle workers drain quickly");
}
