//! Behavioral tests for the queue abstraction using the in-memory
//! implementation.

use std::{collections::HashSet, sync::Arc, time::Duration};

use taskflow_core::queue::{mock::InMemoryQueue, JobQueue};

#[tokio::test]
async fn entries_are_dequeued_in_fifo_order() {
    let queue = InMemoryQueue::new();
    queue.push("first").await;
    queue.push("second").await;

    let wait = Duration::from_millis(50);
    assert_eq!(queue.dequeue(wait).await.unwrap().as_deref(), Some("first"));
    assert_eq!(queue.dequeue(wait).await.unwrap().as_deref(), Some("second"));
    assert_eq!(queue.dequeue(wait).await.unwrap(), None);
}

#[tokio::test]
async fn dequeue_returns_none_after_wait_window() {
    let queue = InMemoryQueue::new();

    let started = tokio::time::Instant::now();
    let entry = queue.dequeue(Duration::from_millis(30)).await.unwrap();

    assert_eq!(entry, None);
    assert!(started.elapsed() >= Duration::from_millis(30));
}

#[tokio::test]
async fn dequeue_wakes_when_entry_arrives_mid_wait() {
    let queue = InMemoryQueue::new();

    let waiter = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.dequeue(Duration::from_secs(5)).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    queue.push("late arrival").await;

    let entry = waiter.await.unwrap().unwrap();
    assert_eq!(entry.as_deref(), Some("late arrival"));
}

#[tokio::test]
async fn concurrent_consumers_never_share_an_entry() {
    let queue = Arc::new(InMemoryQueue::new());
    const ENTRIES: usize = 200;

    for i in 0..ENTRIES {
        queue.push(format!("job-{i}")).await;
    }

    let mut consumers = Vec::new();
    for _ in 0..4 {
        let queue = queue.clone();
        consumers.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(entry) = queue.dequeue(Duration::from_millis(20)).await.unwrap() {
                seen.push(entry);
            }
            seen
        }));
    }

    let mut all = Vec::new();
    for consumer in consumers {
        all.extend(consumer.await.unwrap());
    }

    assert_eq!(all.len(), ENTRIES, "every entry consumed exactly once");
    let unique: HashSet<_> = all.iter().collect();
    assert_eq!(unique.len(), ENTRIES, "no entry handed to two consumers");
}

#[tokio::test]
async fn injected_dequeue_error_is_one_shot() {
    let queue = InMemoryQueue::new();
    queue.push("survivor").await;
    queue.inject_dequeue_error("connection reset").await;

    let wait = Duration::from_millis(50);
    assert!(queue.dequeue(wait).await.is_err());
    assert_eq!(queue.dequeue(wait).await.unwrap().as_deref(), Some("survivor"));
}

#[tokio::test]
async fn injected_enqueue_error_does_not_stick() {
    let queue = InMemoryQueue::new();
    queue.inject_enqueue_error("connection reset").await;

    assert!(queue.enqueue("lost").await.is_err());
    queue.enqueue("kept").await.unwrap();
    assert_eq!(queue.len().await, 1);
}
