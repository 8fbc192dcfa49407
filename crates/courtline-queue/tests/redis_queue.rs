//! Redis queue integration tests.

use std::time::Duration;

use courtline_models::StreamKey;
use courtline_queue::{
    FrameJob, FrameQueue, OverflowPolicy, PushOutcome, QueueBackend, QueueConfig, QueueError,
    RedisQueue,
};

fn test_config(name: &str, capacity: usize, overflow: OverflowPolicy) -> QueueConfig {
    dotenvy::dotenv().ok();
    QueueConfig {
        backend: QueueBackend::Redis,
        queue_name: format!("courtline_test_{}", name),
        capacity,
        overflow,
        ..QueueConfig::from_env()
    }
}

fn job(cam: &str, byte: u8) -> FrameJob {
    FrameJob::new(StreamKey::new("court-a", cam), vec![0xFF, 0xD8, byte])
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_push_pop_preserves_order() {
    let queue = RedisQueue::new(&test_config("order", 16, OverflowPolicy::DropOldest))
        .expect("Failed to create queue");
    queue.clear().await.expect("Failed to clear queue");

    for i in 0..3 {
        queue.push(job("1", i)).await.expect("Failed to push");
    }
    assert_eq!(queue.len().await.unwrap(), 3);

    for i in 0..3 {
        let popped = queue.pop().await.expect("Failed to pop");
        assert_eq!(popped.stream, StreamKey::new("court-a", "1"));
        assert_eq!(popped.frame[2], i);
    }
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_drop_oldest_trims_list() {
    let queue = RedisQueue::new(&test_config("trim", 2, OverflowPolicy::DropOldest))
        .expect("Failed to create queue");
    queue.clear().await.expect("Failed to clear queue");

    queue.push(job("1", 0)).await.unwrap();
    queue.push(job("1", 1)).await.unwrap();
    let outcome = queue.push(job("1", 2)).await.unwrap();

    assert_eq!(outcome, PushOutcome::EvictedOldest { evicted: 1 });
    assert_eq!(queue.len().await.unwrap(), 2);
    assert_eq!(queue.pop().await.unwrap().frame[2], 1);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_reject_when_full() {
    let queue = RedisQueue::new(&test_config("reject", 1, OverflowPolicy::Reject))
        .expect("Failed to create queue");
    queue.clear().await.expect("Failed to clear queue");

    queue.push(job("1", 0)).await.unwrap();
    let err = queue.push(job("1", 1)).await.unwrap_err();
    assert!(matches!(err, QueueError::Full { capacity: 1 }));
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_close_stops_pop() {
    let queue = std::sync::Arc::new(
        RedisQueue::new(&test_config("close", 4, OverflowPolicy::DropOldest))
            .expect("Failed to create queue"),
    );
    queue.clear().await.expect("Failed to clear queue");

    let consumer = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.pop().await })
    };
    queue.close();

    let result = tokio::time::timeout(Duration::from_secs(5), consumer)
        .await
        .expect("pop did not observe close")
        .unwrap();
    assert!(matches!(result, Err(QueueError::Closed)));
}
