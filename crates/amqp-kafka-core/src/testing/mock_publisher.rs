//! In-memory publisher for tests.
//!
//! Records every message it is asked to publish and answers with scripted
//! outcomes. Successful publishes are assigned to partitions round-robin with
//! a per-partition offset counter, like a real topic would.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{PublishError, PublishResult};
use crate::headers::HeaderSet;
use crate::publisher::{PublishReceipt, Publisher};

/// A message the mock was asked to publish.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub headers: HeaderSet,
    pub payload: Bytes,
    /// Whether the scripted outcome was a success.
    pub delivered: bool,
}

#[derive(Default)]
struct State {
    published: Vec<PublishedMessage>,
    scripted: VecDeque<PublishResult<PublishReceipt>>,
    next_offsets: HashMap<i32, i64>,
    next_partition: i32,
}

/// Cloneable mock publisher; clones share the same state.
#[derive(Clone)]
pub struct MockPublisher {
    topic: String,
    partitions: i32,
    state: Arc<Mutex<State>>,
    fail_all: Arc<AtomicBool>,
    shut_down: Arc<AtomicBool>,
}

impl MockPublisher {
    /// A publisher for `topic` with a single partition.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self::with_partitions(topic, 1)
    }

    /// A publisher for `topic` spreading messages over `partitions`.
    #[must_use]
    pub fn with_partitions(topic: impl Into<String>, partitions: i32) -> Self {
        Self {
            topic: topic.into(),
            partitions: partitions.max(1),
            state: Arc::new(Mutex::new(State::default())),
            fail_all: Arc::new(AtomicBool::new(false)),
            shut_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Answer the next publish with the given receipt.
    pub fn succeed_next(&self, partition: i32, offset: i64) {
        self.lock()
            .scripted
            .push_back(Ok(PublishReceipt { partition, offset }));
    }

    /// Answer the next publish with an error.
    pub fn fail_next(&self, message: &str) {
        self.lock()
            .scripted
            .push_back(Err(PublishError::new(message)));
    }

    /// Fail every publish that has no scripted outcome.
    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Everything published so far, in call order.
    #[must_use]
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.clone()
    }

    /// Whether [`Publisher::shutdown`] was called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("mock publisher state poisoned")
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn publish(&self, headers: &HeaderSet, payload: &[u8]) -> PublishResult<PublishReceipt> {
        let fail_all = self.fail_all.load(Ordering::SeqCst);
        let mut state = self.lock();

        let outcome = match state.scripted.pop_front() {
            Some(scripted) => scripted,
            None if fail_all => Err(PublishError::new("mock publisher failing all messages")),
            None => {
                let partition = state.next_partition;
                state.next_partition = (partition + 1) % self.partitions;
                let next = state.next_offsets.entry(partition).or_insert(0);
                let offset = *next;
                *next += 1;
                Ok(PublishReceipt { partition, offset })
            }
        };

        state.published.push(PublishedMessage {
            headers: headers.clone(),
            payload: Bytes::copy_from_slice(payload),
            delivered: outcome.is_ok(),
        });
        outcome
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_robin_offsets() {
        let publisher = MockPublisher::with_partitions("events", 2);
        let headers = HeaderSet::new();

        let receipts: Vec<PublishReceipt> = futures::future::join_all(
            (0..4).map(|_| publisher.publish(&headers, b"x")),
        )
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

        assert_eq!(
            receipts,
            vec![
                PublishReceipt { partition: 0, offset: 0 },
                PublishReceipt { partition: 1, offset: 0 },
                PublishReceipt { partition: 0, offset: 1 },
                PublishReceipt { partition: 1, offset: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_scripted_outcomes_take_precedence() {
        let publisher = MockPublisher::new("events");
        publisher.fail_all(true);
        publisher.succeed_next(3, 99);

        let headers = HeaderSet::new();
        assert_eq!(
            publisher.publish(&headers, b"a").await,
            Ok(PublishReceipt { partition: 3, offset: 99 })
        );
        assert!(publisher.publish(&headers, b"b").await.is_err());

        let published = publisher.published();
        assert_eq!(published.len(), 2);
        assert!(published[0].delivered);
        assert!(!published[1].delivered);
        assert_eq!(published[1].payload, Bytes::from_static(b"b"));
    }

    #[tokio::test]
    async fn test_shutdown_recorded() {
        let publisher = MockPublisher::new("events");
        let clone = publisher.clone();
        assert!(!publisher.is_shut_down());
        clone.shutdown().await;
        assert!(publisher.is_shut_down());
    }
}
