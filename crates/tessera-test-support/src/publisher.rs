//! Scripted message publisher for relay tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tessera_outbox::publisher::{MessagePublisher, PublishError};

/// What the publisher does with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Accept and record the message.
    Deliver,
    /// Fail with `PublishError::Unavailable`.
    Fail,
    /// Never answer (until the caller's timeout fires).
    Stall,
}

/// A publisher that records delivered messages and follows a script:
/// per-topic outcomes first, then a queue of one-shot outcomes, then
/// `Deliver`.
#[derive(Debug, Default)]
pub struct ScriptedPublisher {
    delivered: Mutex<Vec<(String, String)>>,
    queued: Mutex<VecDeque<PublishOutcome>>,
    topics: Mutex<HashMap<String, PublishOutcome>>,
    attempts: AtomicUsize,
}

impl ScriptedPublisher {
    /// A publisher that delivers everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `n` publishes, whatever their topic.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn failing_next(self, n: usize) -> Self {
        self.queued
            .lock()
            .unwrap()
            .extend(std::iter::repeat_n(PublishOutcome::Fail, n));
        self
    }

    /// Applies `outcome` to every publish on `topic` until [`recover`] is
    /// called.
    ///
    /// [`recover`]: ScriptedPublisher::recover
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_topic(&self, topic: &str, outcome: PublishOutcome) {
        self.topics.lock().unwrap().insert(topic.to_owned(), outcome);
    }

    /// Clears every scripted outcome; subsequent publishes are delivered.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn recover(&self) {
        self.topics.lock().unwrap().clear();
        self.queued.lock().unwrap().clear();
    }

    /// Delivered `(topic, payload)` pairs in delivery order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn delivered(&self) -> Vec<(String, String)> {
        self.delivered.lock().unwrap().clone()
    }

    /// Number of publish attempts, including failures.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn next_outcome(&self, topic: &str) -> PublishOutcome {
        if let Some(outcome) = self.topics.lock().unwrap().get(topic) {
            return *outcome;
        }
        self.queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PublishOutcome::Deliver)
    }
}

#[async_trait]
impl MessagePublisher for ScriptedPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.next_outcome(topic) {
            PublishOutcome::Deliver => {
                self.delivered
                    .lock()
                    .unwrap()
                    .push((topic.to_owned(), payload.to_owned()));
                Ok(())
            }
            PublishOutcome::Fail => Err(PublishError::Unavailable(format!(
                "scripted failure on {topic}"
            ))),
            PublishOutcome::Stall => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(PublishError::TimedOut(Duration::from_secs(3600)))
            }
        }
    }
}
