//! Publisher test double that keeps every message it is given.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::bus::Publisher;
use crate::error::{BusError, Result};

#[derive(Debug)]
struct RecordingState<M> {
    published: Vec<M>,
    fail_on_publish: bool,
}

impl<M> Default for RecordingState<M> {
    fn default() -> Self {
        Self {
            published: Vec::new(),
            fail_on_publish: false,
        }
    }
}

/// Publisher that records messages instead of sending them.
#[derive(Debug, Clone)]
pub struct RecordingPublisher<M> {
    state: Arc<RwLock<RecordingState<M>>>,
}

impl<M> Default for RecordingPublisher<M> {
    fn default() -> Self {
        Self {
            state: Arc::new(RwLock::new(RecordingState::default())),
        }
    }
}

impl<M: Clone> RecordingPublisher<M> {
    /// Creates an empty recording publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to reject subsequent publishes.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().unwrap().fail_on_publish = fail;
    }

    /// Returns every message published so far, oldest first.
    pub fn published(&self) -> Vec<M> {
        self.state.read().unwrap().published.clone()
    }

    /// Returns the most recently published message.
    pub fn last(&self) -> Option<M> {
        self.state.read().unwrap().published.last().cloned()
    }

    /// Returns the number of messages published so far.
    pub fn count(&self) -> usize {
        self.state.read().unwrap().published.len()
    }
}

#[async_trait]
impl<M> Publisher<M> for RecordingPublisher<M>
where
    M: Clone + Send + Sync,
{
    async fn publish(&self, message: &M) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_publish {
            return Err(BusError::Publish {
                subject: "recording".to_string(),
                reason: "publisher configured to fail".to_string(),
            });
        }
        state.published.push(message.clone());
        Ok(())
    }
}
