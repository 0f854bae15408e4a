use super::{LogQueue, QueueError};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// In-process queue for single-process deployments and tests
#[derive(Debug, Default)]
pub struct MemoryQueue {
    entries: Mutex<VecDeque<String>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogQueue for MemoryQueue {
    async fn push(&self, payload: String) -> Result<(), QueueError> {
        self.entries.lock().await.push_back(payload);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<String>, QueueError> {
        Ok(self.entries.lock().await.pop_front())
    }

    async fn len(&self) -> Result<u64, QueueError> {
        Ok(self.entries.lock().await.len() as u64)
    }
}
