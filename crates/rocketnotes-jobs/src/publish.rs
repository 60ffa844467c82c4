//! Reindex Queue publisher.

use std::sync::Arc;

use tracing::info;

use rocketnotes_core::{MessageQueue, ReindexMessage, Result};

/// Sends [`ReindexMessage`]s to a named Reindex Queue.
#[derive(Clone)]
pub struct ReindexPublisher {
    queue: Arc<dyn MessageQueue>,
    reindex_queue: String,
}

impl ReindexPublisher {
    pub fn new(queue: Arc<dyn MessageQueue>, reindex_queue: impl Into<String>) -> Self {
        Self {
            queue,
            reindex_queue: reindex_queue.into(),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.reindex_queue
    }

    /// Enqueue a rebuild request and return its message id.
    pub async fn publish(&self, message: &ReindexMessage) -> Result<String> {
        let body = serde_json::to_string(message)?;
        let message_id = self.queue.send(&self.reindex_queue, &body).await?;
        info!(
            subsystem = "jobs",
            component = "publisher",
            op = "publish_reindex",
            queue = %self.reindex_queue,
            message_id = %message_id,
            user_id = %message.user_id,
            document_id = message.document_id.as_deref().unwrap_or(""),
            recreate_index = message.recreate_index,
            "Published reindex message"
        );
        Ok(message_id)
    }
}
