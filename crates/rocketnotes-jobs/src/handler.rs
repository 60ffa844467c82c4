//! Message handlers for each queue.

use async_trait::async_trait;

use rocketnotes_core::{Error, ReceivedMessage};

/// Context provided to message handlers.
pub struct MessageContext {
    /// The delivery being processed.
    pub message: ReceivedMessage,
}

impl MessageContext {
    pub fn new(message: ReceivedMessage) -> Self {
        Self { message }
    }

    pub fn message_id(&self) -> &str {
        &self.message.message_id
    }

    pub fn body(&self) -> &str {
        &self.message.body
    }

    pub fn receive_count(&self) -> u32 {
        self.message.receive_count
    }

    /// Whether an earlier delivery of this message was claimed and not
    /// acknowledged.
    pub fn is_redelivery(&self) -> bool {
        self.message.receive_count > 1
    }
}

/// Outcome of handling one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerResult {
    /// Acknowledge and remove the message.
    Success,
    /// Leave the message for redelivery after its visibility timeout.
    Retry(String),
    /// Move the message to the dead-letter queue.
    Reject(String),
}

impl HandlerResult {
    /// Map a failed operation to retry or dead-letter.
    pub fn from_error(error: &Error) -> Self {
        if error.is_retryable() {
            HandlerResult::Retry(error.to_string())
        } else {
            HandlerResult::Reject(error.to_string())
        }
    }
}

impl<T> From<rocketnotes_core::Result<T>> for HandlerResult {
    fn from(result: rocketnotes_core::Result<T>) -> Self {
        match result {
            Ok(_) => HandlerResult::Success,
            Err(e) => HandlerResult::from_error(&e),
        }
    }
}

/// Trait for queue message handlers.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Handle one delivery. Must be idempotent: the same message can arrive
    /// more than once.
    async fn handle(&self, ctx: MessageContext) -> HandlerResult;
}
