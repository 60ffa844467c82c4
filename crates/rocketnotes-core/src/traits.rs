//! Core traits for rocketnotes abstractions.
//!
//! Stores, queues, the object store and the inference backends sit behind
//! these traits so the workers run unchanged against Postgres or the local
//! in-memory store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::*;

/// Embedding vector.
pub type Vector = Vec<f32>;

// =============================================================================
// DOCUMENT STORE
// =============================================================================

/// Durable persistence of [`Document`] records.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert or replace a document, last-write-wins on `last_modified`.
    ///
    /// Returns `false` when a stored version with a newer `last_modified`
    /// was kept instead.
    async fn upsert(&self, document: &Document) -> Result<bool>;

    /// Fetch a document by id, tombstoned or not.
    async fn get(&self, id: &str) -> Result<Option<Document>>;

    /// All non-deleted documents of a user.
    async fn list_active(&self, user_id: &str) -> Result<Vec<Document>>;

    /// Non-deleted documents of a user whose search content contains
    /// `needle` (already lowercased).
    async fn search(&self, user_id: &str, needle: &str) -> Result<Vec<Document>>;

    /// Mark a document deleted. Returns the tombstoned record, or `None`
    /// if no such document exists.
    async fn tombstone(&self, id: &str, at: DateTime<Utc>) -> Result<Option<Document>>;

    /// Change the sharing flag of a live document.
    async fn set_public(&self, id: &str, is_public: bool) -> Result<Option<Document>>;
}

// =============================================================================
// TREE STORE
// =============================================================================

/// Durable persistence of one [`Tree`] per user.
#[async_trait]
pub trait TreeRepository: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<Tree>>;

    /// Replace the user's tree wholesale.
    async fn put(&self, tree: &Tree) -> Result<()>;
}

// =============================================================================
// USER CONFIG STORE
// =============================================================================

#[async_trait]
pub trait UserConfigRepository: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<UserConfig>>;

    async fn put(&self, config: &UserConfig) -> Result<()>;
}

// =============================================================================
// ZETTEL STORE
// =============================================================================

#[async_trait]
pub trait ZettelRepository: Send + Sync {
    /// Insert or replace a zettel by id.
    async fn put(&self, zettel: &Zettel) -> Result<()>;

    /// A user's zettels, oldest first.
    async fn list(&self, user_id: &str) -> Result<Vec<Zettel>>;

    /// Remove a zettel, returning it if it existed.
    async fn delete(&self, id: &str) -> Result<Option<Zettel>>;
}

// =============================================================================
// QUEUES
// =============================================================================

/// At-least-once message channel with visibility timeouts.
///
/// Delivery order is not guaranteed and a message may be delivered more than
/// once; consumers must be idempotent.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Enqueue a body and return its message id.
    async fn send(&self, queue: &str, body: &str) -> Result<String>;

    /// Claim at most one visible message, hiding it for `visibility_timeout`.
    async fn receive(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<ReceivedMessage>>;

    /// Acknowledge a delivery. Fails if the receipt is no longer current.
    async fn delete(&self, message: &ReceivedMessage) -> Result<()>;

    /// Move a claimed message to `dead_letter_queue`, recording why.
    async fn dead_letter(
        &self,
        message: &ReceivedMessage,
        dead_letter_queue: &str,
        reason: &str,
    ) -> Result<()>;

    /// Number of messages held by a queue, visible or in flight.
    async fn depth(&self, queue: &str) -> Result<u64>;
}

// =============================================================================
// OBJECT STORE
// =============================================================================

/// Whole-object storage for vector indexes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Replace an object atomically: readers see the old bytes or the new
    /// bytes, never a mix.
    async fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<()>;

    /// Read an object, `None` if it does not exist.
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts.
    ///
    /// Returns a vector of embedding vectors, one per input text.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Picks the backends a user's settings ask for.
pub trait ModelResolver: Send + Sync {
    /// Embedding backend for `config.embedding_model`.
    fn embedder(&self, config: &UserConfig) -> Result<Arc<dyn EmbeddingBackend>>;

    /// Chat backend for `config.llm_model`.
    fn chat_model(&self, config: &UserConfig) -> Result<Arc<dyn GenerationBackend>>;
}
