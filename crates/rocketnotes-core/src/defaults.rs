//! Centralized default constants for rocketnotes.
//!
//! Crates reference these instead of defining their own magic numbers.
//! Anything an operator may need to change is also exposed through
//! [`crate::config::PipelineConfig`].

// =============================================================================
// DOCUMENTS & TREES
// =============================================================================

/// Parent id of top-level documents and tree nodes.
pub const ROOT_PARENT_ID: &str = "root";

// =============================================================================
// QUEUES
// =============================================================================

/// Write Queue name.
pub const WRITE_QUEUE: &str = "write-queue";

/// Reindex Queue name.
pub const REINDEX_QUEUE: &str = "reindex-queue";

/// Destination for messages that cannot be processed.
pub const DEAD_LETTER_QUEUE: &str = "dead-letter-queue";

/// Visibility timeout of the Write Queue. A save is a few store round trips.
pub const WRITE_VISIBILITY_TIMEOUT_SECS: u64 = 30;

/// Visibility timeout of the Reindex Queue. Must exceed the worst-case time
/// to embed one user's whole corpus.
pub const REINDEX_VISIBILITY_TIMEOUT_SECS: u64 = 900;

/// Deliveries before a message is moved to the dead-letter queue.
pub const MAX_RECEIVE_COUNT: u32 = 5;

/// Sleep between polls of an empty queue.
pub const WORKER_POLL_INTERVAL_MS: u64 = 1000;

/// Postgres pool size. Each worker holds at most one connection per
/// in-flight message.
pub const DB_MAX_CONNECTIONS: u32 = 10;

// =============================================================================
// EMBEDDING
// =============================================================================

/// Documents and chunks with at most this many characters are not embedded.
pub const MIN_EMBED_CHARS: usize = 12;

/// Texts per embedding request.
pub const EMBED_BATCH_SIZE: usize = 32;

/// Object-store bucket holding vector indexes.
pub const VECTOR_BUCKET: &str = "vector-indexes";

/// Root directory of the filesystem object store.
pub const OBJECT_STORE_PATH: &str = "./data";

// =============================================================================
// READERS
// =============================================================================

/// Hits returned by semantic search.
pub const SEMANTIC_SEARCH_TOP_K: usize = 3;

/// Chunks handed to the chat model as context.
pub const CHAT_CONTEXT_TOP_K: usize = 4;

/// Instruction prefixed to every chat prompt.
pub const CHAT_PROMPT_PREFIX: &str =
    "Based on the context provided, answer the following question in valid markdown syntax: ";

/// Chat sampling temperature.
pub const CHAT_TEMPERATURE: f32 = 0.9;

/// Upper bound on generated chat tokens.
pub const CHAT_MAX_TOKENS: u32 = 2048;

// =============================================================================
// INFERENCE ENDPOINTS
// =============================================================================

/// Ollama base URL.
pub const OLLAMA_URL: &str = "http://localhost:11434";

/// OpenAI-compatible base URL.
pub const OPENAI_URL: &str = "https://api.openai.com/v1";

/// Anthropic base URL.
pub const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Timeout for a single embedding request.
pub const EMBED_TIMEOUT_SECS: u64 = 120;

/// Timeout for a single generation request.
pub const GEN_TIMEOUT_SECS: u64 = 300;

/// External calls slower than this are logged with `slow = true`.
pub const SLOW_CALL_THRESHOLD_MS: u64 = 5000;

// =============================================================================
// SERVER
// =============================================================================

pub const SERVER_HOST: &str = "0.0.0.0";

pub const SERVER_PORT: u16 = 3000;

/// Largest accepted request body (a full tree or a long note).
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;
