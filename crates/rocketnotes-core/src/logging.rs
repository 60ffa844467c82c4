//! Structured logging field names for rocketnotes.
//!
//! All crates log with these names so queries work the same way across
//! the api, the workers and the inference backends.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Message dead-lettered, store unavailable |
//! | WARN  | Retry scheduled, slow external call, partial skip |
//! | INFO  | Lifecycle events, message completions, index rebuilt |
//! | DEBUG | Decision points (reindex gating, model resolution) |
//! | TRACE | Per-chunk and per-hit detail |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Request correlation id set by the HTTP layer.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "queue", "jobs", "inference", "search"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "save_worker", "embedding_worker", "ollama", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "handle", "receive", "embed_texts", "rebuild_index"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

pub const USER_ID: &str = "user_id";

pub const DOCUMENT_ID: &str = "document_id";

/// Queue message id.
pub const MESSAGE_ID: &str = "message_id";

/// Queue name.
pub const QUEUE: &str = "queue";

/// Delivery attempt of a queue message.
pub const RECEIVE_COUNT: &str = "receive_count";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search.
pub const RESULT_COUNT: &str = "result_count";

/// Number of chunks embedded.
pub const CHUNK_COUNT: &str = "chunk_count";

/// Number of documents read for a rebuild.
pub const DOCUMENT_COUNT: &str = "document_count";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for embedding or generation.
pub const MODEL: &str = "model";

/// Prompt length in characters.
pub const PROMPT_LEN: &str = "prompt_len";

// ─── Outcome fields ────────────────────────────────────────────────────────

pub const SUCCESS: &str = "success";

pub const ERROR_MSG: &str = "error";

/// Set when an external call exceeded the slow threshold.
pub const SLOW: &str = "slow";
