//! Pipeline configuration.
//!
//! Built once at start-up and handed to every store, worker and publisher
//! constructor. Nothing below `main` reads the environment.

use std::path::PathBuf;

use crate::defaults;

/// Queue names, storage locations and inference endpoints.
///
/// # Environment Variables
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `DATABASE_URL` | `postgres://localhost/rocketnotes` | Postgres connection string |
/// | `USE_LOCAL_STORE` | `false` | In-memory stores and queue instead of Postgres |
/// | `WRITE_QUEUE` | `write-queue` | Write Queue name |
/// | `REINDEX_QUEUE` | `reindex-queue` | Reindex Queue name |
/// | `DEAD_LETTER_QUEUE` | `dead-letter-queue` | Dead-letter queue name |
/// | `BUCKET_NAME` | `vector-indexes` | Bucket holding vector indexes |
/// | `OBJECT_STORE_PATH` | `./data` | Root directory of the object store |
/// | `DB_MAX_CONNECTIONS` | `10` | Postgres pool size |
/// | `MAX_RECEIVE_COUNT` | `5` | Deliveries before dead-lettering |
/// | `WORKER_ENABLED` | `true` | Run the queue workers in-process |
/// | `WORKER_POLL_INTERVAL_MS` | `1000` | Idle poll interval of the workers |
/// | `OLLAMA_BASE` | `http://localhost:11434` | Ollama endpoint |
/// | `OPENAI_BASE_URL` | `https://api.openai.com/v1` | OpenAI-compatible endpoint |
/// | `ANTHROPIC_BASE_URL` | `https://api.anthropic.com/v1` | Anthropic endpoint |
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub use_local_store: bool,
    pub write_queue: String,
    pub reindex_queue: String,
    pub dead_letter_queue: String,
    pub bucket: String,
    pub object_store_path: PathBuf,
    pub max_receive_count: u32,
    pub worker_enabled: bool,
    pub worker_poll_interval_ms: u64,
    pub ollama_url: String,
    pub openai_url: String,
    pub anthropic_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/rocketnotes".to_string(),
            db_max_connections: defaults::DB_MAX_CONNECTIONS,
            use_local_store: false,
            write_queue: defaults::WRITE_QUEUE.to_string(),
            reindex_queue: defaults::REINDEX_QUEUE.to_string(),
            dead_letter_queue: defaults::DEAD_LETTER_QUEUE.to_string(),
            bucket: defaults::VECTOR_BUCKET.to_string(),
            object_store_path: PathBuf::from(defaults::OBJECT_STORE_PATH),
            max_receive_count: defaults::MAX_RECEIVE_COUNT,
            worker_enabled: true,
            worker_poll_interval_ms: defaults::WORKER_POLL_INTERVAL_MS,
            ollama_url: defaults::OLLAMA_URL.to_string(),
            openai_url: defaults::OPENAI_URL.to_string(),
            anthropic_url: defaults::ANTHROPIC_URL.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base = Self::default();
        let string = |key: &str, fallback: String| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(fallback)
        };

        let flag = |key: &str, fallback: bool| {
            lookup(key)
                .map(|v| matches!(v.trim(), "true" | "1"))
                .unwrap_or(fallback)
        };

        let db_max_connections = lookup("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(base.db_max_connections)
            .max(1);

        let max_receive_count = lookup("MAX_RECEIVE_COUNT")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(base.max_receive_count)
            .max(1);

        let worker_poll_interval_ms = lookup("WORKER_POLL_INTERVAL_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(base.worker_poll_interval_ms);

        Self {
            database_url: string("DATABASE_URL", base.database_url),
            db_max_connections,
            use_local_store: flag("USE_LOCAL_STORE", base.use_local_store),
            write_queue: string("WRITE_QUEUE", base.write_queue),
            reindex_queue: string("REINDEX_QUEUE", base.reindex_queue),
            dead_letter_queue: string("DEAD_LETTER_QUEUE", base.dead_letter_queue),
            bucket: string("BUCKET_NAME", base.bucket),
            object_store_path: lookup("OBJECT_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(base.object_store_path),
            max_receive_count,
            worker_enabled: flag("WORKER_ENABLED", base.worker_enabled),
            worker_poll_interval_ms,
            ollama_url: string("OLLAMA_BASE", base.ollama_url),
            openai_url: string("OPENAI_BASE_URL", base.openai_url),
            anthropic_url: string("ANTHROPIC_BASE_URL", base.anthropic_url),
        }
    }

    /// Configuration for tests and local development: in-memory stores.
    pub fn local() -> Self {
        Self {
            use_local_store: true,
            ..Self::default()
        }
    }
}
