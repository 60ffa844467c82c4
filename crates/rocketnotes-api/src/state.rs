//! Shared application state and process settings.

use std::sync::Arc;

use axum::http::HeaderValue;
use tracing::warn;

use rocketnotes_core::{defaults, ModelResolver, PipelineConfig};
use rocketnotes_db::Database;
use rocketnotes_jobs::{ReindexPublisher, SaveDocumentHandler};
use rocketnotes_search::{ChatEngine, SemanticSearch};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<PipelineConfig>,
    pub publisher: ReindexPublisher,
    /// Synchronous saves outside the Write Queue, such as zettel archiving.
    pub saver: Arc<SaveDocumentHandler>,
    pub search: SemanticSearch,
    pub chat: ChatEngine,
}

impl AppState {
    pub fn new(db: Database, config: PipelineConfig, resolver: Arc<dyn ModelResolver>) -> Self {
        let publisher = ReindexPublisher::new(db.queue.clone(), &config.reindex_queue);
        let saver = Arc::new(SaveDocumentHandler::new(&db, publisher.clone()));
        let search = SemanticSearch::new(&db, resolver, &config.bucket);
        let chat = ChatEngine::new(search.clone());
        Self {
            db,
            config: Arc::new(config),
            publisher,
            saver,
            search,
            chat,
        }
    }
}

/// HTTP bind address and CORS settings.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `HOST` | `0.0.0.0` | Bind address |
/// | `PORT` | `3000` | Bind port |
/// | `ALLOWED_ORIGINS` | `http://localhost:3000` | Comma-separated CORS origins |
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<HeaderValue>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::SERVER_HOST.to_string(),
            port: defaults::SERVER_PORT,
            allowed_origins: vec![HeaderValue::from_static("http://localhost:3000")],
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base = Self::default();
        let host = lookup("HOST")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(base.host);
        let port = lookup("PORT")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(base.port);
        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .map(|v| parse_allowed_origins(&v))
            .filter(|origins| !origins.is_empty())
            .unwrap_or(base.allowed_origins);
        Self {
            host,
            port,
            allowed_origins,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_allowed_origins(value: &str) -> Vec<HeaderValue> {
    value
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}
