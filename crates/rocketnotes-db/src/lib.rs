//! # rocketnotes-db
//!
//! Persistence layer for rocketnotes.
//!
//! This crate provides:
//! - Connection pool management
//! - PostgreSQL Document Store, Tree Store, UserConfig store and Zettel store
//! - An at-least-once message queue on PostgreSQL
//! - A filesystem object store with atomic replace
//! - In-memory versions of all of the above for `USE_LOCAL_STORE`
//!
//! ## Example
//!
//! ```rust,ignore
//! use rocketnotes_db::Database;
//! use rocketnotes_core::PipelineConfig;
//!
//! let config = PipelineConfig::from_env();
//! let db = Database::connect(&config).await?;
//! db.migrate().await?;
//! let doc = db.documents.get("d1").await?;
//! ```

pub mod documents;
pub mod memory;
pub mod object_store;
pub mod pool;
pub mod queue;
pub mod trees;
pub mod user_configs;
pub mod zettels;

use std::sync::Arc;

use tracing::info;

// Re-export core types
pub use rocketnotes_core::*;

pub use documents::PgDocumentRepository;
pub use memory::{
    MemoryDocumentRepository, MemoryMessageQueue, MemoryObjectStore, MemoryTreeRepository,
    MemoryUserConfigRepository, MemoryZettelRepository, QueuedMessage,
};
pub use object_store::FilesystemObjectStore;
pub use pool::{create_pool, log_pool_metrics, PoolConfig};
pub use queue::PgMessageQueue;
pub use trees::PgTreeRepository;
pub use user_configs::PgUserConfigRepository;
pub use zettels::PgZettelRepository;

/// Escape LIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Every store the pipeline touches, behind trait objects.
#[derive(Clone)]
pub struct Database {
    /// Present when backed by PostgreSQL.
    pub pool: Option<sqlx::Pool<sqlx::Postgres>>,
    pub documents: Arc<dyn DocumentRepository>,
    pub trees: Arc<dyn TreeRepository>,
    pub user_configs: Arc<dyn UserConfigRepository>,
    pub zettels: Arc<dyn ZettelRepository>,
    pub queue: Arc<dyn MessageQueue>,
    pub objects: Arc<dyn ObjectStore>,
}

impl Database {
    /// PostgreSQL stores and queue on `pool`, objects under `object_store_path`.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>, objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            documents: Arc::new(PgDocumentRepository::new(pool.clone())),
            trees: Arc::new(PgTreeRepository::new(pool.clone())),
            user_configs: Arc::new(PgUserConfigRepository::new(pool.clone())),
            zettels: Arc::new(PgZettelRepository::new(pool.clone())),
            queue: Arc::new(PgMessageQueue::new(pool.clone())),
            objects,
            pool: Some(pool),
        }
    }

    /// In-memory stores, queue and object store.
    pub fn local() -> Self {
        Self {
            pool: None,
            documents: Arc::new(MemoryDocumentRepository::new()),
            trees: Arc::new(MemoryTreeRepository::new()),
            user_configs: Arc::new(MemoryUserConfigRepository::new()),
            zettels: Arc::new(MemoryZettelRepository::new()),
            queue: Arc::new(MemoryMessageQueue::new()),
            objects: Arc::new(MemoryObjectStore::new()),
        }
    }

    /// Open the stores selected by `config.use_local_store`.
    pub async fn connect(config: &PipelineConfig) -> Result<Self> {
        if config.use_local_store {
            info!(
                subsystem = "db",
                component = "database",
                op = "connect",
                "Using in-memory local store"
            );
            return Ok(Self::local());
        }

        let pool = create_pool(&config.database_url, PoolConfig::from_pipeline(config)).await?;
        log_pool_metrics(&pool);
        let objects = FilesystemObjectStore::new(&config.object_store_path);
        objects.validate(&config.bucket).await?;
        Ok(Self::new(pool, Arc::new(objects)))
    }

    /// Run pending migrations. A no-op on the local store.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        if let Some(pool) = &self.pool {
            sqlx::migrate!("../../migrations")
                .run(pool)
                .await
                .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        }
        Ok(())
    }
}
