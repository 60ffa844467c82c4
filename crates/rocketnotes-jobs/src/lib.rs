//! # rocketnotes-jobs
//!
//! Queue workers for the rocketnotes write and reindex pipeline.
//!
//! This crate provides:
//! - A generic at-least-once queue worker with visibility timeouts,
//!   a max receive count and dead-letter routing
//! - The Save Worker, which persists documents from the Write Queue
//! - The Embedding Worker, which rebuilds vector indexes from the Reindex Queue
//! - Worker events via broadcast channels and graceful shutdown
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rocketnotes_jobs::{QueueWorker, ReindexPublisher, SaveDocumentHandler, WorkerConfig};
//!
//! let publisher = ReindexPublisher::new(db.queue.clone(), &config.reindex_queue);
//! let handler = SaveDocumentHandler::new(&db, publisher);
//! let worker = QueueWorker::new(
//!     db.queue.clone(),
//!     Arc::new(handler),
//!     WorkerConfig::write_queue(&config),
//! );
//!
//! let handle = worker.start();
//! // ...
//! handle.stop().await?;
//! ```

pub mod embedding;
pub mod handler;
pub mod publish;
pub mod save_document;
pub mod worker;

pub use embedding::{EmbeddingHandler, RebuildOutcome};
pub use handler::{HandlerResult, MessageContext, MessageHandler};
pub use publish::ReindexPublisher;
pub use save_document::{SaveDocumentHandler, SaveOutcome};
pub use worker::{QueueWorker, WorkerConfig, WorkerEvent, WorkerHandle};
