//! In-process pipeline workers.

use std::sync::Arc;

use tracing::info;

use rocketnotes_core::{ModelResolver, PipelineConfig};
use rocketnotes_db::Database;
use rocketnotes_jobs::{
    EmbeddingHandler, QueueWorker, ReindexPublisher, SaveDocumentHandler, WorkerConfig,
    WorkerHandle,
};

/// Start the Save Worker and the Embedding Worker.
///
/// Returns no handles when `WORKER_ENABLED=false`.
pub fn start_workers(
    db: &Database,
    config: &PipelineConfig,
    resolver: Arc<dyn ModelResolver>,
) -> Vec<WorkerHandle> {
    if !config.worker_enabled {
        info!(
            subsystem = "api",
            component = "workers",
            "Workers disabled by WORKER_ENABLED"
        );
        return Vec::new();
    }

    let publisher = ReindexPublisher::new(db.queue.clone(), &config.reindex_queue);
    let save = QueueWorker::new(
        db.queue.clone(),
        Arc::new(SaveDocumentHandler::new(db, publisher)),
        WorkerConfig::write_queue(config),
    );
    let embed = QueueWorker::new(
        db.queue.clone(),
        Arc::new(EmbeddingHandler::new(db, resolver, &config.bucket)),
        WorkerConfig::reindex_queue(config),
    );

    vec![save.start(), embed.start()]
}
