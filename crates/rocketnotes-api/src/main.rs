use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use rocketnotes_api::{router, state::AppState, telemetry, workers, ServerConfig};
use rocketnotes_core::{ModelResolver, PipelineConfig};
use rocketnotes_db::Database;
use rocketnotes_inference::ProviderRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _file_guard = telemetry::init_tracing();

    let config = PipelineConfig::from_env();
    let server = ServerConfig::from_env();

    let db = Database::connect(&config).await?;
    db.migrate().await?;
    info!(
        local_store = config.use_local_store,
        write_queue = %config.write_queue,
        reindex_queue = %config.reindex_queue,
        bucket = %config.bucket,
        "Stores ready"
    );

    let resolver: Arc<dyn ModelResolver> = Arc::new(ProviderRegistry::new(&config));
    let worker_handles = workers::start_workers(&db, &config, resolver.clone());

    let app = router(AppState::new(db, config, resolver), &server);

    let addr: SocketAddr = server.bind_addr().parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for handle in worker_handles {
        if let Err(e) = handle.stop().await {
            warn!(error = %e, "Worker did not stop cleanly");
        }
    }
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
