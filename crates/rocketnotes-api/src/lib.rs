//! # rocketnotes-api
//!
//! HTTP surface for rocketnotes and the process that hosts the pipeline
//! workers next to it.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `POST /saveDocument` | enqueue on the Write Queue |
//! | `GET`, `DELETE /document/:id` | read, tombstone |
//! | `GET /documents/:userId/search` | substring search |
//! | `POST /saveDocumentPublic`, `GET /sharedDocument/:id` | sharing |
//! | `POST /saveDocumentTree`, `GET /documentTree/:userId` | trees |
//! | `POST /saveZettel`, `GET /zettelkasten/:userId`, `DELETE /zettel/:id` | zettels |
//! | `POST /archiveZettel/:documentId` | append a zettel to a document |
//! | `POST /userConfig` | AI settings |
//! | `POST /semanticSearch`, `POST /chat` | readers |
//! | `GET /health` | liveness |

pub mod error;
pub mod handlers;
pub mod state;
pub mod telemetry;
pub mod workers;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use rocketnotes_core::defaults;

pub use error::{ApiError, ApiResult};
pub use state::{AppState, ServerConfig};

use handlers::{documents, readers, trees, user_config, zettels};

/// Request ids are UUIDv7 so they sort by arrival.
#[derive(Clone, Copy, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Build the application router with its middleware stack.
pub fn router(state: AppState, server: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(server.allowed_origins.clone()))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handlers::health_check))
        // Documents
        .route("/saveDocument", post(documents::save_document))
        .route(
            "/document/:id",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/documents/:user_id/search", get(documents::search_documents))
        .route("/saveDocumentPublic", post(documents::save_document_public))
        .route("/sharedDocument/:id", get(documents::get_shared_document))
        // Trees
        .route("/saveDocumentTree", post(trees::save_document_tree))
        .route("/documentTree/:user_id", get(trees::get_document_tree))
        // Zettelkasten
        .route("/saveZettel", post(zettels::save_zettel))
        .route("/zettelkasten/:user_id", get(zettels::get_zettelkasten))
        .route("/zettel/:id", delete(zettels::delete_zettel))
        .route("/archiveZettel/:document_id", post(zettels::archive_zettel))
        // AI
        .route("/userConfig", post(user_config::save_user_config))
        .route("/semanticSearch", post(readers::semantic_search))
        .route("/chat", post(readers::chat))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(defaults::MAX_BODY_BYTES))
        .with_state(state)
}
