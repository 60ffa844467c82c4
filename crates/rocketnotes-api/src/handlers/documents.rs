//! Document HTTP handlers.
//!
//! Saves go through the Write Queue and are persisted by the Save Worker.
//! Reads, deletes and the sharing flag hit the Document Store directly.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use rocketnotes_core::{Document, Error, ReindexMessage, SaveDocumentMessage};
use rocketnotes_jobs::SaveDocumentHandler;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueuedResponse {
    pub message_id: String,
}

/// Query parameters for substring search.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstringSearchQuery {
    pub search_string: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SetPublicRequest {
    pub id: String,
    pub is_public: bool,
}

fn document_not_found(id: &str) -> ApiError {
    ApiError::NotFound(format!("Document {} not found", id))
}

/// Enqueue a document save.
///
/// # Returns
/// - 202 Accepted with the Write Queue message id
/// - 400 Bad Request if the body is not a valid save message or its
///   `documentTree` is malformed
pub async fn save_document(
    State(state): State<AppState>,
    body: Result<Json<SaveDocumentMessage>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<EnqueuedResponse>)> {
    let Json(message) = body?;
    message.document.validate()?;
    SaveDocumentHandler::prepare_tree(&message)?;

    let payload =
        serde_json::to_string(&message).map_err(|e| Error::Serialization(e.to_string()))?;
    let message_id = state
        .db
        .queue
        .send(&state.config.write_queue, &payload)
        .await?;

    info!(
        subsystem = "api",
        component = "documents",
        op = "save_document",
        document_id = %message.document.id,
        user_id = %message.document.user_id,
        message_id = %message_id,
        "Document save enqueued"
    );
    Ok((StatusCode::ACCEPTED, Json(EnqueuedResponse { message_id })))
}

/// Get a live document.
///
/// # Returns
/// - 200 OK with the document
/// - 404 Not Found if it does not exist or was deleted
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Document>> {
    match state.db.documents.get(&id).await? {
        Some(doc) if !doc.deleted => Ok(Json(doc)),
        _ => Err(document_not_found(&id)),
    }
}

/// Tombstone a document and, for AI-enabled users, request a reindex.
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let doc = state
        .db
        .documents
        .tombstone(&id, Utc::now())
        .await?
        .ok_or_else(|| document_not_found(&id))?;

    if state.db.user_configs.get(&doc.user_id).await?.is_some() {
        let message = ReindexMessage {
            delete_vectors: true,
            ..ReindexMessage::for_document(&doc.user_id, &doc.id)
        };
        state.publisher.publish(&message).await?;
    }

    info!(
        subsystem = "api",
        component = "documents",
        op = "delete_document",
        document_id = %doc.id,
        user_id = %doc.user_id,
        "Document deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Case-insensitive substring search over a user's live documents.
pub async fn search_documents(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    query: Result<Query<SubstringSearchQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Document>>> {
    let Query(query) = query?;
    let needle = query.search_string.to_lowercase();
    let docs = state.db.documents.search(&user_id, &needle).await?;
    Ok(Json(docs))
}

/// Set the sharing flag of a live document.
pub async fn save_document_public(
    State(state): State<AppState>,
    body: Result<Json<SetPublicRequest>, JsonRejection>,
) -> ApiResult<Json<Document>> {
    let Json(request) = body?;
    let doc = state
        .db
        .documents
        .set_public(&request.id, request.is_public)
        .await?
        .ok_or_else(|| document_not_found(&request.id))?;
    Ok(Json(doc))
}

/// Read a document someone has shared.
///
/// Private and deleted documents answer 404, same as missing ones.
pub async fn get_shared_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Document>> {
    match state.db.documents.get(&id).await? {
        Some(doc) if doc.is_public && !doc.deleted => Ok(Json(doc)),
        _ => Err(document_not_found(&id)),
    }
}
