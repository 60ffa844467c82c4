//! Zettelkasten handlers.
//!
//! Zettels are short captures kept per user until they are archived into a
//! document. Archiving goes through the same save path as the Save Worker.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use rocketnotes_core::{Document, Zettel};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveZettelRequest {
    pub zettel: Zettel,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ArchiveZettelRequest {
    pub zettel: Zettel,
    #[serde(default)]
    pub recreate_index: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedResponse {
    pub document: Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reindex_message_id: Option<String>,
}

/// Store a zettel. A missing `created` is stamped with the current time.
pub async fn save_zettel(
    State(state): State<AppState>,
    body: Result<Json<SaveZettelRequest>, JsonRejection>,
) -> ApiResult<Json<Zettel>> {
    let Json(SaveZettelRequest { mut zettel }) = body?;
    zettel.validate()?;
    if zettel.created == DateTime::<Utc>::default() {
        zettel.created = Utc::now();
    }
    state.db.zettels.put(&zettel).await?;

    info!(
        subsystem = "api",
        component = "zettels",
        op = "save_zettel",
        zettel_id = %zettel.id,
        user_id = %zettel.user_id,
        "Zettel saved"
    );
    Ok(Json(zettel))
}

/// A user's zettels, oldest first.
pub async fn get_zettelkasten(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<Zettel>>> {
    Ok(Json(state.db.zettels.list(&user_id).await?))
}

pub async fn delete_zettel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .db
        .zettels
        .delete(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Zettel {} not found", id)))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Append a zettel to a document and save it synchronously.
///
/// # Returns
/// - 200 OK with the saved document and the reindex message id, if any
/// - 400 Bad Request if the zettel belongs to another user
/// - 404 Not Found if the document does not exist or was deleted
pub async fn archive_zettel(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    body: Result<Json<ArchiveZettelRequest>, JsonRejection>,
) -> ApiResult<Json<ArchivedResponse>> {
    let Json(request) = body?;
    request.zettel.validate()?;

    let outcome = state
        .saver
        .archive_zettel(&document_id, &request.zettel, request.recreate_index)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Document {} not found", document_id)))?;
    let document = state
        .db
        .documents
        .get(&document_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Document {} not found", document_id)))?;

    info!(
        subsystem = "api",
        component = "zettels",
        op = "archive_zettel",
        zettel_id = %request.zettel.id,
        document_id = %document_id,
        stored = outcome.stored,
        "Zettel archived"
    );
    Ok(Json(ArchivedResponse {
        document,
        reindex_message_id: outcome.reindex_message_id,
    }))
}
