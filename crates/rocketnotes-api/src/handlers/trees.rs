//! Document tree handlers.
//!
//! Tree saves are synchronous: the submitted tree replaces the stored one
//! wholesale once it passes structural validation.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use tracing::info;

use rocketnotes_core::{tree, Tree};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Validate and store a user's full tree.
///
/// # Returns
/// - 200 OK with the tree as stored (pinned references pruned)
/// - 400 Bad Request if the tree is structurally invalid
pub async fn save_document_tree(
    State(state): State<AppState>,
    body: Result<Json<Tree>, JsonRejection>,
) -> ApiResult<Json<Tree>> {
    let Json(submitted) = body?;
    let tree = tree::prepare_for_save(submitted)?;
    state.db.trees.put(&tree).await?;

    info!(
        subsystem = "api",
        component = "trees",
        op = "save_document_tree",
        user_id = %tree.id,
        top_level = tree.documents.len(),
        trash = tree.trash.len(),
        pinned = tree.pinned.len(),
        "Document tree saved"
    );
    Ok(Json(tree))
}

pub async fn get_document_tree(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Tree>> {
    state
        .db
        .trees
        .get(&user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No document tree for user {}", user_id)))
}
