//! Semantic search and chat endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;

use rocketnotes_core::{ChatAnswer, Error, SearchHit};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SemanticSearchRequest {
    pub user_id: String,
    pub search_string: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChatRequest {
    pub user_id: String,
    pub prompt: String,
}

fn require(value: &str, name: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{name} must not be empty")));
    }
    Ok(())
}

/// Top documents by similarity to `searchString`.
///
/// # Returns
/// - 200 OK with up to three hits, best first; `[]` before the first index build
/// - 404 Not Found if the user has no AI settings
pub async fn semantic_search(
    State(state): State<AppState>,
    body: Result<Json<SemanticSearchRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<SearchHit>>> {
    let Json(request) = body?;
    require(&request.user_id, "userId")?;
    let hits = state
        .search
        .search(&request.user_id, &request.search_string)
        .await?;
    Ok(Json(hits))
}

/// Answer `prompt` from the user's notes.
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Json<ChatAnswer>> {
    let Json(request) = body?;
    require(&request.user_id, "userId")?;
    require(&request.prompt, "prompt")?;
    let answer = state.chat.chat(&request.user_id, &request.prompt).await?;
    Ok(Json(answer))
}
