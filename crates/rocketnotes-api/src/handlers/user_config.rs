//! User AI settings.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use rocketnotes_core::{Error, ReindexMessage, UserConfig};
use rocketnotes_inference::{route_embedding_model, route_llm_model};

use crate::error::ApiResult;
use crate::state::AppState;

/// Body of `POST /userConfig`. Not `Debug`: it carries API keys.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SaveUserConfigRequest {
    pub user_id: String,
    pub embedding_model: String,
    #[serde(default)]
    pub llm_model: String,
    #[serde(default)]
    pub open_ai_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub recreate_index: bool,
}

impl SaveUserConfigRequest {
    fn into_config(self) -> (UserConfig, bool) {
        let config = UserConfig {
            user_id: self.user_id,
            embedding_model: self.embedding_model,
            llm_model: self.llm_model,
            open_ai_api_key: self.open_ai_api_key.filter(|k| !k.trim().is_empty()),
            anthropic_api_key: self.anthropic_api_key.filter(|k| !k.trim().is_empty()),
        };
        (config, self.recreate_index)
    }
}

/// Stored settings as returned to clients. Keys are reported, never echoed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfigResponse {
    pub user_id: String,
    pub embedding_model: String,
    pub llm_model: String,
    pub has_open_ai_api_key: bool,
    pub has_anthropic_api_key: bool,
    /// Reindex Queue message id when a rebuild was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reindex_message_id: Option<String>,
}

impl UserConfigResponse {
    fn new(config: &UserConfig, reindex_message_id: Option<String>) -> Self {
        Self {
            user_id: config.user_id.clone(),
            embedding_model: config.embedding_model.clone(),
            llm_model: config.llm_model.clone(),
            has_open_ai_api_key: config.open_ai_api_key.is_some(),
            has_anthropic_api_key: config.anthropic_api_key.is_some(),
            reindex_message_id,
        }
    }
}

/// Upsert a user's settings and optionally request a full index rebuild.
///
/// # Returns
/// - 200 OK with the stored settings, secrets omitted
/// - 400 Bad Request for an empty user id or an unsupported model
pub async fn save_user_config(
    State(state): State<AppState>,
    body: Result<Json<SaveUserConfigRequest>, JsonRejection>,
) -> ApiResult<Json<UserConfigResponse>> {
    let Json(request) = body?;
    let (config, recreate) = request.into_config();

    if config.user_id.trim().is_empty() {
        return Err(Error::InvalidInput("userId must not be empty".into()).into());
    }
    route_embedding_model(&config.embedding_model)?;
    if !config.llm_model.is_empty() {
        route_llm_model(&config.llm_model)?;
    }

    state.db.user_configs.put(&config).await?;

    let reindex_message_id = if recreate {
        Some(
            state
                .publisher
                .publish(&ReindexMessage::recreate(&config.user_id))
                .await?,
        )
    } else {
        None
    };

    info!(
        subsystem = "api",
        component = "user_config",
        op = "save_user_config",
        user_id = %config.user_id,
        embedding_model = %config.embedding_model,
        recreate,
        "User config saved"
    );
    Ok(Json(UserConfigResponse::new(&config, reindex_message_id)))
}
