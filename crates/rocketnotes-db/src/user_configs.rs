//! UserConfig store backed by PostgreSQL.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use rocketnotes_core::{Error, Result, UserConfig, UserConfigRepository};

/// PostgreSQL implementation of UserConfigRepository.
#[derive(Clone)]
pub struct PgUserConfigRepository {
    pool: Pool<Postgres>,
}

impl PgUserConfigRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserConfigRepository for PgUserConfigRepository {
    async fn get(&self, user_id: &str) -> Result<Option<UserConfig>> {
        let row = sqlx::query(
            "SELECT user_id, embedding_model, llm_model, open_ai_api_key, anthropic_api_key
             FROM user_config WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| UserConfig {
            user_id: row.get("user_id"),
            embedding_model: row.get("embedding_model"),
            llm_model: row.get("llm_model"),
            open_ai_api_key: row.get("open_ai_api_key"),
            anthropic_api_key: row.get("anthropic_api_key"),
        }))
    }

    async fn put(&self, config: &UserConfig) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_config (user_id, embedding_model, llm_model,
                                      open_ai_api_key, anthropic_api_key, updated_at)
             VALUES ($1, $2, $3, $4, $5, now())
             ON CONFLICT (user_id) DO UPDATE SET
                 embedding_model = EXCLUDED.embedding_model,
                 llm_model = EXCLUDED.llm_model,
                 open_ai_api_key = EXCLUDED.open_ai_api_key,
                 anthropic_api_key = EXCLUDED.anthropic_api_key,
                 updated_at = now()",
        )
        .bind(&config.user_id)
        .bind(&config.embedding_model)
        .bind(&config.llm_model)
        .bind(&config.open_ai_api_key)
        .bind(&config.anthropic_api_key)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }
}
