//! Tree Store backed by PostgreSQL. One JSONB row per user.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{Pool, Postgres};

use rocketnotes_core::{Error, Result, Tree, TreeRepository};

/// PostgreSQL implementation of TreeRepository.
#[derive(Clone)]
pub struct PgTreeRepository {
    pool: Pool<Postgres>,
}

impl PgTreeRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TreeRepository for PgTreeRepository {
    async fn get(&self, user_id: &str) -> Result<Option<Tree>> {
        let row: Option<(Json<Tree>,)> =
            sqlx::query_as("SELECT tree FROM document_tree WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;

        Ok(row.map(|(tree,)| tree.0))
    }

    async fn put(&self, tree: &Tree) -> Result<()> {
        sqlx::query(
            "INSERT INTO document_tree (user_id, tree, updated_at)
             VALUES ($1, $2, now())
             ON CONFLICT (user_id) DO UPDATE SET tree = EXCLUDED.tree, updated_at = now()",
        )
        .bind(&tree.id)
        .bind(Json(tree))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }
}
