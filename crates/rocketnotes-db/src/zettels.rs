//! Zettel store backed by PostgreSQL.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};

use rocketnotes_core::{Error, Result, Zettel, ZettelRepository};

/// PostgreSQL implementation of ZettelRepository.
#[derive(Clone)]
pub struct PgZettelRepository {
    pool: Pool<Postgres>,
}

impl PgZettelRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn zettel_from_row(row: &PgRow) -> Zettel {
    Zettel {
        id: row.get("id"),
        user_id: row.get("user_id"),
        content: row.get("content"),
        created: row.get("created"),
    }
}

#[async_trait]
impl ZettelRepository for PgZettelRepository {
    async fn put(&self, zettel: &Zettel) -> Result<()> {
        sqlx::query(
            "INSERT INTO zettel (id, user_id, content, created)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET
                 user_id = EXCLUDED.user_id,
                 content = EXCLUDED.content,
                 created = EXCLUDED.created",
        )
        .bind(&zettel.id)
        .bind(&zettel.user_id)
        .bind(&zettel.content)
        .bind(zettel.created)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<Zettel>> {
        let rows = sqlx::query(
            "SELECT id, user_id, content, created FROM zettel
             WHERE user_id = $1
             ORDER BY created, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(zettel_from_row).collect())
    }

    async fn delete(&self, id: &str) -> Result<Option<Zettel>> {
        let row = sqlx::query(
            "DELETE FROM zettel WHERE id = $1
             RETURNING id, user_id, content, created",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(zettel_from_row))
    }
}
