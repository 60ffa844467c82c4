//! Document Store backed by PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use rocketnotes_core::{Document, DocumentRepository, Error, Result};

use crate::escape_like;

const DOCUMENT_COLUMNS: &str = "id, parent_id, user_id, title, content, search_content, \
                                last_modified, deleted, is_public";

/// PostgreSQL implementation of DocumentRepository.
#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: Pool<Postgres>,
}

impl PgDocumentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Document {
        Document {
            id: row.get("id"),
            parent_id: row.get("parent_id"),
            user_id: row.get("user_id"),
            title: row.get("title"),
            content: row.get("content"),
            search_content: row.get("search_content"),
            last_modified: row.get("last_modified"),
            deleted: row.get("deleted"),
            is_public: row.get("is_public"),
        }
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn upsert(&self, document: &Document) -> Result<bool> {
        // The WHERE on the conflict branch keeps a newer stored version.
        let applied = sqlx::query(
            "INSERT INTO document (id, parent_id, user_id, title, content, search_content,
                                   last_modified, deleted, is_public)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO UPDATE SET
                 parent_id = EXCLUDED.parent_id,
                 user_id = EXCLUDED.user_id,
                 title = EXCLUDED.title,
                 content = EXCLUDED.content,
                 search_content = EXCLUDED.search_content,
                 last_modified = EXCLUDED.last_modified,
                 deleted = EXCLUDED.deleted,
                 is_public = EXCLUDED.is_public
             WHERE document.last_modified <= EXCLUDED.last_modified
             RETURNING id",
        )
        .bind(&document.id)
        .bind(&document.parent_id)
        .bind(&document.user_id)
        .bind(&document.title)
        .bind(&document.content)
        .bind(&document.search_content)
        .bind(document.last_modified)
        .bind(document.deleted)
        .bind(document.is_public)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(applied.is_some())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }

    async fn list_active(&self, user_id: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document
             WHERE user_id = $1 AND deleted = FALSE
             ORDER BY last_modified DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn search(&self, user_id: &str, needle: &str) -> Result<Vec<Document>> {
        let pattern = format!("%{}%", escape_like(needle));
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document
             WHERE user_id = $1 AND deleted = FALSE
               AND search_content LIKE $2 ESCAPE '\\'
             ORDER BY last_modified DESC"
        ))
        .bind(user_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn tombstone(&self, id: &str, at: DateTime<Utc>) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "UPDATE document SET deleted = TRUE, last_modified = $2
             WHERE id = $1
             RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }

    async fn set_public(&self, id: &str, is_public: bool) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "UPDATE document SET is_public = $2
             WHERE id = $1 AND deleted = FALSE
             RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(is_public)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }
}
