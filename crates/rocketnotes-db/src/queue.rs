//! At-least-once message queue on a PostgreSQL table.
//!
//! Each row is one message. A receive bumps `receive_count`, pushes
//! `visible_at` into the future and issues a new receipt; rows are claimed
//! with `FOR UPDATE SKIP LOCKED` so concurrent consumers never get the same
//! message while it is in flight.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use rocketnotes_core::{Error, MessageQueue, ReceivedMessage, Result};

/// PostgreSQL implementation of MessageQueue.
#[derive(Clone)]
pub struct PgMessageQueue {
    pool: Pool<Postgres>,
}

impl PgMessageQueue {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn parse_uuid(value: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Queue(format!("invalid {what} {value}: {e}")))
}

fn visibility_deadline(timeout: Duration) -> Result<chrono::DateTime<Utc>> {
    let timeout = chrono::Duration::from_std(timeout)
        .map_err(|e| Error::Queue(format!("visibility timeout out of range: {e}")))?;
    Ok(Utc::now() + timeout)
}

#[async_trait]
impl MessageQueue for PgMessageQueue {
    async fn send(&self, queue: &str, body: &str) -> Result<String> {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO queue_message (id, queue, body, visible_at, created_at)
             VALUES ($1, $2, $3, now(), now())",
        )
        .bind(id)
        .bind(queue)
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "queue",
            component = "postgres",
            op = "send",
            queue,
            message_id = %id,
            "Message enqueued"
        );
        Ok(id.to_string())
    }

    async fn receive(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<ReceivedMessage>> {
        let now = Utc::now();
        let hidden_until = visibility_deadline(visibility_timeout)?;
        let receipt = Uuid::new_v4();

        let row = sqlx::query(
            "UPDATE queue_message
             SET receive_count = receive_count + 1, visible_at = $3, receipt = $4
             WHERE id = (
                 SELECT id FROM queue_message
                 WHERE queue = $1 AND visible_at <= $2
                 ORDER BY created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING id, queue, body, receive_count",
        )
        .bind(queue)
        .bind(now)
        .bind(hidden_until)
        .bind(receipt)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| {
            let id: Uuid = row.get("id");
            let receive_count: i32 = row.get("receive_count");
            ReceivedMessage {
                message_id: id.to_string(),
                queue: row.get("queue"),
                body: row.get("body"),
                receive_count: receive_count.max(0) as u32,
                receipt: receipt.to_string(),
            }
        }))
    }

    async fn delete(&self, message: &ReceivedMessage) -> Result<()> {
        let id = parse_uuid(&message.message_id, "message id")?;
        let receipt = parse_uuid(&message.receipt, "receipt")?;

        let result = sqlx::query("DELETE FROM queue_message WHERE id = $1 AND receipt = $2")
            .bind(id)
            .bind(receipt)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            warn!(
                subsystem = "queue",
                component = "postgres",
                op = "delete",
                message_id = %message.message_id,
                "Receipt is stale; message was redelivered"
            );
            return Err(Error::Queue(format!(
                "receipt for message {} is no longer current",
                message.message_id
            )));
        }
        Ok(())
    }

    async fn dead_letter(
        &self,
        message: &ReceivedMessage,
        dead_letter_queue: &str,
        reason: &str,
    ) -> Result<()> {
        let id = parse_uuid(&message.message_id, "message id")?;
        let receipt = parse_uuid(&message.receipt, "receipt")?;

        let result = sqlx::query(
            "UPDATE queue_message
             SET queue = $3, dead_letter_reason = $4, receive_count = 0,
                 visible_at = now(), receipt = NULL
             WHERE id = $1 AND receipt = $2",
        )
        .bind(id)
        .bind(receipt)
        .bind(dead_letter_queue)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::Queue(format!(
                "receipt for message {} is no longer current",
                message.message_id
            )));
        }
        Ok(())
    }

    async fn depth(&self, queue: &str) -> Result<u64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM queue_message WHERE queue = $1")
            .bind(queue)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(count.0.max(0) as u64)
    }
}
