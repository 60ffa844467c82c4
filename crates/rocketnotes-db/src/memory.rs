//! In-memory stores and queue.
//!
//! Selected with `USE_LOCAL_STORE=true` for local development and used by the
//! test suites. The queue keeps the same visibility-timeout and redelivery
//! behaviour as the Postgres one, driven by `tokio::time` so tests can pause
//! and advance the clock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use rocketnotes_core::{
    Document, DocumentRepository, Error, MessageQueue, ObjectStore, ReceivedMessage, Result,
    Tree, TreeRepository, UserConfig, UserConfigRepository, Zettel, ZettelRepository,
};

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Document Store held in a map.
#[derive(Default)]
pub struct MemoryDocumentRepository {
    documents: Mutex<HashMap<String, Document>>,
    unavailable: AtomicBool,
}

impl MemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the store were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Internal("document store unavailable".to_string()));
        }
        Ok(())
    }

    /// Number of stored records, tombstones included.
    pub async fn len(&self) -> usize {
        self.documents.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.lock().await.is_empty()
    }
}

#[async_trait]
impl DocumentRepository for MemoryDocumentRepository {
    async fn upsert(&self, document: &Document) -> Result<bool> {
        self.check_available()?;
        let mut documents = self.documents.lock().await;
        if let Some(stored) = documents.get(&document.id) {
            if stored.last_modified > document.last_modified {
                return Ok(false);
            }
        }
        documents.insert(document.id.clone(), document.clone());
        Ok(true)
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        self.check_available()?;
        Ok(self.documents.lock().await.get(id).cloned())
    }

    async fn list_active(&self, user_id: &str) -> Result<Vec<Document>> {
        self.check_available()?;
        let documents = self.documents.lock().await;
        let mut found: Vec<Document> = documents
            .values()
            .filter(|d| d.user_id == user_id && !d.deleted)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(found)
    }

    async fn search(&self, user_id: &str, needle: &str) -> Result<Vec<Document>> {
        let live = self.list_active(user_id).await?;
        Ok(live
            .into_iter()
            .filter(|d| d.search_content.contains(needle))
            .collect())
    }

    async fn tombstone(&self, id: &str, at: DateTime<Utc>) -> Result<Option<Document>> {
        self.check_available()?;
        let mut documents = self.documents.lock().await;
        Ok(documents.get_mut(id).map(|doc| {
            doc.deleted = true;
            doc.last_modified = at;
            doc.clone()
        }))
    }

    async fn set_public(&self, id: &str, is_public: bool) -> Result<Option<Document>> {
        self.check_available()?;
        let mut documents = self.documents.lock().await;
        Ok(documents
            .get_mut(id)
            .filter(|doc| !doc.deleted)
            .map(|doc| {
                doc.is_public = is_public;
                doc.clone()
            }))
    }
}

// =============================================================================
// TREES & USER CONFIGS
// =============================================================================

#[derive(Default)]
pub struct MemoryTreeRepository {
    trees: Mutex<HashMap<String, Tree>>,
}

impl MemoryTreeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TreeRepository for MemoryTreeRepository {
    async fn get(&self, user_id: &str) -> Result<Option<Tree>> {
        Ok(self.trees.lock().await.get(user_id).cloned())
    }

    async fn put(&self, tree: &Tree) -> Result<()> {
        self.trees
            .lock()
            .await
            .insert(tree.id.clone(), tree.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryUserConfigRepository {
    configs: Mutex<HashMap<String, UserConfig>>,
}

impl MemoryUserConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserConfigRepository for MemoryUserConfigRepository {
    async fn get(&self, user_id: &str) -> Result<Option<UserConfig>> {
        Ok(self.configs.lock().await.get(user_id).cloned())
    }

    async fn put(&self, config: &UserConfig) -> Result<()> {
        self.configs
            .lock()
            .await
            .insert(config.user_id.clone(), config.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryZettelRepository {
    zettels: Mutex<HashMap<String, Zettel>>,
}

impl MemoryZettelRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ZettelRepository for MemoryZettelRepository {
    async fn put(&self, zettel: &Zettel) -> Result<()> {
        self.zettels
            .lock()
            .await
            .insert(zettel.id.clone(), zettel.clone());
        Ok(())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<Zettel>> {
        let mut zettels: Vec<Zettel> = self
            .zettels
            .lock()
            .await
            .values()
            .filter(|z| z.user_id == user_id)
            .cloned()
            .collect();
        zettels.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        Ok(zettels)
    }

    async fn delete(&self, id: &str) -> Result<Option<Zettel>> {
        Ok(self.zettels.lock().await.remove(id))
    }
}

// =============================================================================
// QUEUE
// =============================================================================

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    body: String,
    receive_count: u32,
    visible_at: Instant,
    receipt: Option<String>,
    dead_letter_reason: Option<String>,
}

/// A message as held by [`MemoryMessageQueue`], for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    pub message_id: String,
    pub body: String,
    pub receive_count: u32,
    pub dead_letter_reason: Option<String>,
}

/// Message queue held in memory, one FIFO list per queue name.
#[derive(Default)]
pub struct MemoryMessageQueue {
    queues: Mutex<HashMap<String, Vec<StoredMessage>>>,
}

impl MemoryMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every message on `queue`, in flight or not.
    pub async fn messages(&self, queue: &str) -> Vec<QueuedMessage> {
        self.queues
            .lock()
            .await
            .get(queue)
            .map(|messages| {
                messages
                    .iter()
                    .map(|m| QueuedMessage {
                        message_id: m.id.clone(),
                        body: m.body.clone(),
                        receive_count: m.receive_count,
                        dead_letter_reason: m.dead_letter_reason.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn take_claimed(
        queues: &mut HashMap<String, Vec<StoredMessage>>,
        message: &ReceivedMessage,
    ) -> Result<StoredMessage> {
        let messages = queues.get_mut(&message.queue).ok_or_else(|| {
            Error::Queue(format!("unknown queue {}", message.queue))
        })?;
        let position = messages
            .iter()
            .position(|m| {
                m.id == message.message_id && m.receipt.as_deref() == Some(message.receipt.as_str())
            })
            .ok_or_else(|| {
                Error::Queue(format!(
                    "receipt for message {} is no longer current",
                    message.message_id
                ))
            })?;
        Ok(messages.remove(position))
    }
}

#[async_trait]
impl MessageQueue for MemoryMessageQueue {
    async fn send(&self, queue: &str, body: &str) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        self.queues
            .lock()
            .await
            .entry(queue.to_string())
            .or_default()
            .push(StoredMessage {
                id: id.clone(),
                body: body.to_string(),
                receive_count: 0,
                visible_at: Instant::now(),
                receipt: None,
                dead_letter_reason: None,
            });
        Ok(id)
    }

    async fn receive(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<ReceivedMessage>> {
        let now = Instant::now();
        let mut queues = self.queues.lock().await;
        let Some(messages) = queues.get_mut(queue) else {
            return Ok(None);
        };
        let Some(message) = messages.iter_mut().find(|m| m.visible_at <= now) else {
            return Ok(None);
        };

        let receipt = Uuid::new_v4().to_string();
        message.receive_count += 1;
        message.visible_at = now + visibility_timeout;
        message.receipt = Some(receipt.clone());

        Ok(Some(ReceivedMessage {
            message_id: message.id.clone(),
            queue: queue.to_string(),
            body: message.body.clone(),
            receive_count: message.receive_count,
            receipt,
        }))
    }

    async fn delete(&self, message: &ReceivedMessage) -> Result<()> {
        let mut queues = self.queues.lock().await;
        Self::take_claimed(&mut queues, message)?;
        Ok(())
    }

    async fn dead_letter(
        &self,
        message: &ReceivedMessage,
        dead_letter_queue: &str,
        reason: &str,
    ) -> Result<()> {
        let mut queues = self.queues.lock().await;
        let mut stored = Self::take_claimed(&mut queues, message)?;
        stored.receive_count = 0;
        stored.receipt = None;
        stored.visible_at = Instant::now();
        stored.dead_letter_reason = Some(reason.to_string());
        queues
            .entry(dead_letter_queue.to_string())
            .or_default()
            .push(stored);
        Ok(())
    }

    async fn depth(&self, queue: &str) -> Result<u64> {
        Ok(self
            .queues
            .lock()
            .await
            .get(queue)
            .map(|m| m.len() as u64)
            .unwrap_or(0))
    }
}

// =============================================================================
// OBJECT STORE
// =============================================================================

/// Object store held in a map keyed by `(bucket, key)`.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<()> {
        self.objects
            .lock()
            .await
            .insert((bucket.to_string(), key.to_string()), data.to_vec());
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.objects
            .lock()
            .await
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}
