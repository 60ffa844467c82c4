//! Embedding Worker: rebuilds a user's vector index from their live
//! documents whenever a Reindex Queue message arrives.
//!
//! The rebuild is always complete. Every message, whatever document it
//! names, produces a fresh index that overwrites the previous object, so
//! edits, moves and deletions all converge to the same result.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, instrument};

use rocketnotes_core::chunking::{chunk_text, is_substantial, split_markdown_sections};
use rocketnotes_core::{
    defaults, Document, DocumentRepository, EmbeddingBackend, Error, IndexedChunk, ModelResolver,
    ObjectStore, ReindexMessage, Result, UserConfigRepository, VectorIndex,
};
use rocketnotes_db::Database;

use crate::handler::{HandlerResult, MessageContext, MessageHandler};

/// What one rebuild did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildOutcome {
    /// `true` when the user has no config and nothing was written.
    pub skipped: bool,
    pub document_count: usize,
    pub chunk_count: usize,
}

/// Text that will be embedded, tied to its source document.
struct PendingChunk<'a> {
    document: &'a Document,
    text: String,
}

fn pending_chunks(documents: &[Document]) -> Vec<PendingChunk<'_>> {
    documents
        .iter()
        .filter(|d| is_substantial(&d.content))
        .flat_map(|document| {
            split_markdown_sections(&document.content)
                .into_iter()
                .map(move |section| PendingChunk {
                    document,
                    text: chunk_text(&document.title, &section),
                })
        })
        .collect()
}

pub struct EmbeddingHandler {
    documents: Arc<dyn DocumentRepository>,
    user_configs: Arc<dyn UserConfigRepository>,
    objects: Arc<dyn ObjectStore>,
    resolver: Arc<dyn ModelResolver>,
    bucket: String,
    batch_size: usize,
}

impl EmbeddingHandler {
    pub fn new(db: &Database, resolver: Arc<dyn ModelResolver>, bucket: impl Into<String>) -> Self {
        Self {
            documents: db.documents.clone(),
            user_configs: db.user_configs.clone(),
            objects: db.objects.clone(),
            resolver,
            bucket: bucket.into(),
            batch_size: defaults::EMBED_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Parse a Reindex Queue body.
    pub fn parse(body: &str) -> Result<ReindexMessage> {
        serde_json::from_str(body).map_err(|e| Error::MalformedMessage(e.to_string()))
    }

    /// Rebuild and store the index of `message.user_id`.
    #[instrument(skip(self, message), fields(subsystem = "jobs", component = "embedding_worker", op = "rebuild", user_id = %message.user_id))]
    pub async fn rebuild(&self, message: &ReindexMessage) -> Result<RebuildOutcome> {
        let start = Instant::now();

        let Some(config) = self.user_configs.get(&message.user_id).await? else {
            debug!("No user config, skipping rebuild");
            return Ok(RebuildOutcome {
                skipped: true,
                document_count: 0,
                chunk_count: 0,
            });
        };

        let embedder = self.resolver.embedder(&config)?;
        let documents = self.documents.list_active(&message.user_id).await?;
        let pending = pending_chunks(&documents);
        let vectors = self.embed_all(embedder.as_ref(), &pending).await?;

        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if vectors.iter().any(|v| v.len() != dimension) {
            return Err(Error::Embedding(format!(
                "{} returned vectors of differing dimension",
                embedder.model_name()
            )));
        }

        let chunks: Vec<IndexedChunk> = pending
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedChunk {
                document_id: chunk.document.id.clone(),
                title: chunk.document.title.clone(),
                content: chunk.text,
                vector,
            })
            .collect();

        let index = VectorIndex {
            user_id: message.user_id.clone(),
            model: embedder.model_name().to_string(),
            dimension,
            built_at: Utc::now(),
            chunks,
        };
        self.objects
            .put(&self.bucket, &message.user_id, &index.to_bytes()?)
            .await?;

        let outcome = RebuildOutcome {
            skipped: false,
            document_count: documents.len(),
            chunk_count: index.chunks.len(),
        };
        info!(
            document_id = message.document_id.as_deref().unwrap_or(""),
            recreate_index = message.recreate_index,
            delete_vectors = message.delete_vectors,
            document_count = outcome.document_count,
            chunk_count = outcome.chunk_count,
            model = %index.model,
            duration_ms = start.elapsed().as_millis() as u64,
            "Vector index rebuilt"
        );
        Ok(outcome)
    }

    async fn embed_all(
        &self,
        embedder: &dyn EmbeddingBackend,
        pending: &[PendingChunk<'_>],
    ) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(pending.len());
        for batch in pending.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = embedder.embed_texts(&texts).await?;
            if embedded.len() != texts.len() {
                return Err(Error::Embedding(format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    embedded.len()
                )));
            }
            vectors.extend(embedded);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl MessageHandler for EmbeddingHandler {
    fn name(&self) -> &'static str {
        "embedding"
    }

    async fn handle(&self, ctx: MessageContext) -> HandlerResult {
        let message = match Self::parse(ctx.body()) {
            Ok(message) => message,
            Err(e) => return HandlerResult::from_error(&e),
        };
        self.rebuild(&message).await.into()
    }
}
