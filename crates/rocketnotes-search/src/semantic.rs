//! Semantic Search reader.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use rocketnotes_core::{
    defaults, DocumentRepository, Error, ModelResolver, ObjectStore, Result, SearchHit,
    UserConfig, UserConfigRepository, VectorIndex,
};
use rocketnotes_db::Database;

use crate::similarity::rank_documents;

/// A search hit plus the chunk text that matched.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieved {
    pub hit: SearchHit,
    pub chunk: String,
}

/// Ranks a user's live documents against a query using their stored index.
#[derive(Clone)]
pub struct SemanticSearch {
    documents: Arc<dyn DocumentRepository>,
    user_configs: Arc<dyn UserConfigRepository>,
    objects: Arc<dyn ObjectStore>,
    resolver: Arc<dyn ModelResolver>,
    bucket: String,
}

impl SemanticSearch {
    pub fn new(db: &Database, resolver: Arc<dyn ModelResolver>, bucket: impl Into<String>) -> Self {
        Self {
            documents: db.documents.clone(),
            user_configs: db.user_configs.clone(),
            objects: db.objects.clone(),
            resolver,
            bucket: bucket.into(),
        }
    }

    pub fn resolver(&self) -> &Arc<dyn ModelResolver> {
        &self.resolver
    }

    /// The user's config, or `NotFound` if they never opted in.
    pub async fn user_config(&self, user_id: &str) -> Result<UserConfig> {
        self.user_configs
            .get(user_id)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))
    }

    pub async fn load_index(&self, user_id: &str) -> Result<Option<VectorIndex>> {
        match self.objects.get(&self.bucket, user_id).await? {
            Some(bytes) => Ok(Some(VectorIndex::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Top documents for `query`, at most one hit per document.
    pub async fn search(&self, user_id: &str, query: &str) -> Result<Vec<SearchHit>> {
        let config = self.user_config(user_id).await?;
        let retrieved = self
            .retrieve(&config, query, defaults::SEMANTIC_SEARCH_TOP_K)
            .await?;
        Ok(retrieved.into_iter().map(|r| r.hit).collect())
    }

    /// Up to `limit` live documents ranked against `query`.
    #[instrument(skip(self, config, query), fields(subsystem = "search", component = "semantic", op = "retrieve", user_id = %config.user_id))]
    pub async fn retrieve(
        &self,
        config: &UserConfig,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Retrieved>> {
        let start = Instant::now();
        let embedder = self.resolver.embedder(config)?;

        let Some(index) = self.load_index(&config.user_id).await? else {
            debug!("No vector index yet");
            return Ok(Vec::new());
        };
        if index.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = embedder
            .embed_texts(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("no embedding returned for query".to_string()))?;

        if query_vector.len() != index.dimension {
            warn!(
                index_model = %index.model,
                query_model = embedder.model_name(),
                index_dimension = index.dimension,
                query_dimension = query_vector.len(),
                "Index was built with a different model; recreate it"
            );
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(limit);
        for ranked in rank_documents(&index, &query_vector) {
            if results.len() >= limit {
                break;
            }
            // The index can lag behind deletes.
            let Some(document) = self.documents.get(&ranked.chunk.document_id).await? else {
                continue;
            };
            if document.deleted {
                continue;
            }
            results.push(Retrieved {
                hit: SearchHit {
                    document_id: document.id,
                    title: document.title,
                    content: document.content,
                    score: ranked.score,
                },
                chunk: ranked.chunk.content.clone(),
            });
        }

        info!(
            result_count = results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Semantic search complete"
        );
        Ok(results)
    }
}
