//! Write-and-reindex pipeline on the in-memory stores with the mock backend.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rocketnotes_core::{
    Document, DocumentRepository, MessageQueue, ModelResolver, ObjectStore, PipelineConfig,
    ReindexMessage, SaveDocumentMessage, Tree, TreeNode, TreeRepository, UserConfig,
    UserConfigRepository, VectorIndex,
};
use rocketnotes_db::{
    Database, MemoryDocumentRepository, MemoryMessageQueue, MemoryObjectStore,
    MemoryTreeRepository, MemoryUserConfigRepository, MemoryZettelRepository,
};
use rocketnotes_inference::mock::{MockInferenceBackend, MockModelResolver};
use rocketnotes_jobs::{
    EmbeddingHandler, QueueWorker, ReindexPublisher, SaveDocumentHandler, WorkerConfig,
};

const LONG_CONTENT: &str =
    "# Ownership\nEvery value in Rust has a single owner.\n## Borrowing\nReferences borrow without taking ownership.";

struct Pipeline {
    config: PipelineConfig,
    documents: Arc<MemoryDocumentRepository>,
    trees: Arc<MemoryTreeRepository>,
    user_configs: Arc<MemoryUserConfigRepository>,
    queue: Arc<MemoryMessageQueue>,
    objects: Arc<MemoryObjectStore>,
    backend: MockInferenceBackend,
    save_worker: QueueWorker,
    embedding_worker: QueueWorker,
}

impl Pipeline {
    fn new() -> Self {
        Self::with_max_receive_count(5)
    }

    fn with_max_receive_count(max_receive_count: u32) -> Self {
        let config = PipelineConfig {
            max_receive_count,
            ..PipelineConfig::local()
        };
        let documents = Arc::new(MemoryDocumentRepository::new());
        let trees = Arc::new(MemoryTreeRepository::new());
        let user_configs = Arc::new(MemoryUserConfigRepository::new());
        let queue = Arc::new(MemoryMessageQueue::new());
        let objects = Arc::new(MemoryObjectStore::new());
        let db = Database {
            pool: None,
            documents: documents.clone(),
            trees: trees.clone(),
            user_configs: user_configs.clone(),
            zettels: Arc::new(MemoryZettelRepository::new()),
            queue: queue.clone(),
            objects: objects.clone(),
        };

        let backend = MockInferenceBackend::new();
        let resolver: Arc<dyn ModelResolver> = Arc::new(MockModelResolver::new(backend.clone()));

        let publisher = ReindexPublisher::new(db.queue.clone(), &config.reindex_queue);
        let save_worker = QueueWorker::new(
            db.queue.clone(),
            Arc::new(SaveDocumentHandler::new(&db, publisher)),
            WorkerConfig::write_queue(&config),
        );
        let embedding_worker = QueueWorker::new(
            db.queue.clone(),
            Arc::new(EmbeddingHandler::new(&db, resolver, &config.bucket).with_batch_size(2)),
            WorkerConfig::reindex_queue(&config),
        );

        Self {
            config,
            documents,
            trees,
            user_configs,
            queue,
            objects,
            backend,
            save_worker,
            embedding_worker,
        }
    }

    async fn opt_in(&self, user_id: &str, model: &str) {
        self.user_configs
            .put(&UserConfig::new(user_id, model))
            .await
            .unwrap();
    }

    async fn submit(&self, message: &SaveDocumentMessage) {
        self.queue
            .send(
                &self.config.write_queue,
                &serde_json::to_string(message).unwrap(),
            )
            .await
            .unwrap();
    }

    async fn reindex_messages(&self) -> Vec<ReindexMessage> {
        self.queue
            .messages(&self.config.reindex_queue)
            .await
            .iter()
            .map(|m| serde_json::from_str(&m.body).unwrap())
            .collect()
    }

    async fn index(&self, user_id: &str) -> Option<VectorIndex> {
        self.objects
            .get(&self.config.bucket, user_id)
            .await
            .unwrap()
            .map(|bytes| VectorIndex::from_bytes(&bytes).unwrap())
    }

    async fn drain_reindex(&self) {
        while self.embedding_worker.process_one().await.unwrap() {}
    }
}

fn save(id: &str, user_id: &str, title: &str, content: &str) -> SaveDocumentMessage {
    SaveDocumentMessage::new(Document::new(id, user_id, title, content))
}

#[tokio::test]
async fn test_save_persists_and_publishes_once() {
    let p = Pipeline::new();
    p.opt_in("u1", "Ollama-nomic-embed-text").await;

    p.submit(&save("d1", "u1", "Hello", "World")).await;
    assert!(p.save_worker.process_one().await.unwrap());

    let stored = p.documents.get("d1").await.unwrap().unwrap();
    assert_eq!(stored.search_content, "hello\nworld");
    assert_eq!(stored.parent_id, "root");
    assert!(!stored.deleted);
    assert!(stored.last_modified > chrono::DateTime::<Utc>::default());

    assert_eq!(
        p.reindex_messages().await,
        vec![ReindexMessage::for_document("u1", "d1")]
    );
    assert_eq!(p.queue.depth(&p.config.write_queue).await.unwrap(), 0);
}

#[tokio::test]
async fn test_save_without_user_config_does_not_publish() {
    let p = Pipeline::new();
    p.submit(&save("d1", "u1", "Hello", "World")).await;
    p.save_worker.process_one().await.unwrap();

    assert!(p.documents.get("d1").await.unwrap().is_some());
    assert!(p.reindex_messages().await.is_empty());
}

#[tokio::test]
async fn test_client_search_content_is_ignored() {
    let p = Pipeline::new();
    let mut message = save("d1", "u1", "Hello", "World");
    message.document.search_content = "spoofed".to_string();
    p.submit(&message).await;
    p.save_worker.process_one().await.unwrap();

    let stored = p.documents.get("d1").await.unwrap().unwrap();
    assert_eq!(stored.search_content, "hello\nworld");
}

#[tokio::test]
async fn test_unchanged_resave_does_not_publish_again() {
    let p = Pipeline::new();
    p.opt_in("u1", "Ollama-nomic-embed-text").await;

    let message = save("d1", "u1", "Hello", "World");
    p.submit(&message).await;
    p.save_worker.process_one().await.unwrap();
    let first = p.documents.get("d1").await.unwrap().unwrap();

    for _ in 0..3 {
        p.submit(&message).await;
        p.save_worker.process_one().await.unwrap();
        let replayed = p.documents.get("d1").await.unwrap().unwrap();
        assert_eq!(replayed.title, first.title);
        assert_eq!(replayed.content, first.content);
        assert_eq!(replayed.search_content, first.search_content);
        assert_eq!(replayed.parent_id, first.parent_id);
        assert_eq!(replayed.deleted, first.deleted);
        assert!(replayed.last_modified >= first.last_modified);
    }

    assert_eq!(p.documents.len().await, 1);
    assert_eq!(p.reindex_messages().await.len(), 1);
    assert_eq!(p.queue.depth(&p.config.write_queue).await.unwrap(), 0);
}

#[tokio::test]
async fn test_save_with_document_tree_stores_both() {
    let p = Pipeline::new();
    let mut tree = Tree::new("u1");
    tree.documents
        .push(TreeNode::new("d1", "Hello", "root").with_children(vec![TreeNode::new(
            "d2", "Child", "d1",
        )]));
    tree.pinned.push(TreeNode::new("d2", "Child", "d1"));
    tree.pinned.push(TreeNode::new("gone", "Gone", "root"));

    p.submit(&save("d1", "u1", "Hello", "World").with_tree(tree))
        .await;
    assert!(p.save_worker.process_one().await.unwrap());

    assert!(p.documents.get("d1").await.unwrap().is_some());
    let stored = p.trees.get("u1").await.unwrap().unwrap();
    assert_eq!(stored.documents[0].children[0].id, "d2");
    let pinned: Vec<&str> = stored.pinned.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(pinned, vec!["d2"]);
    assert!(p.queue.messages(&p.config.dead_letter_queue).await.is_empty());
}

#[tokio::test]
async fn test_invalid_document_tree_rejects_whole_save() {
    let p = Pipeline::new();
    let mut tree = Tree::new("u1");
    tree.documents.push(TreeNode::new("d1", "Hello", "root"));
    tree.trash.push(TreeNode::new("d1", "Hello", "root"));

    p.submit(&save("d1", "u1", "Hello", "World").with_tree(tree))
        .await;
    p.save_worker.process_one().await.unwrap();

    assert!(p.documents.get("d1").await.unwrap().is_none());
    assert!(p.trees.get("u1").await.unwrap().is_none());
    assert_eq!(p.queue.messages(&p.config.dead_letter_queue).await.len(), 1);
}

#[tokio::test]
async fn test_stale_save_does_not_replace_tree() {
    let p = Pipeline::new();
    let mut newer = Document::new("d1", "u1", "Hello", "newer");
    newer.normalize(Utc::now() + chrono::Duration::hours(1));
    p.documents.upsert(&newer).await.unwrap();
    let mut current = Tree::new("u1");
    current.documents.push(TreeNode::new("d1", "Hello", "root"));
    p.trees.put(&current).await.unwrap();

    p.submit(&save("d1", "u1", "Hello", "older").with_tree(Tree::new("u1")))
        .await;
    p.save_worker.process_one().await.unwrap();

    assert_eq!(p.documents.get("d1").await.unwrap().unwrap().content, "newer");
    assert_eq!(p.trees.get("u1").await.unwrap(), Some(current));
}

#[tokio::test]
async fn test_edit_move_and_delete_each_publish() {
    let p = Pipeline::new();
    p.opt_in("u1", "Ollama-nomic-embed-text").await;

    p.submit(&save("d1", "u1", "Hello", "World")).await;
    let mut edited = save("d1", "u1", "Hello", "World, again");
    p.submit(&edited).await;
    edited.document.parent_id = "d0".to_string();
    p.submit(&edited).await;
    edited.document.deleted = true;
    p.submit(&edited).await;

    while p.save_worker.process_one().await.unwrap() {}

    assert_eq!(p.reindex_messages().await.len(), 4);
    let stored = p.documents.get("d1").await.unwrap().unwrap();
    assert!(stored.deleted);
    assert_eq!(stored.parent_id, "d0");
}

#[tokio::test]
async fn test_recreate_flag_publishes_without_change() {
    let p = Pipeline::new();
    p.opt_in("u1", "Ollama-nomic-embed-text").await;

    let message = save("d1", "u1", "Hello", "World");
    p.submit(&message).await;
    p.submit(&SaveDocumentMessage {
        recreate_index: Some(true),
        ..message
    })
    .await;
    while p.save_worker.process_one().await.unwrap() {}

    let published = p.reindex_messages().await;
    assert_eq!(published.len(), 2);
    assert!(published[1].recreate_index);
}

#[tokio::test(start_paused = true)]
async fn test_redelivery_republishes_unchanged_document() {
    let p = Pipeline::new();
    p.opt_in("u1", "Ollama-nomic-embed-text").await;
    p.documents
        .upsert(&{
            let mut doc = Document::new("d1", "u1", "Hello", "World");
            doc.normalize(Utc::now());
            doc
        })
        .await
        .unwrap();

    // First delivery is claimed and never acknowledged.
    p.submit(&save("d1", "u1", "Hello", "World")).await;
    p.queue
        .receive(&p.config.write_queue, Duration::from_secs(30))
        .await
        .unwrap()
        .unwrap();
    tokio::time::advance(Duration::from_secs(31)).await;

    p.save_worker.process_one().await.unwrap();
    assert_eq!(p.reindex_messages().await.len(), 1);
}

#[tokio::test]
async fn test_malformed_message_is_dead_lettered() {
    let p = Pipeline::new();
    p.queue
        .send(&p.config.write_queue, "{\"document\": 42}")
        .await
        .unwrap();
    p.save_worker.process_one().await.unwrap();

    assert_eq!(p.queue.depth(&p.config.write_queue).await.unwrap(), 0);
    let dead = p.queue.messages(&p.config.dead_letter_queue).await;
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].body, "{\"document\": 42}");
    assert!(dead[0]
        .dead_letter_reason
        .as_deref()
        .unwrap()
        .contains("Malformed"));
}

#[tokio::test]
async fn test_document_without_user_is_dead_lettered() {
    let p = Pipeline::new();
    p.submit(&save("d1", "", "Hello", "World")).await;
    p.save_worker.process_one().await.unwrap();

    assert!(p.documents.is_empty().await);
    assert_eq!(p.queue.messages(&p.config.dead_letter_queue).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_store_outage_is_retried() {
    let p = Pipeline::new();
    p.opt_in("u1", "Ollama-nomic-embed-text").await;
    p.documents.set_unavailable(true);

    p.submit(&save("d1", "u1", "Hello", "World")).await;
    p.save_worker.process_one().await.unwrap();
    assert_eq!(p.queue.depth(&p.config.write_queue).await.unwrap(), 1);
    assert!(p.reindex_messages().await.is_empty());

    p.documents.set_unavailable(false);
    tokio::time::advance(Duration::from_secs(31)).await;
    p.save_worker.process_one().await.unwrap();

    assert!(p.documents.get("d1").await.unwrap().is_some());
    assert_eq!(p.queue.depth(&p.config.write_queue).await.unwrap(), 0);
    assert_eq!(p.reindex_messages().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_outage_ends_in_dead_letter_queue() {
    let p = Pipeline::with_max_receive_count(2);
    p.documents.set_unavailable(true);
    p.submit(&save("d1", "u1", "Hello", "World")).await;

    for _ in 0..3 {
        p.save_worker.process_one().await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
    }

    assert_eq!(p.queue.depth(&p.config.write_queue).await.unwrap(), 0);
    assert_eq!(p.queue.messages(&p.config.dead_letter_queue).await.len(), 1);
}

#[tokio::test]
async fn test_rebuild_indexes_live_documents() {
    let p = Pipeline::new();
    p.opt_in("u1", "Ollama-nomic-embed-text").await;

    p.submit(&save("d1", "u1", "Rust", LONG_CONTENT)).await;
    p.submit(&save("d2", "u1", "Short", "tiny")).await;
    p.submit(&save("d3", "u1", "Bread", "Flour, water, salt and a long wait."))
        .await;
    while p.save_worker.process_one().await.unwrap() {}
    p.drain_reindex().await;

    let index = p.index("u1").await.unwrap();
    assert_eq!(index.user_id, "u1");
    assert_eq!(index.model, "mock-embed");
    assert!(index.chunks.iter().all(|c| c.document_id != "d2"));
    let rust: Vec<_> = index
        .chunks
        .iter()
        .filter(|c| c.document_id == "d1")
        .collect();
    assert_eq!(rust.len(), 2);
    assert!(rust[0].content.starts_with("Rust\n# Ownership"));
    assert!(rust[1].content.starts_with("Rust\n## Borrowing"));
    assert!(index.chunks.iter().all(|c| c.vector.len() == index.dimension));
    assert_eq!(p.queue.depth(&p.config.reindex_queue).await.unwrap(), 0);
}

#[tokio::test]
async fn test_deleted_document_leaves_index() {
    let p = Pipeline::new();
    p.opt_in("u1", "Ollama-nomic-embed-text").await;

    p.submit(&save("d1", "u1", "Rust", LONG_CONTENT)).await;
    p.save_worker.process_one().await.unwrap();
    p.drain_reindex().await;
    assert!(!p.index("u1").await.unwrap().is_empty());

    let mut deleted = save("d1", "u1", "Rust", LONG_CONTENT);
    deleted.document.deleted = true;
    p.submit(&deleted).await;
    p.save_worker.process_one().await.unwrap();
    p.drain_reindex().await;

    // Empty corpus still overwrites the stale index.
    let index = p.index("u1").await.unwrap();
    assert!(index.is_empty());
}

#[tokio::test]
async fn test_rebuild_without_config_is_acknowledged() {
    let p = Pipeline::new();
    p.queue
        .send(
            &p.config.reindex_queue,
            &serde_json::to_string(&ReindexMessage::recreate("u1")).unwrap(),
        )
        .await
        .unwrap();
    p.drain_reindex().await;

    assert!(p.index("u1").await.is_none());
    assert_eq!(p.queue.depth(&p.config.reindex_queue).await.unwrap(), 0);
    assert!(p.queue.messages(&p.config.dead_letter_queue).await.is_empty());
}

#[tokio::test]
async fn test_unsupported_model_is_dead_lettered() {
    let p = Pipeline::new();
    p.opt_in("u1", "voyage-2").await;
    p.submit(&save("d1", "u1", "Rust", LONG_CONTENT)).await;
    p.save_worker.process_one().await.unwrap();
    p.drain_reindex().await;

    assert!(p.index("u1").await.is_none());
    let dead = p.queue.messages(&p.config.dead_letter_queue).await;
    assert_eq!(dead.len(), 1);
    assert!(dead[0]
        .dead_letter_reason
        .as_deref()
        .unwrap()
        .contains("voyage-2"));
}

#[tokio::test]
async fn test_backend_failure_keeps_message() {
    let p = Pipeline::new();
    p.opt_in("u1", "Ollama-nomic-embed-text").await;
    p.submit(&save("d1", "u1", "Rust", LONG_CONTENT)).await;
    p.save_worker.process_one().await.unwrap();

    p.backend.set_failing(true);
    p.embedding_worker.process_one().await.unwrap();

    assert!(p.index("u1").await.is_none());
    assert_eq!(p.queue.depth(&p.config.reindex_queue).await.unwrap(), 1);
}

#[tokio::test]
async fn test_embedding_batches() {
    let p = Pipeline::new();
    p.opt_in("u1", "Ollama-nomic-embed-text").await;
    for i in 0..3 {
        p.submit(&save(&format!("d{i}"), "u1", "Rust", LONG_CONTENT))
            .await;
    }
    while p.save_worker.process_one().await.unwrap() {}

    // One rebuild is enough to see batching.
    p.embedding_worker.process_one().await.unwrap();
    let embeds = p.backend.calls().len();
    assert_eq!(embeds, 3);
    assert_eq!(p.backend.embedded_text_count(), 6);
}
