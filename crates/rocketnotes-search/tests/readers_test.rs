//! Semantic search and chat against hand-built indexes.

use std::sync::Arc;

use chrono::Utc;
use rocketnotes_core::{
    defaults, Document, DocumentRepository, Error, IndexedChunk, ObjectStore, UserConfig,
    UserConfigRepository, VectorIndex,
};
use rocketnotes_db::Database;
use rocketnotes_inference::mock::{MockCall, MockInferenceBackend, MockModelResolver};
use rocketnotes_search::{ChatEngine, SemanticSearch};

const BUCKET: &str = "vector-indexes";

struct Fixture {
    db: Database,
    backend: MockInferenceBackend,
    search: SemanticSearch,
}

impl Fixture {
    async fn new() -> Self {
        let db = Database::local();
        let backend = MockInferenceBackend::new().with_response("## Answer");
        let search = SemanticSearch::new(
            &db,
            Arc::new(MockModelResolver::new(backend.clone())),
            BUCKET,
        );
        db.user_configs
            .put(&UserConfig::new("u1", "Ollama-nomic-embed-text").with_llm_model("Ollama-llama3"))
            .await
            .unwrap();
        Self { db, backend, search }
    }

    /// Store documents and an index with one chunk per (document, text).
    async fn index(&self, documents: &[(&str, &str, &str)]) {
        let mut chunks = Vec::new();
        for (id, title, content) in documents {
            let mut doc = Document::new(*id, "u1", *title, *content);
            doc.normalize(Utc::now());
            self.db.documents.upsert(&doc).await.unwrap();
            let text = format!("{}\n{}", title, content);
            chunks.push(IndexedChunk {
                document_id: id.to_string(),
                title: title.to_string(),
                vector: self.backend.embed_one(&text),
                content: text,
            });
        }
        let index = VectorIndex {
            user_id: "u1".to_string(),
            model: "mock-embed".to_string(),
            dimension: chunks.first().map(|c| c.vector.len()).unwrap_or(0),
            built_at: Utc::now(),
            chunks,
        };
        self.db
            .objects
            .put(BUCKET, "u1", &index.to_bytes().unwrap())
            .await
            .unwrap();
    }
}

fn corpus() -> Vec<(&'static str, &'static str, &'static str)> {
    vec![
        ("d1", "Ownership", "rust ownership moves values between owners"),
        ("d2", "Borrowing", "rust borrowing lends references to values"),
        ("d3", "Bread", "flour water salt yeast and patience"),
        ("d4", "Lifetimes", "rust lifetimes bound how long references live"),
        ("d5", "Garden", "tomatoes need sun and water"),
    ]
}

#[tokio::test]
async fn test_search_returns_best_three() {
    let f = Fixture::new().await;
    f.index(&corpus()).await;

    let hits = f.search.search("u1", "rust ownership values").await.unwrap();
    assert_eq!(hits.len(), defaults::SEMANTIC_SEARCH_TOP_K);
    assert_eq!(hits[0].document_id, "d1");
    assert_eq!(hits[0].title, "Ownership");
    assert_eq!(hits[0].content, "rust ownership moves values between owners");
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn test_search_skips_documents_deleted_since_indexing() {
    let f = Fixture::new().await;
    f.index(&corpus()).await;
    f.db.documents.tombstone("d1", Utc::now()).await.unwrap();

    let hits = f.search.search("u1", "rust ownership values").await.unwrap();
    assert!(hits.iter().all(|h| h.document_id != "d1"));
    assert_eq!(hits.len(), 3);
}

#[tokio::test]
async fn test_search_with_duplicate_chunks_returns_each_document_once() {
    let f = Fixture::new().await;
    f.index(&[
        ("d1", "Ownership", "rust ownership"),
        ("d1", "Ownership", "rust ownership again"),
        ("d2", "Bread", "flour water"),
    ])
    .await;

    let hits = f.search.search("u1", "rust ownership").await.unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.document_id.as_str()).collect();
    assert_eq!(ids, vec!["d1", "d2"]);
}

#[tokio::test]
async fn test_search_without_index_is_empty() {
    let f = Fixture::new().await;
    assert!(f.search.search("u1", "anything").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_unknown_user() {
    let f = Fixture::new().await;
    let err = f.search.search("nobody", "anything").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(ref m) if m == "User not found"));
}

#[tokio::test]
async fn test_search_ignores_index_from_other_model() {
    let f = Fixture::new().await;
    let index = VectorIndex {
        user_id: "u1".into(),
        model: "older-model".into(),
        dimension: 3,
        built_at: Utc::now(),
        chunks: vec![IndexedChunk {
            document_id: "d1".into(),
            title: "t".into(),
            content: "t\nc".into(),
            vector: vec![1.0, 0.0, 0.0],
        }],
    };
    f.db.objects
        .put(BUCKET, "u1", &index.to_bytes().unwrap())
        .await
        .unwrap();
    assert!(f.search.search("u1", "t").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_grounds_answer_in_retrieved_notes() {
    let f = Fixture::new().await;
    f.index(&corpus()).await;
    let chat = ChatEngine::new(f.search.clone());

    let answer = chat.chat("u1", "how do rust references work").await.unwrap();
    assert_eq!(answer.answer, "## Answer");
    assert_eq!(answer.sources.len(), defaults::CHAT_CONTEXT_TOP_K);

    let generate = f
        .backend
        .calls()
        .into_iter()
        .find_map(|c| match c {
            MockCall::Generate { system, prompt } => Some((system, prompt)),
            MockCall::Embed(_) => None,
        })
        .unwrap();
    assert_eq!(
        generate.1,
        "Based on the context provided, answer the following question in valid markdown syntax: how do rust references work"
    );
    assert!(generate.0.contains("Borrowing\nrust borrowing lends references to values"));
}

#[tokio::test]
async fn test_chat_without_index_has_no_sources() {
    let f = Fixture::new().await;
    let chat = ChatEngine::new(f.search.clone());

    let answer = chat.chat("u1", "anything").await.unwrap();
    assert!(answer.sources.is_empty());
    assert!(matches!(
        &f.backend.calls()[..],
        [MockCall::Generate { system, .. }] if system.is_empty()
    ));
}

#[tokio::test]
async fn test_chat_rejects_unsupported_llm() {
    let f = Fixture::new().await;
    f.db.user_configs
        .put(&UserConfig::new("u2", "Ollama-nomic-embed-text").with_llm_model("mystery-model"))
        .await
        .unwrap();
    let chat = ChatEngine::new(f.search.clone());
    assert!(matches!(
        chat.chat("u2", "q").await,
        Err(Error::Config(_))
    ));
}
