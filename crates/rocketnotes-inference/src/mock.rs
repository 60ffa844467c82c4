//! Mock inference backend for deterministic testing.
//!
//! Embeddings are bag-of-words hashes: texts sharing words point in similar
//! directions, so ranking tests behave like they would with a real model.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rocketnotes_inference::mock::{MockInferenceBackend, MockModelResolver};
//!
//! let backend = MockInferenceBackend::new().with_response("# Answer");
//! let resolver = MockModelResolver::new(backend.clone());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use rocketnotes_core::{
    EmbeddingBackend, Error, GenerationBackend, ModelResolver, Result, UserConfig, Vector,
};

use crate::provider::{route_embedding_model, route_llm_model};

/// Default mock vector dimension.
pub const MOCK_DIMENSION: usize = 64;

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Embed(Vec<String>),
    Generate { system: String, prompt: String },
}

/// Mock backend implementing both embedding and generation.
#[derive(Clone)]
pub struct MockInferenceBackend {
    dimension: usize,
    response: Arc<String>,
    failing: Arc<AtomicBool>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl Default for MockInferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInferenceBackend {
    pub fn new() -> Self {
        Self {
            dimension: MOCK_DIMENSION,
            response: Arc::new("Mock response".to_string()),
            failing: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension.max(1);
        self
    }

    /// Fixed text returned by every generation call.
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Arc::new(response.into());
        self
    }

    /// Make every call fail with a retryable error until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Calls made so far, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of texts embedded so far.
    pub fn embedded_text_count(&self) -> usize {
        self.calls()
            .iter()
            .map(|c| match c {
                MockCall::Embed(texts) => texts.len(),
                MockCall::Generate { .. } => 0,
            })
            .sum()
    }

    fn record(&self, call: MockCall) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }

    /// Deterministic embedding of `text`.
    pub fn embed_one(&self, text: &str) -> Vector {
        MockEmbeddingGenerator::generate(text, self.dimension)
    }
}

#[async_trait]
impl EmbeddingBackend for MockInferenceBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        self.record(MockCall::Embed(texts.to_vec()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Embedding("mock backend unavailable".to_string()));
        }
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

#[async_trait]
impl GenerationBackend for MockInferenceBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.record(MockCall::Generate {
            system: system.to_string(),
            prompt: prompt.to_string(),
        });
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Inference("mock backend unavailable".to_string()));
        }
        Ok(self.response.as_ref().clone())
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}

/// Resolver that validates model settings like the real one but always
/// hands out the same mock backend.
#[derive(Clone)]
pub struct MockModelResolver {
    backend: MockInferenceBackend,
}

impl MockModelResolver {
    pub fn new(backend: MockInferenceBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &MockInferenceBackend {
        &self.backend
    }
}

impl ModelResolver for MockModelResolver {
    fn embedder(&self, config: &UserConfig) -> Result<Arc<dyn EmbeddingBackend>> {
        route_embedding_model(&config.embedding_model)?;
        Ok(Arc::new(self.backend.clone()))
    }

    fn chat_model(&self, config: &UserConfig) -> Result<Arc<dyn GenerationBackend>> {
        route_llm_model(&config.llm_model)?;
        Ok(Arc::new(self.backend.clone()))
    }
}

/// Deterministic embedding generator.
pub struct MockEmbeddingGenerator;

impl MockEmbeddingGenerator {
    /// Hash each lowercase word into a bucket and normalize.
    pub fn generate(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0; dimension.max(1)];
        let len = vec.len();
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let idx = (fnv1a(&word.to_lowercase()) % len as u64) as usize;
            vec[idx] += 1.0;
        }
        Self::normalize(&mut vec);
        vec
    }

    fn normalize(vec: &mut [f32]) {
        let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for x in vec.iter_mut() {
                *x /= magnitude;
            }
        }
    }
}

fn fnv1a(text: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in text.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_embedding_is_deterministic_and_normalized() {
        let a = MockEmbeddingGenerator::generate("Hello world", 32);
        let b = MockEmbeddingGenerator::generate("hello WORLD", 32);
        assert_eq!(a, b);
        assert!((dot(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_shared_words_are_closer() {
        let query = MockEmbeddingGenerator::generate("rust ownership", 64);
        let near = MockEmbeddingGenerator::generate("notes on rust ownership rules", 64);
        let far = MockEmbeddingGenerator::generate("banana bread recipe", 64);
        assert!(dot(&query, &near) > dot(&query, &far));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let v = MockEmbeddingGenerator::generate("", 8);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_backend_records_calls() {
        let backend = MockInferenceBackend::new().with_response("answer");
        backend.embed_texts(&["a b".to_string()]).await.unwrap();
        assert_eq!(backend.generate_with_system("ctx", "q").await.unwrap(), "answer");

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[1],
            MockCall::Generate {
                system: "ctx".into(),
                prompt: "q".into()
            }
        );
        assert_eq!(backend.embedded_text_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_backend() {
        let backend = MockInferenceBackend::new();
        backend.set_failing(true);
        assert!(backend.embed_texts(&["x".to_string()]).await.is_err());
        backend.set_failing(false);
        assert!(backend.embed_texts(&["x".to_string()]).await.is_ok());
    }

    #[test]
    fn test_resolver_rejects_unknown_models() {
        let resolver = MockModelResolver::new(MockInferenceBackend::new());
        assert!(resolver.embedder(&UserConfig::new("u1", "voyage-2")).is_err());
        assert!(resolver
            .embedder(&UserConfig::new("u1", "Ollama-nomic-embed-text"))
            .is_ok());
    }
}
