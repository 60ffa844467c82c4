//! # rocketnotes-inference
//!
//! Embedding and chat backends for rocketnotes.
//!
//! This crate provides:
//! - Ollama backend (embeddings and chat)
//! - OpenAI-compatible backend (embeddings and chat)
//! - Anthropic backend (chat)
//! - [`ProviderRegistry`], which turns a user's model settings into backends
//! - A deterministic mock backend (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use rocketnotes_core::{ModelResolver, PipelineConfig, UserConfig};
//! use rocketnotes_inference::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new(&PipelineConfig::default());
//! let config = UserConfig::new("u1", "Ollama-nomic-embed-text");
//! let embedder = registry.embedder(&config).unwrap();
//! ```

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod provider;

// Mock inference backend for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use anthropic::AnthropicBackend;
pub use ollama::OllamaBackend;
pub use openai::{OpenAIBackend, OpenAIConfig};
pub use provider::{route_embedding_model, route_llm_model, ModelRoute, ProviderRegistry};
