//! Backend selection from a user's model settings.
//!
//! Model strings are the ones users pick in the settings page:
//!
//! | Setting | Example | Backend |
//! |---------|---------|---------|
//! | embedding | `text-embedding-3-small`, `text-embedding-ada-002` | OpenAI (needs `openAiApiKey`) |
//! | embedding | `Ollama-nomic-embed-text` | Ollama, model after the prefix |
//! | llm | `gpt-4o`, `gpt-3.5-turbo` | OpenAI (needs `openAiApiKey`) |
//! | llm | `claude-3-haiku-20240307` | Anthropic (needs `anthropicApiKey`) |
//! | llm | `Ollama-llama3` | Ollama, model after the prefix |

use std::sync::Arc;

use tracing::debug;

use rocketnotes_core::{
    EmbeddingBackend, Error, GenerationBackend, ModelResolver, PipelineConfig, Result, UserConfig,
};

use crate::anthropic::AnthropicBackend;
use crate::ollama::OllamaBackend;
use crate::openai::{OpenAIBackend, OpenAIConfig};

const OLLAMA_PREFIX: &str = "Ollama-";

const OPENAI_EMBED_MODELS: &[&str] = &[
    "text-embedding-ada-002",
    "text-embedding-3-small",
    "text-embedding-3-large",
];

/// Which provider serves a model, and the provider-side model name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelRoute {
    OpenAI(String),
    Anthropic(String),
    Ollama(String),
}

/// Route an embedding model setting.
pub fn route_embedding_model(model: &str) -> Result<ModelRoute> {
    if let Some(name) = model.strip_prefix(OLLAMA_PREFIX).filter(|n| !n.is_empty()) {
        return Ok(ModelRoute::Ollama(name.to_string()));
    }
    if OPENAI_EMBED_MODELS.contains(&model) {
        return Ok(ModelRoute::OpenAI(model.to_string()));
    }
    if model.trim().is_empty() {
        return Err(Error::Config("no embedding model configured".to_string()));
    }
    Err(Error::Config(format!("unsupported embedding model {model}")))
}

/// Route a chat model setting.
pub fn route_llm_model(model: &str) -> Result<ModelRoute> {
    if let Some(name) = model.strip_prefix(OLLAMA_PREFIX).filter(|n| !n.is_empty()) {
        return Ok(ModelRoute::Ollama(name.to_string()));
    }
    if model.starts_with("gpt-") {
        return Ok(ModelRoute::OpenAI(model.to_string()));
    }
    if model.starts_with("claude-") {
        return Ok(ModelRoute::Anthropic(model.to_string()));
    }
    if model.trim().is_empty() {
        return Err(Error::Config("no llm model configured".to_string()));
    }
    Err(Error::Config(format!("unsupported llm model {model}")))
}

fn required_key<'a>(key: &'a Option<String>, name: &str, model: &str) -> Result<&'a str> {
    key.as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| Error::Config(format!("{model} requires {name}")))
}

/// Builds real HTTP backends for a user's settings.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    ollama_url: String,
    openai_url: String,
    anthropic_url: String,
}

impl ProviderRegistry {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            ollama_url: config.ollama_url.clone(),
            openai_url: config.openai_url.clone(),
            anthropic_url: config.anthropic_url.clone(),
        }
    }

    fn openai(&self, api_key: &str, embed_model: &str, gen_model: &str) -> Result<OpenAIBackend> {
        OpenAIBackend::new(OpenAIConfig {
            base_url: self.openai_url.clone(),
            api_key: Some(api_key.to_string()),
            embed_model: embed_model.to_string(),
            gen_model: gen_model.to_string(),
            ..OpenAIConfig::default()
        })
    }
}

impl ModelResolver for ProviderRegistry {
    fn embedder(&self, config: &UserConfig) -> Result<Arc<dyn EmbeddingBackend>> {
        let route = route_embedding_model(&config.embedding_model)?;
        debug!(
            subsystem = "inference",
            component = "provider",
            op = "embedder",
            user_id = %config.user_id,
            route = ?route,
            "Resolved embedding backend"
        );
        match route {
            ModelRoute::OpenAI(model) => {
                let key = required_key(&config.open_ai_api_key, "openAiApiKey", &model)?;
                Ok(Arc::new(self.openai(key, &model, "")?))
            }
            ModelRoute::Ollama(model) => Ok(Arc::new(
                OllamaBackend::new(self.ollama_url.clone())?.with_embed_model(model),
            )),
            ModelRoute::Anthropic(model) => Err(Error::Config(format!(
                "{model} cannot produce embeddings"
            ))),
        }
    }

    fn chat_model(&self, config: &UserConfig) -> Result<Arc<dyn GenerationBackend>> {
        let route = route_llm_model(&config.llm_model)?;
        debug!(
            subsystem = "inference",
            component = "provider",
            op = "chat_model",
            user_id = %config.user_id,
            route = ?route,
            "Resolved chat backend"
        );
        match route {
            ModelRoute::OpenAI(model) => {
                let key = required_key(&config.open_ai_api_key, "openAiApiKey", &model)?;
                Ok(Arc::new(self.openai(key, "", &model)?))
            }
            ModelRoute::Anthropic(model) => {
                let key = required_key(&config.anthropic_api_key, "anthropicApiKey", &model)?;
                Ok(Arc::new(AnthropicBackend::new(
                    self.anthropic_url.clone(),
                    key,
                    model,
                )?))
            }
            ModelRoute::Ollama(model) => Ok(Arc::new(
                OllamaBackend::new(self.ollama_url.clone())?.with_gen_model(model),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_embedding_models() {
        assert_eq!(
            route_embedding_model("text-embedding-3-small").unwrap(),
            ModelRoute::OpenAI("text-embedding-3-small".into())
        );
        assert_eq!(
            route_embedding_model("Ollama-nomic-embed-text").unwrap(),
            ModelRoute::Ollama("nomic-embed-text".into())
        );
        assert!(matches!(
            route_embedding_model("voyage-2"),
            Err(Error::Config(_))
        ));
        assert!(route_embedding_model("").is_err());
        assert!(route_embedding_model("Ollama-").is_err());
    }

    #[test]
    fn test_route_llm_models() {
        assert_eq!(
            route_llm_model("gpt-4o").unwrap(),
            ModelRoute::OpenAI("gpt-4o".into())
        );
        assert_eq!(
            route_llm_model("claude-3-haiku-20240307").unwrap(),
            ModelRoute::Anthropic("claude-3-haiku-20240307".into())
        );
        assert_eq!(
            route_llm_model("Ollama-llama3").unwrap(),
            ModelRoute::Ollama("llama3".into())
        );
        assert!(route_llm_model("mistral").is_err());
    }

    #[test]
    fn test_openai_embedder_requires_key() {
        let registry = ProviderRegistry::new(&PipelineConfig::default());
        let config = UserConfig::new("u1", "text-embedding-3-small");
        let err = registry.embedder(&config).err().unwrap();
        assert!(err.to_string().contains("openAiApiKey"));

        let config = config.with_openai_key("sk-test");
        let backend = registry.embedder(&config).unwrap();
        assert_eq!(backend.model_name(), "text-embedding-3-small");
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let registry = ProviderRegistry::new(&PipelineConfig::default());
        let config = UserConfig::new("u1", "Ollama-nomic-embed-text").with_llm_model("Ollama-llama3");
        assert_eq!(
            registry.embedder(&config).unwrap().model_name(),
            "nomic-embed-text"
        );
        assert_eq!(registry.chat_model(&config).unwrap().model_name(), "llama3");
    }

    #[test]
    fn test_anthropic_chat_requires_key() {
        let registry = ProviderRegistry::new(&PipelineConfig::default());
        let config = UserConfig::new("u1", "Ollama-nomic-embed-text")
            .with_llm_model("claude-3-haiku-20240307");
        assert!(registry.chat_model(&config).is_err());

        let config = config.with_anthropic_key("sk-ant");
        assert_eq!(
            registry.chat_model(&config).unwrap().model_name(),
            "claude-3-haiku-20240307"
        );
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let registry = ProviderRegistry::new(&PipelineConfig::default());
        let config = UserConfig::new("u1", "text-embedding-ada-002").with_openai_key("  ");
        assert!(registry.embedder(&config).is_err());
    }
}
