//! Chat reader: answers a question from the user's own notes.

use tracing::{info, instrument};

use rocketnotes_core::{defaults, ChatAnswer, Result};

use crate::semantic::{Retrieved, SemanticSearch};

/// System context built from retrieved chunks.
pub fn build_context(retrieved: &[Retrieved]) -> String {
    if retrieved.is_empty() {
        return String::new();
    }
    let passages: Vec<&str> = retrieved.iter().map(|r| r.chunk.as_str()).collect();
    format!(
        "Use the following notes as context.\n\n{}",
        passages.join("\n\n---\n\n")
    )
}

/// The user message sent to the model.
pub fn build_prompt(question: &str) -> String {
    format!("{}{}", defaults::CHAT_PROMPT_PREFIX, question)
}

/// Retrieval-augmented chat over a user's vector index.
#[derive(Clone)]
pub struct ChatEngine {
    search: SemanticSearch,
    top_k: usize,
}

impl ChatEngine {
    pub fn new(search: SemanticSearch) -> Self {
        Self {
            search,
            top_k: defaults::CHAT_CONTEXT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[instrument(skip(self, question), fields(subsystem = "search", component = "chat", op = "chat", user_id = %user_id, prompt_len = question.len()))]
    pub async fn chat(&self, user_id: &str, question: &str) -> Result<ChatAnswer> {
        let config = self.search.user_config(user_id).await?;
        // Resolve before retrieval so a bad llm setting fails fast.
        let model = self.search.resolver().chat_model(&config)?;

        let retrieved = self.search.retrieve(&config, question, self.top_k).await?;
        let answer = model
            .generate_with_system(&build_context(&retrieved), &build_prompt(question))
            .await?;

        info!(
            model = model.model_name(),
            result_count = retrieved.len(),
            "Chat answered"
        );
        Ok(ChatAnswer {
            answer,
            sources: retrieved.into_iter().map(|r| r.hit).collect(),
        })
    }
}
