//! # rocketnotes-search
//!
//! Read side of rocketnotes: semantic search and chat over the per-user
//! vector index the Embedding Worker maintains.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rocketnotes_search::{ChatEngine, SemanticSearch};
//!
//! let search = SemanticSearch::new(&db, resolver, &config.bucket);
//! let hits = search.search("u1", "ownership rules").await?;
//!
//! let chat = ChatEngine::new(search);
//! let answer = chat.chat("u1", "What is borrowing?").await?;
//! ```

pub mod chat;
pub mod semantic;
pub mod similarity;

pub use chat::{build_context, build_prompt, ChatEngine};
pub use semantic::{Retrieved, SemanticSearch};
pub use similarity::{cosine_similarity, rank_documents, RankedChunk};
