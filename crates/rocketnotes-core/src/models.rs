//! Core data models for rocketnotes.
//!
//! Every type here crosses a wire or storage boundary, so field names are
//! camelCase in JSON. Queue bodies and request payloads reject unknown fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::defaults::ROOT_PARENT_ID;

// =============================================================================
// DOCUMENT TYPES
// =============================================================================

fn root_parent() -> String {
    ROOT_PARENT_ID.to_string()
}

/// A single note's persisted content and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Document {
    pub id: String,
    #[serde(default = "root_parent")]
    pub parent_id: String,
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Derived from title and content; whatever a client sends is discarded.
    #[serde(default)]
    pub search_content: String,
    #[serde(default)]
    pub last_modified: DateTime<Utc>,
    /// Tombstone flag. Deleted documents stay stored but are hidden from reads.
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub is_public: bool,
}

impl Document {
    /// Create a live document under the root.
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: root_parent(),
            user_id: user_id.into(),
            title: title.into(),
            content: content.into(),
            search_content: String::new(),
            last_modified: DateTime::<Utc>::default(),
            deleted: false,
            is_public: false,
        }
    }

    /// Lowercased `title + "\n" + content`, the text substring search runs on.
    pub fn compute_search_content(title: &str, content: &str) -> String {
        format!("{}\n{}", title, content).to_lowercase()
    }

    /// Recompute derived fields for a content-affecting write.
    pub fn normalize(&mut self, now: DateTime<Utc>) {
        self.search_content = Self::compute_search_content(&self.title, &self.content);
        self.last_modified = now;
    }

    /// Whether `self` differs from `stored` in anything the search index sees
    /// or in its placement and lifecycle.
    pub fn differs_from(&self, stored: &Document) -> bool {
        self.title != stored.title
            || self.content != stored.content
            || self.parent_id != stored.parent_id
            || self.deleted != stored.deleted
    }

    /// Check the fields a stored document cannot do without.
    pub fn validate(&self) -> crate::Result<()> {
        if self.id.trim().is_empty() {
            return Err(crate::Error::InvalidInput(
                "document id must not be empty".to_string(),
            ));
        }
        if self.user_id.trim().is_empty() {
            return Err(crate::Error::InvalidInput(format!(
                "document {} has no userId",
                self.id
            )));
        }
        Ok(())
    }
}

// =============================================================================
// TREE TYPES
// =============================================================================

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A node in a user's document hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TreeNode {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "root_parent")]
    pub parent: String,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent: parent.into(),
            pinned: false,
            deleted: false,
            last_modified: None,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<TreeNode>) -> Self {
        self.children = children;
        self
    }

    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    /// Depth-first visit of this node and all descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TreeNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// The per-user hierarchical arrangement of document references.
///
/// `documents` and `trash` own their nodes; `pinned` only references nodes
/// that live in `documents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Tree {
    /// Equal to the owning user's id.
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub documents: Vec<TreeNode>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub trash: Vec<TreeNode>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub pinned: Vec<TreeNode>,
}

impl Tree {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: user_id.into(),
            documents: Vec::new(),
            trash: Vec::new(),
            pinned: Vec::new(),
        }
    }
}

// =============================================================================
// USER CONFIG
// =============================================================================

/// A user's AI settings. Its presence is what opts the user into reindexing.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserConfig {
    pub user_id: String,
    pub embedding_model: String,
    #[serde(default)]
    pub llm_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_ai_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic_api_key: Option<String>,
}

impl UserConfig {
    pub fn new(user_id: impl Into<String>, embedding_model: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            embedding_model: embedding_model.into(),
            llm_model: String::new(),
            open_ai_api_key: None,
            anthropic_api_key: None,
        }
    }

    pub fn with_llm_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = model.into();
        self
    }

    pub fn with_openai_key(mut self, key: impl Into<String>) -> Self {
        self.open_ai_api_key = Some(key.into());
        self
    }

    pub fn with_anthropic_key(mut self, key: impl Into<String>) -> Self {
        self.anthropic_api_key = Some(key.into());
        self
    }
}

fn redact(secret: &Option<String>) -> &'static str {
    match secret {
        Some(_) => "<redacted>",
        None => "<unset>",
    }
}

impl fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserConfig")
            .field("user_id", &self.user_id)
            .field("embedding_model", &self.embedding_model)
            .field("llm_model", &self.llm_model)
            .field("open_ai_api_key", &redact(&self.open_ai_api_key))
            .field("anthropic_api_key", &redact(&self.anthropic_api_key))
            .finish()
    }
}

// =============================================================================
// ZETTELKASTEN
// =============================================================================

/// A short captured note waiting to be archived into a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Zettel {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created: DateTime<Utc>,
}

impl Zettel {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            content: content.into(),
            created: Utc::now(),
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.id.trim().is_empty() {
            return Err(crate::Error::InvalidInput(
                "zettel id must not be empty".to_string(),
            ));
        }
        if self.user_id.trim().is_empty() {
            return Err(crate::Error::InvalidInput(format!(
                "zettel {} has no userId",
                self.id
            )));
        }
        Ok(())
    }
}

// =============================================================================
// QUEUE MESSAGES
// =============================================================================

/// Write Queue body: a document the user saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SaveDocumentMessage {
    pub document: Document,
    /// The owner's hierarchy as edited alongside this save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_tree: Option<Tree>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recreate_index: Option<bool>,
}

impl SaveDocumentMessage {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            document_tree: None,
            recreate_index: None,
        }
    }

    pub fn with_tree(mut self, tree: Tree) -> Self {
        self.document_tree = Some(tree);
        self
    }

    pub fn recreate_requested(&self) -> bool {
        self.recreate_index == Some(true)
    }
}

/// Reindex Queue body: rebuild the vector index of `user_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReindexMessage {
    pub user_id: String,
    /// Document whose change triggered the rebuild, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default)]
    pub recreate_index: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub delete_vectors: bool,
}

impl ReindexMessage {
    pub fn for_document(user_id: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            document_id: Some(document_id.into()),
            recreate_index: false,
            delete_vectors: false,
        }
    }

    pub fn recreate(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            document_id: None,
            recreate_index: true,
            delete_vectors: false,
        }
    }
}

/// A message claimed from a queue, invisible to other consumers until its
/// visibility timeout elapses or it is acknowledged.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: String,
    pub queue: String,
    /// Raw body; parsing is the handler's job so malformed bodies can be
    /// dead-lettered instead of lost.
    pub body: String,
    /// Deliveries so far, including this one.
    pub receive_count: u32,
    /// Handle for acknowledging this delivery.
    pub receipt: String,
}

// =============================================================================
// VECTOR INDEX
// =============================================================================

/// One embedded slice of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedChunk {
    pub document_id: String,
    pub title: String,
    pub content: String,
    pub vector: Vec<f32>,
}

/// A user's complete semantic index, stored as one object keyed by user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorIndex {
    pub user_id: String,
    pub model: String,
    pub dimension: usize,
    pub built_at: DateTime<Utc>,
    pub chunks: Vec<IndexedChunk>,
}

impl VectorIndex {
    pub fn empty(user_id: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            user_id: user_id.into(),
            model: model.into(),
            dimension,
            built_at: Utc::now(),
            chunks: Vec::new(),
        }
    }

    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

// =============================================================================
// READ-SIDE RESULTS
// =============================================================================

/// A semantic search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub document_id: String,
    pub title: String,
    pub content: String,
    pub score: f32,
}

/// A chat completion grounded in the user's notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAnswer {
    pub answer: String,
    pub sources: Vec<SearchHit>,
}
