//! Save Worker: persists documents from the Write Queue and requests
//! reindexing when something searchable changed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, instrument};

use rocketnotes_core::{
    tree, DocumentRepository, Error, ReindexMessage, Result, SaveDocumentMessage, Tree,
    TreeRepository, UserConfigRepository, Zettel,
};
use rocketnotes_db::Database;

use crate::handler::{HandlerResult, MessageContext, MessageHandler};
use crate::publish::ReindexPublisher;

/// What one save did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// `false` when a newer stored version won last-write-wins.
    pub stored: bool,
    pub changed: bool,
    /// Whether the accompanying `documentTree` was written.
    pub tree_stored: bool,
    /// Id of the reindex message, if one was published.
    pub reindex_message_id: Option<String>,
}

pub struct SaveDocumentHandler {
    documents: Arc<dyn DocumentRepository>,
    trees: Arc<dyn TreeRepository>,
    user_configs: Arc<dyn UserConfigRepository>,
    publisher: ReindexPublisher,
}

impl SaveDocumentHandler {
    pub fn new(db: &Database, publisher: ReindexPublisher) -> Self {
        Self {
            documents: db.documents.clone(),
            trees: db.trees.clone(),
            user_configs: db.user_configs.clone(),
            publisher,
        }
    }

    /// Parse a Write Queue body.
    pub fn parse(body: &str) -> Result<SaveDocumentMessage> {
        serde_json::from_str(body).map_err(|e| Error::MalformedMessage(e.to_string()))
    }

    /// Validate and normalize the tree sent with a save.
    ///
    /// The tree belongs to the document's owner; anything else is rejected
    /// before either store is touched.
    pub fn prepare_tree(message: &SaveDocumentMessage) -> Result<Option<Tree>> {
        let Some(doc_tree) = message.document_tree.clone() else {
            return Ok(None);
        };
        if doc_tree.id != message.document.user_id {
            return Err(Error::InvalidInput(format!(
                "documentTree {} does not belong to user {}",
                doc_tree.id, message.document.user_id
            )));
        }
        tree::prepare_for_save(doc_tree).map(Some)
    }

    /// Persist one save. `redelivered` forces the document to count as changed.
    #[instrument(skip(self, message), fields(subsystem = "jobs", component = "save_worker", op = "save", document_id = %message.document.id, user_id = %message.document.user_id))]
    pub async fn save(
        &self,
        message: SaveDocumentMessage,
        redelivered: bool,
    ) -> Result<SaveOutcome> {
        let recreate = message.recreate_requested();
        message.document.validate()?;
        let doc_tree = Self::prepare_tree(&message)?;
        let mut document = message.document;
        document.normalize(Utc::now());

        let previous = self.documents.get(&document.id).await?;
        let stored = self.documents.upsert(&document).await?;
        let changed = stored
            && (redelivered
                || previous
                    .as_ref()
                    .map_or(true, |p| document.differs_from(p)));

        if !stored {
            debug!("Newer stored version kept");
        }

        // A save that lost last-write-wins carries a tree at least as stale.
        let tree_stored = match doc_tree {
            Some(doc_tree) if stored => {
                self.trees.put(&doc_tree).await?;
                true
            }
            _ => false,
        };

        let mut outcome = SaveOutcome {
            stored,
            changed,
            tree_stored,
            reindex_message_id: None,
        };

        if !(changed || recreate) {
            return Ok(outcome);
        }

        if self.user_configs.get(&document.user_id).await?.is_none() {
            debug!("No user config, skipping reindex");
            return Ok(outcome);
        }

        let reindex = ReindexMessage {
            recreate_index: recreate,
            ..ReindexMessage::for_document(&document.user_id, &document.id)
        };
        outcome.reindex_message_id = Some(self.publisher.publish(&reindex).await?);

        info!(changed, recreate, "Document saved");
        Ok(outcome)
    }

    /// Append a zettel to the end of a live document and save it.
    ///
    /// Returns `None` when the document is missing or deleted. The zettel
    /// itself is left in the Zettelkasten.
    #[instrument(skip(self, zettel), fields(subsystem = "jobs", component = "save_worker", op = "archive_zettel", zettel_id = %zettel.id))]
    pub async fn archive_zettel(
        &self,
        document_id: &str,
        zettel: &Zettel,
        recreate_index: bool,
    ) -> Result<Option<SaveOutcome>> {
        let mut document = match self.documents.get(document_id).await? {
            Some(doc) if !doc.deleted => doc,
            _ => return Ok(None),
        };
        if zettel.user_id != document.user_id {
            return Err(Error::InvalidInput(format!(
                "zettel {} belongs to {}, document {} to {}",
                zettel.id, zettel.user_id, document.id, document.user_id
            )));
        }

        document.content = format!("{}\n{}", document.content, zettel.content);
        let message = SaveDocumentMessage {
            recreate_index: recreate_index.then_some(true),
            ..SaveDocumentMessage::new(document)
        };
        self.save(message, false).await.map(Some)
    }
}

#[async_trait]
impl MessageHandler for SaveDocumentHandler {
    fn name(&self) -> &'static str {
        "save_document"
    }

    async fn handle(&self, ctx: MessageContext) -> HandlerResult {
        let message = match Self::parse(ctx.body()) {
            Ok(message) => message,
            Err(e) => return HandlerResult::from_error(&e),
        };
        self.save(message, ctx.is_redelivery()).await.into()
    }
}
