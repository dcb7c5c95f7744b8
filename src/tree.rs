use std::future::Future;
use std::pin::Pin;
use tracing::debug;

use crate::document::{Document, Node};
use crate::error::{KotobaError, Result};
use crate::protect::{protect_all, restore_checked};
use crate::translate::BatchAdapter;

type LevelFuture<'a> = Pin<Box<dyn Future<Output = Result<Document>> + Send + 'a>>;

/// Walks a document and translates its leaves, one provider batch per
/// string array and one per mapping level for the sibling strings.
pub struct TreeTranslator {
    adapter: BatchAdapter,
}

impl TreeTranslator {
    pub fn new(adapter: BatchAdapter) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &BatchAdapter {
        &self.adapter
    }

    /// Translate a document. The result has the same keys, nesting and
    /// array lengths; only string content changes.
    pub async fn translate(&self, doc: &Document, target_language: &str) -> Result<Document> {
        self.translate_level(doc, target_language, String::new()).await
    }

    /// Protect, translate as one batch, and restore.
    pub async fn translate_strings(&self, texts: &[String], target_language: &str) -> Result<Vec<String>> {
        let protected = protect_all(texts);
        let masked: Vec<String> = protected.iter().map(|p| p.masked.clone()).collect();

        let translated = self.adapter.translate_batch(&masked, target_language).await?;

        protected
            .iter()
            .zip(&translated)
            .map(|(p, t)| restore_checked(&p.masked, t, &p.record))
            .collect()
    }

    fn translate_level<'a>(&'a self, doc: &'a Document, target_language: &'a str, path: String) -> LevelFuture<'a> {
        Box::pin(async move {
            let mut slots: Vec<(String, Option<Node>)> = Vec::with_capacity(doc.len());
            let mut scalar_slots = Vec::new();
            let mut scalar_texts = Vec::new();

            for (key, node) in doc.iter() {
                let key_path = join_path(&path, key);
                let translated = match node {
                    Node::TextList(items) => Some(Node::TextList(
                        self.translate_strings(items, target_language)
                            .await
                            .map_err(|e| locate(e, &key_path))?,
                    )),
                    Node::Object(child) => Some(Node::Object(
                        self.translate_level(child, target_language, key_path).await?,
                    )),
                    Node::Text(text) => {
                        scalar_slots.push(slots.len());
                        scalar_texts.push(text.clone());
                        None
                    }
                    Node::Other(value) => Some(Node::Other(value.clone())),
                };
                slots.push((key.to_string(), translated));
            }

            if !scalar_texts.is_empty() {
                debug!(
                    "Translating {} sibling strings at '{}' into {}",
                    scalar_texts.len(), display_path(&path), target_language
                );
                let translated = self.translate_strings(&scalar_texts, target_language)
                    .await
                    .map_err(|e| locate(e, display_path(&path)))?;
                for (slot, text) in scalar_slots.into_iter().zip(translated) {
                    slots[slot].1 = Some(Node::Text(text));
                }
            }

            slots
                .into_iter()
                .map(|(key, node)| {
                    node.map(|n| (key.clone(), n)).ok_or_else(|| {
                        KotobaError::StructuralMismatch(format!("no translation produced for '{}'", key))
                    })
                })
                .collect()
        })
    }
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "<root>" } else { path }
}

/// Prefix structural errors with the key path they occurred at.
fn locate(err: KotobaError, path: &str) -> KotobaError {
    match err {
        KotobaError::StructuralMismatch(msg) => KotobaError::StructuralMismatch(format!("at '{}': {}", path, msg)),
        other => other,
    }
}
