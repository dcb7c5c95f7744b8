use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::{KotobaError, Result};
use super::BatchTranslator;

/// Batch translator adapter: the only way the tree translator reaches a
/// provider.
///
/// Splits oversized batches into provider-safe chunks, checks that every
/// chunk comes back with exactly as many strings as were sent, and turns
/// any provider failure into a [`KotobaError::TranslationProvider`]. A
/// batch either translates completely or fails.
#[derive(Clone)]
pub struct BatchAdapter {
    provider: Arc<dyn BatchTranslator>,
    source_language: String,
    max_items: usize,
    max_chars: usize,
}

impl BatchAdapter {
    pub fn new(provider: Arc<dyn BatchTranslator>, config: &TranslateConfig) -> Self {
        Self::with_limits(
            provider,
            &config.source_language,
            config.max_batch_items,
            config.max_batch_chars,
        )
    }

    pub fn with_limits(
        provider: Arc<dyn BatchTranslator>,
        source_language: &str,
        max_items: usize,
        max_chars: usize,
    ) -> Self {
        Self {
            provider,
            source_language: source_language.to_string(),
            max_items: max_items.max(1),
            max_chars,
        }
    }

    /// Adapter with no chunking, for providers without request limits
    pub fn unbounded(provider: Arc<dyn BatchTranslator>, source_language: &str) -> Self {
        Self::with_limits(provider, source_language, usize::MAX, usize::MAX)
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    /// Translate `texts` into `target_language`, preserving order and length.
    pub async fn translate_batch(&self, texts: &[String], target_language: &str) -> Result<Vec<String>> {
        let mut translated = Vec::with_capacity(texts.len());

        for range in self.chunks(texts) {
            let chunk = &texts[range.clone()];
            debug!(
                "Sending {} strings ({}..{}) to {} for {}",
                chunk.len(), range.start, range.end, self.provider.name(), target_language
            );

            let result = self.provider
                .translate_batch(chunk, &self.source_language, target_language)
                .await
                .map_err(|e| match e {
                    KotobaError::TranslationProvider { .. } | KotobaError::StructuralMismatch(_) => e,
                    other => KotobaError::provider(self.provider.name(), other),
                })?;

            if result.len() != chunk.len() {
                return Err(KotobaError::StructuralMismatch(format!(
                    "{} returned {} translations for a batch of {} ({} -> {})",
                    self.provider.name(), result.len(), chunk.len(), self.source_language, target_language
                )));
            }

            translated.extend(result);
        }

        Ok(translated)
    }

    /// Consecutive ranges within both limits. A string longer than the
    /// character limit travels alone.
    fn chunks(&self, texts: &[String]) -> Vec<Range<usize>> {
        let mut ranges = Vec::new();
        let mut start = 0;
        let mut chars: usize = 0;

        for (idx, text) in texts.iter().enumerate() {
            let len = text.chars().count();
            let count = idx - start;
            if count > 0 && (count >= self.max_items || chars.saturating_add(len) > self.max_chars) {
                ranges.push(start..idx);
                start = idx;
                chars = 0;
            }
            chars = chars.saturating_add(len);
        }

        if start < texts.len() {
            ranges.push(start..texts.len());
        }

        ranges
    }
}
