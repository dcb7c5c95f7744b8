// Modular translation architecture
//
// This module wraps external translation services behind one batch trait:
// - Google: Google Translate web endpoint
// - Ollama: Local LLM asked to translate a JSON array of strings
// - Adapter: chunking and the equal-length guarantee on top of any provider
// - Retry / Cache: decorators the corpus driver layers on a provider

pub mod adapter;
pub mod cache;
pub mod google;
pub mod ollama;
pub mod retry;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

pub use adapter::BatchAdapter;
pub use cache::CachedTranslator;
pub use retry::{RetryPolicy, RetryingTranslator};

use crate::config::{ProviderKind, TranslateConfig};
use crate::error::Result;

/// Main trait for translation providers.
///
/// A provider receives an ordered batch of strings and returns translations
/// in the same order. Implementations are not trusted to honour the length
/// contract; [`BatchAdapter`] checks it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BatchTranslator: Send + Sync {
    /// Short name used in logs and error messages
    fn name(&self) -> &'static str;

    /// Translate every string of `texts` from `source_language` to `target_language`
    async fn translate_batch(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>>;

    /// Check that the provider can be reached
    async fn check_availability(&self) -> Result<()> {
        Ok(())
    }
}

/// Factory for creating provider instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    /// Create a provider based on the configured kind
    pub fn create_translator(config: &TranslateConfig) -> Result<Box<dyn BatchTranslator>> {
        match config.provider {
            ProviderKind::Google => Ok(Box::new(google::GoogleTranslator::new(config)?)),
            ProviderKind::Ollama => Ok(Box::new(ollama::OllamaTranslator::new(config)?)),
        }
    }
}
