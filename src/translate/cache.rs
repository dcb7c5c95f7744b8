use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::error::{KotobaError, Result};
use crate::protect::sentinel_counts;
use super::BatchTranslator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationCacheEntry {
    pub source_text: String,
    pub source_language: String,
    pub target_language: String,
    pub provider: String,
    pub translation: String,
    pub cached_at: u64,
}

/// Persistent per-string translation cache in front of a provider.
///
/// Strings already translated for the same language pair and provider are
/// answered locally; the misses of a batch go to the inner translator as one
/// smaller batch and are merged back by position. A translation that lost
/// or gained a sentinel is passed through but never stored, so a rerun asks
/// the provider again.
pub struct CachedTranslator {
    inner: Arc<dyn BatchTranslator>,
    cache_dir: PathBuf,
    /// Endpoint and model of the provider; part of every key
    scope: String,
    memory: Mutex<HashMap<String, String>>,
}

impl CachedTranslator {
    pub fn new<P: AsRef<Path>>(inner: Arc<dyn BatchTranslator>, cache_dir: P) -> Self {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            warn!("Failed to create translation cache directory {}: {}", cache_dir.display(), e);
        }

        Self {
            inner,
            cache_dir,
            scope: String::new(),
            memory: Mutex::new(HashMap::new()),
        }
    }

    /// Keep entries of different endpoints and models apart.
    pub fn with_scope(mut self, endpoint: &str, model: &str) -> Self {
        self.scope = format!("{}|{}", endpoint, model);
        self
    }

    /// Generate cache key for translation
    pub fn generate_cache_key(&self, source_text: &str, source_language: &str, target_language: &str) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        source_text.hash(&mut hasher);
        source_language.hash(&mut hasher);
        target_language.hash(&mut hasher);
        self.inner.name().hash(&mut hasher);
        self.scope.hash(&mut hasher);

        format!("{:016x}", hasher.finish())
    }

    fn remember(&self, key: &str, translation: &str) {
        if let Ok(mut memory) = self.memory.lock() {
            memory.insert(key.to_string(), translation.to_string());
        }
    }

    fn recall(&self, key: &str) -> Option<String> {
        self.memory.lock().ok().and_then(|memory| memory.get(key).cloned())
    }

    async fn lookup(&self, key: &str) -> Option<String> {
        if let Some(hit) = self.recall(key) {
            return Some(hit);
        }

        let hit = load_entry(&self.cache_dir.join(format!("{}.json", key))).await?;
        self.remember(key, &hit.translation);
        Some(hit.translation)
    }

    async fn store(
        &self,
        key: &str,
        source_text: &str,
        source_language: &str,
        target_language: &str,
        translation: &str,
    ) {
        self.remember(key, translation);

        let entry = TranslationCacheEntry {
            source_text: source_text.to_string(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            provider: self.inner.name().to_string(),
            translation: translation.to_string(),
            cached_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        };

        let content = match serde_json::to_string_pretty(&entry) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to serialize translation cache entry: {}", e);
                return;
            }
        };

        let cache_file = self.cache_dir.join(format!("{}.json", key));
        if let Err(e) = tokio::fs::write(&cache_file, content).await {
            warn!("Failed to write translation cache: {}", e);
        }
    }
}

#[async_trait]
impl BatchTranslator for CachedTranslator {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>> {
        let keys: Vec<String> = texts
            .iter()
            .map(|t| self.generate_cache_key(t, source_language, target_language))
            .collect();

        let mut results: Vec<Option<String>> = Vec::with_capacity(texts.len());
        for key in &keys {
            results.push(self.lookup(key).await);
        }

        let misses: Vec<usize> = (0..texts.len()).filter(|&i| results[i].is_none()).collect();
        debug!(
            "Translation cache: {} hits, {} misses for {}",
            texts.len() - misses.len(), misses.len(), target_language
        );

        if !misses.is_empty() {
            let pending: Vec<String> = misses.iter().map(|&i| texts[i].clone()).collect();
            let translated = self.inner
                .translate_batch(&pending, source_language, target_language)
                .await?;

            if translated.len() != pending.len() {
                return Err(KotobaError::StructuralMismatch(format!(
                    "{} returned {} translations for a batch of {}",
                    self.inner.name(), translated.len(), pending.len()
                )));
            }

            for (&idx, translation) in misses.iter().zip(translated) {
                if sentinel_counts(&texts[idx]) == sentinel_counts(&translation) {
                    self.store(&keys[idx], &texts[idx], source_language, target_language, &translation).await;
                } else {
                    warn!("Not caching translation of \"{}\": markup sentinels changed", texts[idx]);
                }
                results[idx] = Some(translation);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    async fn check_availability(&self) -> Result<()> {
        self.inner.check_availability().await
    }
}

async fn load_entry(path: &Path) -> Option<TranslationCacheEntry> {
    let content = tokio::fs::read_to_string(path).await.ok()?;
    match serde_json::from_str::<TranslationCacheEntry>(&content) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!("Failed to parse translation cache entry {}: {}", path.display(), e);
            None
        }
    }
}

/// List translation cache entries, newest first
pub async fn list_translation_cache<P: AsRef<Path>>(cache_dir: P) -> Result<Vec<TranslationCacheEntry>> {
    let mut entries = Vec::new();

    if let Ok(mut dir_entries) = tokio::fs::read_dir(cache_dir.as_ref()).await {
        while let Ok(Some(entry)) = dir_entries.next_entry().await {
            if entry.path().extension().is_some_and(|ext| ext == "json") {
                if let Some(cache_entry) = load_entry(&entry.path()).await {
                    entries.push(cache_entry);
                }
            }
        }
    }

    entries.sort_by(|a, b| b.cached_at.cmp(&a.cached_at));
    Ok(entries)
}

/// Clear all translation cache
pub async fn clear_translation_cache<P: AsRef<Path>>(cache_dir: P) -> Result<u64> {
    let mut count = 0;
    if let Ok(mut entries) = tokio::fs::read_dir(cache_dir.as_ref()).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.path().extension().is_some_and(|ext| ext == "json")
                && tokio::fs::remove_file(entry.path()).await.is_ok()
            {
                count += 1;
            }
        }
    }
    info!("Cleared {} translation cache entries", count);
    Ok(count)
}
