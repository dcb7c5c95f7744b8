use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{KotobaError, Result};

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    1
}

fn default_extension() -> String {
    "json".to_string()
}

fn default_max_batch_items() -> usize {
    128
}

fn default_max_batch_chars() -> usize {
    5000
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_retry_initial_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    8000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub translate: TranslateConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub languages: Vec<LanguageTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Directory holding one sub-directory per locale
    pub root: PathBuf,
    /// Locale directory under `root` that is read as the source
    pub source_locale: String,
    /// Where translated locale directories are written (defaults to `root`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_root: Option<PathBuf>,
    /// File extension of documents to translate
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Number of document/language units processed at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Abort the run on the first failed unit
    #[serde(default)]
    pub fail_fast: bool,
}

impl CorpusConfig {
    pub fn source_dir(&self) -> PathBuf {
        self.root.join(&self.source_locale)
    }

    pub fn output_root(&self) -> &Path {
        self.output_root.as_deref().unwrap_or(&self.root)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Translation backend
    pub provider: ProviderKind,
    /// Base URL of the provider
    pub endpoint: String,
    /// LLM model (Ollama only)
    #[serde(default)]
    pub model: String,
    /// Provider code of the language all documents are written in
    pub source_language: String,
    /// User agent sent with every request
    pub user_agent: String,
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum number of strings per provider call
    #[serde(default = "default_max_batch_items")]
    pub max_batch_items: usize,
    /// Maximum total characters per provider call
    #[serde(default = "default_max_batch_chars")]
    pub max_batch_chars: usize,
    /// Maximum retries for failed provider calls
    pub max_retries: u32,
    /// Delay before the first retry
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
    /// Upper bound for the backoff delay
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl TranslateConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Google Translate web endpoint
    Google,
    /// Local LLM served by Ollama
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Reuse translations of identical strings across runs
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Directory holding one JSON entry per cached string
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(".kotoba/cache/translations"),
        }
    }
}

/// One output locale: the directory it is written to and the code the
/// provider expects for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageTarget {
    pub dir: String,
    pub code: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl LanguageTarget {
    pub fn new(dir: &str, code: &str) -> Self {
        Self {
            dir: dir.to_string(),
            code: code.to_string(),
            enabled: true,
        }
    }

    fn disabled(dir: &str, code: &str) -> Self {
        Self {
            enabled: false,
            ..Self::new(dir, code)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            corpus: CorpusConfig {
                root: PathBuf::from("."),
                source_locale: "en".to_string(),
                output_root: None,
                extension: default_extension(),
                concurrency: default_concurrency(),
                fail_fast: false,
            },
            translate: TranslateConfig {
                provider: ProviderKind::Google,
                endpoint: "https://translate.googleapis.com".to_string(),
                model: "llama3.2:3b".to_string(),
                source_language: "en".to_string(),
                user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/94.0.4606.81 Safari/537.36".to_string(),
                timeout_secs: default_timeout_secs(),
                max_batch_items: default_max_batch_items(),
                max_batch_chars: default_max_batch_chars(),
                max_retries: 3,
                retry_initial_delay_ms: default_retry_initial_delay_ms(),
                retry_max_delay_ms: default_retry_max_delay_ms(),
            },
            cache: CacheConfig::default(),
            languages: vec![
                LanguageTarget::new("zh-CN", "zh-CN"),
                LanguageTarget::new("fr", "fr"),
                LanguageTarget::disabled("de", "de"),
                LanguageTarget::disabled("es", "es"),
                LanguageTarget::disabled("it", "it"),
                LanguageTarget::disabled("ja", "ja"),
                LanguageTarget::disabled("ko", "ko"),
                LanguageTarget::disabled("ru", "ru"),
                LanguageTarget::disabled("zh-TW", "zh-TW"),
                LanguageTarget::disabled("tr", "tr"),
                LanguageTarget::disabled("pt-BR", "pt"),
            ],
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| KotobaError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| KotobaError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| KotobaError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| KotobaError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.corpus.concurrency == 0 {
            return Err(KotobaError::Config("corpus.concurrency must be at least 1".to_string()));
        }
        if self.translate.max_batch_items == 0 {
            return Err(KotobaError::Config("translate.max_batch_items must be at least 1".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for language in &self.languages {
            if !seen.insert(language.dir.as_str()) {
                return Err(KotobaError::Config(format!(
                    "Language directory '{}' is configured twice", language.dir
                )));
            }
        }
        Ok(())
    }

    /// Targets that are switched on in the configuration
    pub fn enabled_languages(&self) -> Vec<LanguageTarget> {
        self.languages.iter().filter(|l| l.enabled).cloned().collect()
    }

    /// Restrict the run to the named output directories. Naming a
    /// language explicitly selects it even when it is disabled.
    pub fn select_languages(&self, dirs: &[String]) -> Result<Vec<LanguageTarget>> {
        if dirs.is_empty() {
            return Ok(self.enabled_languages());
        }

        dirs.iter()
            .map(|dir| {
                self.languages
                    .iter()
                    .find(|l| &l.dir == dir)
                    .cloned()
                    .map(|l| LanguageTarget { enabled: true, ..l })
                    .ok_or_else(|| KotobaError::Config(format!(
                        "Unknown language '{}'. Configured: {}",
                        dir,
                        self.languages.iter().map(|l| l.dir.as_str()).collect::<Vec<_>>().join(", ")
                    )))
            })
            .collect()
    }
}
