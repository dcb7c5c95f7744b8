use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{Config, CorpusConfig, LanguageTarget};
use crate::document::Document;
use crate::error::{KotobaError, Result};
use crate::translate::{BatchAdapter, BatchTranslator, CachedTranslator, RetryPolicy, RetryingTranslator};
use crate::tree::TreeTranslator;

/// A (document, language) pair that could not be produced.
#[derive(Debug)]
pub struct UnitFailure {
    pub path: PathBuf,
    /// `None` when the document itself could not be read or parsed
    pub language: Option<String>,
    pub error: KotobaError,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub documents: usize,
    pub written: Vec<PathBuf>,
    pub failures: Vec<UnitFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

struct SourceDocument {
    path: PathBuf,
    document: Document,
}

/// Mirrors the source locale directory into one directory per target
/// language.
pub struct CorpusDriver {
    config: CorpusConfig,
    languages: Vec<LanguageTarget>,
    translator: TreeTranslator,
    progress: Option<ProgressBar>,
}

impl CorpusDriver {
    pub fn new(config: CorpusConfig, languages: Vec<LanguageTarget>, translator: TreeTranslator) -> Self {
        Self {
            config,
            languages,
            translator,
            progress: None,
        }
    }

    /// Compose the provider with retry, optional cache and the batch
    /// adapter as configured.
    pub fn from_config(config: &Config, languages: Vec<LanguageTarget>, provider: Arc<dyn BatchTranslator>) -> Self {
        let mut provider: Arc<dyn BatchTranslator> = Arc::new(RetryingTranslator::new(
            provider,
            RetryPolicy::from_config(&config.translate),
        ));
        if config.cache.enabled {
            provider = Arc::new(
                CachedTranslator::new(provider, &config.cache.dir)
                    .with_scope(&config.translate.endpoint, &config.translate.model),
            );
        }

        let adapter = BatchAdapter::new(provider, &config.translate);
        Self::new(config.corpus.clone(), languages, TreeTranslator::new(adapter))
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn languages(&self) -> &[LanguageTarget] {
        &self.languages
    }

    pub fn translator(&self) -> &TreeTranslator {
        &self.translator
    }

    /// All documents under the source locale directory, sorted by path
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let source_dir = self.config.source_dir();
        if !source_dir.is_dir() {
            return Err(KotobaError::FileNotFound(source_dir.display().to_string()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&source_dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", source_dir.display(), e);
                    continue;
                }
            };
            if entry.file_type().is_file() && self.is_document(entry.path()) {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    fn is_document(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.config.extension))
    }

    /// `<output_root>/<language dir>/<path relative to the source dir>`
    pub fn output_path(&self, document: &Path, language: &LanguageTarget) -> Result<PathBuf> {
        let source_dir = self.config.source_dir();
        let relative = pathdiff::diff_paths(document, &source_dir)
            .filter(|rel| !rel.starts_with(".."))
            .ok_or_else(|| KotobaError::Config(format!(
                "{} is not inside {}", document.display(), source_dir.display()
            )))?;

        Ok(self.config.output_root().join(&language.dir).join(relative))
    }

    /// Read and parse one source document.
    pub async fn load(&self, path: &Path) -> Result<Document> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| KotobaError::filesystem(path, e))?;

        Document::from_json(&content).map_err(|e| KotobaError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Translate one document file without writing it.
    pub async fn translate_file(&self, path: &Path, language: &LanguageTarget) -> Result<Document> {
        let document = self.load(path).await?;
        self.translator.translate(&document, &language.code).await
    }

    /// Translate every document into every language. Failures are recorded
    /// per (document, language) and the run continues, unless the corpus is
    /// configured to fail fast, in which case the first error is returned
    /// and units still in flight are abandoned without writing.
    pub async fn run(&self) -> Result<RunReport> {
        let files = self.discover()?;
        let mut report = RunReport {
            documents: files.len(),
            ..Default::default()
        };

        info!(
            "Found {} documents in {}, translating into {} languages",
            files.len(),
            self.config.source_dir().display(),
            self.languages.len()
        );

        let mut sources = Vec::with_capacity(files.len());
        for path in files {
            match self.load(&path).await {
                Ok(document) => sources.push(SourceDocument { path, document }),
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    if self.config.fail_fast {
                        return Err(e);
                    }
                    report.failures.push(UnitFailure { path, language: None, error: e });
                }
            }
        }

        if let Some(pb) = &self.progress {
            pb.set_length((sources.len() * self.languages.len()) as u64);
        }

        let units = sources
            .iter()
            .flat_map(|source| self.languages.iter().map(move |language| (source, language)));

        let mut results = stream::iter(units)
            .map(|(source, language)| async move {
                let result = self.process_unit(source, language).await;
                (source, language, result)
            })
            .buffer_unordered(self.config.concurrency.max(1));

        while let Some((source, language, result)) = results.next().await {
            if let Some(pb) = &self.progress {
                pb.inc(1);
            }

            match result {
                Ok(output) => report.written.push(output),
                Err(e) => {
                    warn!("Failed to translate {} into {}: {}", source.path.display(), language.dir, e);
                    if self.config.fail_fast {
                        return Err(e);
                    }
                    report.failures.push(UnitFailure {
                        path: source.path.clone(),
                        language: Some(language.dir.clone()),
                        error: e,
                    });
                }
            }
        }

        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }

        report.written.sort();
        info!(
            "Corpus run finished: {} files written, {} failures",
            report.written.len(),
            report.failures.len()
        );

        Ok(report)
    }

    async fn process_unit(&self, source: &SourceDocument, language: &LanguageTarget) -> Result<PathBuf> {
        let output = self.output_path(&source.path, language)?;
        debug!("Translating {} into {} ({})", source.path.display(), language.dir, language.code);

        let translated = self.translator.translate(&source.document, &language.code).await?;
        if !translated.same_shape(&source.document) {
            return Err(KotobaError::StructuralMismatch(format!(
                "translated document for {} does not match the source shape",
                language.dir
            )));
        }

        write_atomic(&output, translated.to_json_pretty()?).await?;
        info!("Wrote {}", output.display());
        Ok(output)
    }
}

/// Write `content` to `path` through a temporary file in the same
/// directory, so the file is either absent, the old version, or complete.
pub async fn write_atomic(path: &Path, content: String) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    fs::create_dir_all(&parent)
        .await
        .map_err(|e| KotobaError::filesystem(&parent, e))?;

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut temp = tempfile::NamedTempFile::new_in(&parent)
            .map_err(|e| KotobaError::filesystem(&parent, e))?;
        temp.write_all(content.as_bytes())
            .map_err(|e| KotobaError::filesystem(temp.path(), e))?;
        temp.persist(&target)
            .map_err(|e| KotobaError::filesystem(&target, e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| KotobaError::filesystem(path, std::io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn driver(root: &Path) -> CorpusDriver {
        struct Never;

        #[async_trait::async_trait]
        impl BatchTranslator for Never {
            fn name(&self) -> &'static str {
                "never"
            }

            async fn translate_batch(&self, _texts: &[String], _source: &str, _target: &str) -> Result<Vec<String>> {
                unreachable!()
            }
        }

        let mut config = Config::default().corpus;
        config.root = root.to_path_buf();
        let adapter = BatchAdapter::unbounded(Arc::new(Never), "en");
        CorpusDriver::new(
            config,
            vec![LanguageTarget::new("pt-BR", "pt")],
            TreeTranslator::new(adapter),
        )
    }

    #[test]
    fn test_output_path_mirrors_relative_path() {
        let driver = driver(Path::new("/locales"));
        let out = driver
            .output_path(Path::new("/locales/en/pages/home.json"), &driver.languages()[0])
            .unwrap();
        assert_eq!(out, PathBuf::from("/locales/pt-BR/pages/home.json"));
    }

    #[test]
    fn test_output_path_rejects_outside_documents() {
        let driver = driver(Path::new("/locales"));
        assert!(driver.output_path(Path::new("/elsewhere/a.json"), &driver.languages()[0]).is_err());
    }

    #[test]
    fn test_discover_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let en = dir.path().join("en");
        std::fs::create_dir_all(en.join("nested")).unwrap();
        std::fs::write(en.join("b.json"), "{}").unwrap();
        std::fs::write(en.join("nested/a.JSON"), "{}").unwrap();
        std::fs::write(en.join("notes.txt"), "").unwrap();

        let found = driver(dir.path()).discover().unwrap();
        assert_eq!(found, vec![en.join("b.json"), en.join("nested/a.JSON")]);
    }

    #[test]
    fn test_missing_source_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(driver(dir.path()).discover(), Err(KotobaError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_write_atomic_creates_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fr/deep/common.json");

        write_atomic(&path, "{}".to_string()).await.unwrap();
        write_atomic(&path, "{\n  \"a\": \"b\"\n}".to_string()).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\n  \"a\": \"b\"\n}");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
