use assert_fs::prelude::*;
use assert_fs::TempDir;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kotoba::config::{Config, CorpusConfig, LanguageTarget};
use kotoba::corpus::CorpusDriver;
use kotoba::error::{KotobaError, Result};
use kotoba::translate::{BatchAdapter, BatchTranslator};
use kotoba::tree::TreeTranslator;

/// Deterministic provider: prefixes every string with the target code.
#[derive(Default)]
struct PrefixTranslator {
    calls: AtomicUsize,
    fail_for: Option<&'static str>,
    short_for: Option<&'static str>,
}

impl PrefixTranslator {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchTranslator for PrefixTranslator {
    fn name(&self) -> &'static str {
        "prefix"
    }

    async fn translate_batch(&self, texts: &[String], source: &str, target: &str) -> Result<Vec<String>> {
        assert_eq!(source, "en");
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_for == Some(target) {
            return Err(KotobaError::provider("prefix", "service unavailable"));
        }
        let mut out: Vec<String> = texts.iter().map(|t| format!("[{}] {}", target, t)).collect();
        if self.short_for == Some(target) {
            out.pop();
        }
        Ok(out)
    }
}

fn corpus_config(root: &TempDir) -> CorpusConfig {
    let mut config = Config::default().corpus;
    config.root = root.path().to_path_buf();
    config
}

fn languages() -> Vec<LanguageTarget> {
    vec![LanguageTarget::new("zh-CN", "zh-CN"), LanguageTarget::new("pt-BR", "pt")]
}

fn driver(config: CorpusConfig, provider: Arc<PrefixTranslator>) -> CorpusDriver {
    let adapter = BatchAdapter::unbounded(provider, "en");
    CorpusDriver::new(config, languages(), TreeTranslator::new(adapter))
}

fn seed(root: &TempDir) {
    root.child("en/common.json")
        .write_str(r#"{"greeting": "Hello <b>World</b>", "items": ["Save {{count}} files", "Delete all"]}"#)
        .unwrap();
    root.child("en/pages/home.json")
        .write_str(r#"{"title": "Home", "nav": {"back": "Back", "next": "<i>Next</i>"}, "version": 2}"#)
        .unwrap();
    root.child("en/README.md").write_str("not a document").unwrap();
}

#[tokio::test]
async fn mirrors_source_tree_per_language() {
    let root = TempDir::new().unwrap();
    seed(&root);
    let provider = Arc::new(PrefixTranslator::default());

    let report = driver(corpus_config(&root), provider.clone()).run().await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.documents, 2);
    assert_eq!(report.written.len(), 4);
    // common: items + root scalars; home: nav + root scalars; per language
    assert_eq!(provider.calls(), 8);

    let common = std::fs::read_to_string(root.path().join("zh-CN/common.json")).unwrap();
    assert_eq!(
        common,
        "{\n  \"greeting\": \"[zh-CN] Hello <b>World</b>\",\n  \"items\": [\n    \"[zh-CN] Save {{count}} files\",\n    \"[zh-CN] Delete all\"\n  ]\n}"
    );

    let home = std::fs::read_to_string(root.path().join("pt-BR/pages/home.json")).unwrap();
    assert_eq!(
        home,
        "{\n  \"title\": \"[pt] Home\",\n  \"nav\": {\n    \"back\": \"[pt] Back\",\n    \"next\": \"[pt] <i>Next</i>\"\n  },\n  \"version\": 2\n}"
    );

    assert!(!root.path().join("zh-CN/README.md").exists());
}

#[tokio::test]
async fn second_run_is_byte_identical() {
    let root = TempDir::new().unwrap();
    seed(&root);

    driver(corpus_config(&root), Arc::new(PrefixTranslator::default())).run().await.unwrap();
    let first = std::fs::read(root.path().join("pt-BR/pages/home.json")).unwrap();

    driver(corpus_config(&root), Arc::new(PrefixTranslator::default())).run().await.unwrap();
    let second = std::fs::read(root.path().join("pt-BR/pages/home.json")).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn existing_outputs_are_overwritten_not_merged() {
    let root = TempDir::new().unwrap();
    root.child("en/a.json").write_str(r#"{"k": "v"}"#).unwrap();
    root.child("zh-CN/a.json").write_str(r#"{"stale": "old", "k": "old"}"#).unwrap();

    driver(corpus_config(&root), Arc::new(PrefixTranslator::default())).run().await.unwrap();

    root.child("zh-CN/a.json").assert("{\n  \"k\": \"[zh-CN] v\"\n}");
}

#[tokio::test]
async fn provider_failure_is_isolated_to_its_language() {
    let root = TempDir::new().unwrap();
    seed(&root);
    let provider = Arc::new(PrefixTranslator { fail_for: Some("pt"), ..Default::default() });

    let report = driver(corpus_config(&root), provider).run().await.unwrap();

    assert_eq!(report.written.len(), 2);
    assert_eq!(report.failures.len(), 2);
    for failure in &report.failures {
        assert_eq!(failure.language.as_deref(), Some("pt-BR"));
        assert!(matches!(failure.error, KotobaError::TranslationProvider { .. }));
    }
    assert!(root.path().join("zh-CN/pages/home.json").exists());
    assert!(!root.path().join("pt-BR").exists());
}

#[tokio::test]
async fn short_batch_is_reported_and_not_written() {
    let root = TempDir::new().unwrap();
    root.child("en/a.json").write_str(r#"{"a": "x", "b": "y"}"#).unwrap();
    let provider = Arc::new(PrefixTranslator { short_for: Some("zh-CN"), ..Default::default() });

    let report = driver(corpus_config(&root), provider).run().await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, KotobaError::StructuralMismatch(_)));
    assert!(!root.path().join("zh-CN/a.json").exists());
    assert!(root.path().join("pt-BR/a.json").exists());
}

#[tokio::test]
async fn invalid_json_is_skipped() {
    let root = TempDir::new().unwrap();
    root.child("en/broken.json").write_str("{\"a\": ").unwrap();
    root.child("en/ok.json").write_str(r#"{"a": "x"}"#).unwrap();

    let report = driver(corpus_config(&root), Arc::new(PrefixTranslator::default())).run().await.unwrap();

    assert_eq!(report.documents, 2);
    assert_eq!(report.written.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].language, None);
    assert!(matches!(report.failures[0].error, KotobaError::Parse { .. }));
    assert!(!root.path().join("zh-CN/broken.json").exists());
}

#[tokio::test]
async fn fail_fast_returns_first_error() {
    let root = TempDir::new().unwrap();
    seed(&root);
    let mut config = corpus_config(&root);
    config.fail_fast = true;
    let provider = Arc::new(PrefixTranslator { fail_for: Some("zh-CN"), ..Default::default() });

    let err = driver(config, provider).run().await.unwrap_err();
    assert!(matches!(err, KotobaError::TranslationProvider { .. }));
}

#[tokio::test]
async fn concurrent_units_produce_same_output() {
    let sequential = TempDir::new().unwrap();
    let concurrent = TempDir::new().unwrap();
    seed(&sequential);
    seed(&concurrent);

    driver(corpus_config(&sequential), Arc::new(PrefixTranslator::default())).run().await.unwrap();
    let mut config = corpus_config(&concurrent);
    config.concurrency = 4;
    driver(config, Arc::new(PrefixTranslator::default())).run().await.unwrap();

    for file in ["zh-CN/common.json", "pt-BR/common.json", "zh-CN/pages/home.json", "pt-BR/pages/home.json"] {
        assert_eq!(
            std::fs::read(sequential.path().join(file)).unwrap(),
            std::fs::read(concurrent.path().join(file)).unwrap(),
        );
    }
}

#[tokio::test]
async fn separate_output_root() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    seed(&root);
    let mut config = corpus_config(&root);
    config.output_root = Some(out.path().to_path_buf());

    driver(config, Arc::new(PrefixTranslator::default())).run().await.unwrap();

    assert!(out.path().join("zh-CN/pages/home.json").exists());
    assert!(!root.path().join("zh-CN").exists());
}

#[tokio::test]
async fn cached_rerun_skips_the_provider() {
    let root = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    seed(&root);

    let mut config = Config::default();
    config.corpus.root = root.path().to_path_buf();
    config.cache.dir = cache.path().to_path_buf();
    config.translate.max_retries = 0;

    let first = Arc::new(PrefixTranslator::default());
    CorpusDriver::from_config(&config, languages(), first.clone()).run().await.unwrap();
    assert!(first.calls() > 0);
    let before = std::fs::read(root.path().join("zh-CN/common.json")).unwrap();

    let second = Arc::new(PrefixTranslator::default());
    let report = CorpusDriver::from_config(&config, languages(), second.clone()).run().await.unwrap();
    assert!(report.is_success());
    assert_eq!(second.calls(), 0);
    assert_eq!(std::fs::read(root.path().join("zh-CN/common.json")).unwrap(), before);
}

/// Drops every closing-tag sentinel, as a careless provider would.
struct DroppingTranslator;

#[async_trait]
impl BatchTranslator for DroppingTranslator {
    fn name(&self) -> &'static str {
        "prefix"
    }

    async fn translate_batch(&self, texts: &[String], _source: &str, target: &str) -> Result<Vec<String>> {
        Ok(texts.iter().map(|t| format!("[{}] {}", target, t.replace("{2}", ""))).collect())
    }
}

#[tokio::test]
async fn rerun_recovers_after_damaged_translation() {
    let root = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    root.child("en/a.json").write_str(r#"{"greeting": "Hello <b>World</b>"}"#).unwrap();

    let mut config = Config::default();
    config.corpus.root = root.path().to_path_buf();
    config.cache.dir = cache.path().to_path_buf();
    config.translate.max_retries = 0;

    let first = CorpusDriver::from_config(&config, languages(), Arc::new(DroppingTranslator)).run().await.unwrap();
    assert_eq!(first.failures.len(), 2);
    assert!(first.failures.iter().all(|f| matches!(f.error, KotobaError::StructuralMismatch(_))));
    assert!(!root.path().join("zh-CN/a.json").exists());

    let healthy = Arc::new(PrefixTranslator::default());
    let second = CorpusDriver::from_config(&config, languages(), healthy.clone()).run().await.unwrap();
    assert!(second.is_success());
    assert_eq!(healthy.calls(), 2);
    root.child("zh-CN/a.json").assert("{\n  \"greeting\": \"[zh-CN] Hello <b>World</b>\"\n}");
}

#[tokio::test]
async fn literal_sentinels_in_source_survive() {
    let root = TempDir::new().unwrap();
    root.child("en/a.json").write_str(r#"{"step": "Step {1}: <b>go</b>"}"#).unwrap();

    let report = driver(corpus_config(&root), Arc::new(PrefixTranslator::default())).run().await.unwrap();

    assert!(report.is_success());
    root.child("pt-BR/a.json").assert("{\n  \"step\": \"[pt] Step {1}: <b>go</b>\"\n}");
}

#[tokio::test]
async fn missing_source_locale_is_an_error() {
    let root = TempDir::new().unwrap();
    let err = driver(corpus_config(&root), Arc::new(PrefixTranslator::default())).run().await.unwrap_err();
    assert!(matches!(err, KotobaError::FileNotFound(_)));
}
