//! Kotoba - Localization Tree Translation
//!
//! Entry point for the `kotoba` command, which mirrors a source locale
//! directory of JSON documents into translated locale directories.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};

use kotoba::cli::{parse_language_list, Args, CacheAction, Commands};
use kotoba::config::{Config, LanguageTarget};
use kotoba::corpus::{CorpusDriver, RunReport};
use kotoba::error::KotobaError;
use kotoba::translate::{cache, BatchTranslator, TranslatorFactory};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file; the guard flushes the file
    // writer when main returns
    let _log_guard = setup_logging(args.verbose)?;

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("kotoba.toml").exists() {
                info!("Found kotoba.toml in current directory, loading...");
                Config::from_file("kotoba.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Run { root, output, langs, concurrency, fail_fast, no_cache } => {
            if let Some(root) = root {
                config.corpus.root = root;
            }
            if let Some(output) = output {
                config.corpus.output_root = Some(output);
            }
            if let Some(concurrency) = concurrency {
                config.corpus.concurrency = concurrency.max(1);
            }
            config.corpus.fail_fast |= fail_fast;
            if no_cache {
                config.cache.enabled = false;
            }

            let languages = config.select_languages(&langs.as_deref().map(parse_language_list).unwrap_or_default())?;
            if languages.is_empty() {
                return Err(KotobaError::Config("No target languages enabled".to_string()).into());
            }

            let provider: Arc<dyn BatchTranslator> = TranslatorFactory::create_translator(&config.translate)?.into();
            provider.check_availability().await?;

            let progress = ProgressBar::new(0);
            progress.set_style(ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                .progress_chars("#>-"));

            let driver = CorpusDriver::from_config(&config, languages, provider).with_progress(progress);
            let report = driver.run().await?;

            println!(
                "Translated {} documents: {} files written, {} failures",
                report.documents,
                report.written.len(),
                report.failures.len()
            );
            for failure in &report.failures {
                println!(
                    "  {} [{}]: {}",
                    failure.path.display(),
                    failure.language.as_deref().unwrap_or("parse"),
                    failure.error
                );
            }

            ensure_success(&report)?;
        }
        Commands::File { input, lang, output } => {
            let language = find_language(&config, &lang)?;
            let provider: Arc<dyn BatchTranslator> = TranslatorFactory::create_translator(&config.translate)?.into();
            let driver = CorpusDriver::from_config(&config, vec![language.clone()], provider);

            let translated = driver.translate_file(&input, &language).await?;
            let content = translated.to_json_pretty()?;
            match output {
                Some(path) => {
                    kotoba::corpus::write_atomic(&path, content).await?;
                    info!("Wrote {}", path.display());
                }
                None => println!("{}", content),
            }
        }
        Commands::Text { lang, text } => {
            let language = find_language(&config, &lang)?;
            let provider: Arc<dyn BatchTranslator> = TranslatorFactory::create_translator(&config.translate)?.into();
            let driver = CorpusDriver::from_config(&config, vec![language.clone()], provider);

            let translated = driver.translator().translate_strings(&[text], &language.code).await?;
            for line in translated {
                println!("{}", line);
            }
        }
        Commands::Languages => {
            println!("{:<10} {:<10} {:<10}", "Directory", "Code", "Status");
            println!("{}", "-".repeat(32));
            for language in &config.languages {
                let status = if language.enabled { "enabled" } else { "disabled" };
                println!("{:<10} {:<10} {:<10}", language.dir, language.code, status);
            }
        }
        Commands::Check => {
            let provider = TranslatorFactory::create_translator(&config.translate)?;
            provider.check_availability().await?;
            println!("Provider '{}' is available", provider.name());
        }
        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                return Err(KotobaError::Config(format!(
                    "{} already exists, use --force to overwrite", output.display()
                )).into());
            }
            Config::default().save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
        Commands::Cache { action } => match action {
            CacheAction::List => {
                let items = cache::list_translation_cache(&config.cache.dir).await?;
                if items.is_empty() {
                    println!("No cached translations found.");
                } else {
                    println!("\nCached Translations:");
                    println!("{:<10} {:<10} {:<15} {:<50}", "Provider", "Language", "Cached", "Source Text");
                    println!("{}", "-".repeat(85));

                    for item in items {
                        let cached_ago = std::time::SystemTime::now()
                            .duration_since(std::time::UNIX_EPOCH)
                            .unwrap_or_default()
                            .as_secs()
                            .saturating_sub(item.cached_at);

                        let source_preview = if item.source_text.chars().count() > 47 {
                            format!("{}...", item.source_text.chars().take(47).collect::<String>())
                        } else {
                            item.source_text.clone()
                        };

                        println!("{:<10} {:<10} {:<15} {:<50}",
                            item.provider,
                            item.target_language,
                            format_duration(cached_ago),
                            source_preview
                        );
                    }
                }
            }
            CacheAction::Clear => {
                let deleted_count = cache::clear_translation_cache(&config.cache.dir).await?;
                println!("Cleared {} cached translations", deleted_count);
            }
        },
    }

    Ok(())
}

/// Turn a run with failed units into an error, so main exits non-zero
fn ensure_success(report: &RunReport) -> Result<()> {
    if report.is_success() {
        return Ok(());
    }
    anyhow::bail!(
        "{} translation units failed; rerun to retry them",
        report.failures.len()
    )
}

/// Look up a configured language by directory, enabled or not
fn find_language(config: &Config, dir: &str) -> Result<LanguageTarget> {
    let mut selected = config.select_languages(&[dir.to_string()])?;
    Ok(selected.remove(0))
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<WorkerGuard> {
    let log_dir = std::env::current_dir()?.join(".kotoba").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "kotoba.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("kotoba.log").display());

    Ok(guard)
}

/// Format duration in seconds to human readable string
fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
