use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate every document of the source locale into the target locales
    Run {
        /// Directory holding one sub-directory per locale
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Directory the translated locales are written to
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target language directories (comma-separated, default: all enabled)
        #[arg(short, long)]
        langs: Option<String>,

        /// Number of document/language units translated at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Stop at the first failure
        #[arg(long)]
        fail_fast: bool,

        /// Bypass the translation cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Translate a single document into one language
    File {
        /// Input JSON document
        #[arg(short, long)]
        input: PathBuf,

        /// Target language directory
        #[arg(short, long)]
        lang: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Translate one string, protecting markup and placeholders
    Text {
        /// Target language directory
        #[arg(short, long)]
        lang: String,

        /// Text to translate
        text: String,
    },

    /// List configured target languages
    Languages,

    /// Check that the translation provider is reachable
    Check,

    /// Write the default configuration to a file
    InitConfig {
        /// Destination file
        #[arg(short, long, default_value = "kotoba.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Manage the translation cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// List cached translations
    List,

    /// Clear all cached translations
    Clear,
}

/// Split a comma-separated language list, ignoring blanks.
pub fn parse_language_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
