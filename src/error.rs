use thiserror::Error;

/// Boxed cause carried by provider failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum KotobaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Translation provider '{provider}' failed: {source}")]
    TranslationProvider {
        provider: String,
        #[source]
        source: BoxError,
    },

    #[error("Structural mismatch: {0}")]
    StructuralMismatch(String),

    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

impl KotobaError {
    /// Wrap any failure raised while talking to a translation provider.
    pub fn provider<E: Into<BoxError>>(provider: &str, source: E) -> Self {
        Self::TranslationProvider {
            provider: provider.to_string(),
            source: source.into(),
        }
    }

    pub fn filesystem<P: AsRef<std::path::Path>>(path: P, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Only provider faults are worth another attempt; a malformed batch
    /// would come back malformed again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TranslationProvider { .. })
    }
}

pub type Result<T> = std::result::Result<T, KotobaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_provider_errors_are_retryable() {
        assert!(KotobaError::provider("google", "rate limited").is_retryable());
        assert!(!KotobaError::StructuralMismatch("2 != 1".to_string()).is_retryable());
        assert!(!KotobaError::Config("bad".to_string()).is_retryable());
    }

    #[test]
    fn test_provider_error_keeps_cause() {
        let err = KotobaError::provider("ollama", "connection refused");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("connection refused"));
        assert!(err.to_string().contains("ollama"));
    }
}
