//! Error types for Chronos

use thiserror::Error;

/// Result type alias using Chronos' Error
pub type Result<T> = std::result::Result<T, Error>;

/// Chronos error types with helpful messages and suggestions
///
/// Expected "no match" outcomes (an empty retrieval, an unrecognized JSON
/// block in a reply) are not errors and never surface here.
#[derive(Error, Debug)]
pub enum Error {
    // Model errors (E100-E199)
    #[error("API key missing. Set CHRONOS_API_KEY or OPENROUTER_API_KEY.")]
    ApiKeyMissing,

    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("LLM API error: {0}")]
    LLMError(String),

    #[error("Rate limited. Waiting {0} seconds before retry.")]
    RateLimited(u64),

    // Knowledge errors (E200-E299)
    #[error("Knowledge entry '{0}' not found. Run `chronos corpus list` to see all entries.")]
    EntryNotFound(String),

    #[error("Invalid knowledge corpus: {0}")]
    CorpusInvalid(String),

    // Config errors (E300-E399)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E400-E499)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Serialization errors (E500-E599)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::ApiKeyMissing => "E100",
            Self::NetworkError(_) => "E101",
            Self::LLMError(_) => "E102",
            Self::RateLimited(_) => "E103",
            Self::EntryNotFound(_) => "E200",
            Self::CorpusInvalid(_) => "E201",
            Self::ConfigError(_) => "E300",
            Self::InvalidInput(_) => "E400",
            Self::Json(_) => "E500",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::ApiKeyMissing => Some("export OPENROUTER_API_KEY=<key>".to_string()),
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::LLMError(_) => Some("chronos config get llm.api_key".to_string()),
            Self::EntryNotFound(_) => Some("chronos corpus list".to_string()),
            Self::CorpusInvalid(_) => Some("chronos config get retrieval.corpus_path".to_string()),
            _ => None,
        }
    }

    /// Whether the failure came from reaching the remote model
    ///
    /// The assistant turns these into a connectivity-failure reply instead of
    /// propagating them.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::NetworkError(_) | Self::LLMError(_) | Self::RateLimited(_)
        )
    }
}
