use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch of {url} failed: {message}")]
    Fetch { url: String, message: String },

    #[error("Missing expected page structure: {0}")]
    ParseStructure(String),

    #[error("Date text '{raw}' does not match pattern '{pattern}'")]
    DateFormat { raw: String, pattern: String },

    #[error("Source '{0}' produced no events")]
    SourceExhausted(String),

    #[error("All {sources} configured source(s) failed to produce events")]
    TotalFailure { sources: usize },
}

impl ScraperError {
    pub fn date_format(raw: impl Into<String>, pattern: impl Into<String>) -> Self {
        ScraperError::DateFormat {
            raw: raw.into(),
            pattern: pattern.into(),
        }
    }

    /// Whether a failed fetch is worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ScraperError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map_or(true, |status| status.is_server_error())
            }
            ScraperError::Fetch { .. } => true,
            ScraperError::Io(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
