use thiserror::Error;

#[derive(Error, Debug)]
pub enum MinervaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Stream timeout")]
    StreamTimeout,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Rate limit exceeded for user {0}")]
    RateLimited(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Custom(String),
}

impl MinervaError {
    /// Whether a failed request is worth retrying from the client side.
    ///
    /// Cancellation is a deliberate user action and must not retrigger the
    /// request; configuration and rate-limit failures will not go away on
    /// their own either. Everything else is treated as transient.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            Self::Cancelled | Self::Config(_) | Self::RateLimited(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MinervaError>;
