use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

/// Environment variable consulted when the config file leaves the
/// generation API key empty.
pub const GENERATION_KEY_ENV: &str = "MINERVA_OPENAI_API_KEY";
/// Environment variable consulted when the config file leaves the
/// retrieval API key empty.
pub const RETRIEVAL_KEY_ENV: &str = "MINERVA_PINECONE_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub backtrace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Host of the vector index, e.g. `my-index-abc123.svc.pinecone.io`.
    pub index_host: String,
    /// API key for the vector index. May be left empty and supplied via
    /// `MINERVA_PINECONE_API_KEY` instead.
    #[serde(default)]
    pub api_key: String,
    /// Endpoint of the embeddings API (OpenAI wire shape).
    #[serde(default = "default_embedding_endpoint")]
    pub embedding_endpoint: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_embedding_endpoint() -> String {
    "https://api.openai.com".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Endpoint of the chat completions API (OpenAI wire shape).
    pub endpoint: String,
    /// API key. May be left empty and supplied via `MINERVA_OPENAI_API_KEY`.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    1500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Hard cap on the generation stream before the relay gives up.
    #[serde(default = "default_stream_timeout_secs")]
    pub stream_timeout_secs: u64,
    /// Minimum interval between buffer snapshots forwarded to the client.
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    /// Messages of history interpolated into the prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Conversation length cap; exceeding it clears the history.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    /// Client-side retry attempts for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_stream_timeout_secs() -> u64 {
    30
}

fn default_update_interval_ms() -> u64 {
    100
}

fn default_history_window() -> usize {
    3
}

fn default_max_messages() -> usize {
    20
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            stream_timeout_secs: default_stream_timeout_secs(),
            update_interval_ms: default_update_interval_ms(),
            history_window: default_history_window(),
            max_messages: default_max_messages(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_requests() -> u32 {
    20
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from default config file path
    pub fn load() -> crate::Result<Self> {
        // Try to load from config.toml first, then fall back to config.example.toml
        if Path::new("config.toml").exists() {
            Self::from_file("config.toml")
        } else if Path::new("config.example.toml").exists() {
            eprintln!(
                "Warning: Using config.example.toml. Please create config.toml for production use."
            );
            Self::from_file("config.example.toml")
        } else {
            Err(crate::MinervaError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config file found. Please create config.toml or config.example.toml",
            )))
        }
    }

    /// Generation API key, with environment override.
    ///
    /// Validated per request: a missing key fails that request with a
    /// configuration error rather than crashing the process.
    pub fn generation_key(&self) -> crate::Result<String> {
        resolve_key(&self.generation.api_key, GENERATION_KEY_ENV, "generation")
    }

    /// Retrieval API key, with environment override.
    pub fn retrieval_key(&self) -> crate::Result<String> {
        resolve_key(&self.retrieval.api_key, RETRIEVAL_KEY_ENV, "retrieval")
    }

    /// Vector index host; empty is a per-request configuration error.
    pub fn index_host(&self) -> crate::Result<&str> {
        if self.retrieval.index_host.trim().is_empty() {
            return Err(crate::MinervaError::Config(
                "retrieval.index_host is not set".to_string(),
            ));
        }
        Ok(&self.retrieval.index_host)
    }

    pub fn stream_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.chat.stream_timeout_secs)
    }

    pub fn update_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.chat.update_interval_ms)
    }

    pub fn retry_base_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.chat.retry_base_delay_ms)
    }
}

fn resolve_key(configured: &str, env_var: &str, which: &str) -> crate::Result<String> {
    if !configured.trim().is_empty() {
        return Ok(configured.trim().to_string());
    }
    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(crate::MinervaError::Config(format!(
            "missing {which} API key: set it in config.toml or export {env_var}"
        ))),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                enable_cors: true,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                backtrace: false,
            },
            retrieval: RetrievalConfig {
                index_host: String::new(),
                api_key: String::new(),
                embedding_endpoint: default_embedding_endpoint(),
                embedding_model: default_embedding_model(),
            },
            generation: GenerationConfig {
                endpoint: "https://api.openai.com".to_string(),
                api_key: String::new(),
                model: default_model(),
                temperature: default_temperature(),
                max_tokens: default_max_tokens(),
            },
            chat: ChatConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
