//! Configuration file support

use quill_chat::RequestOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Server used when neither the config file nor the command line names one
pub const DEFAULT_SERVER_URL: &str = "http://localhost:7091";

/// Configuration for quill
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the answer service
    pub server_url: Option<String>,
    /// Stream answers incrementally (true by default)
    pub stream: Option<bool>,
    /// Number of document chunks to retrieve per question
    pub chunks: Option<u32>,
    /// Token budget for conversation history
    pub token_limit: Option<u32>,
    pub retriever: Option<String>,
    /// Knowledge source to answer from
    pub active_docs: Option<String>,
    pub prompt_id: Option<String>,
    /// Resubmitting after a failed answer retries it in place
    pub auto_retry: Option<bool>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quill")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("QUILL_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            server_url: Some(DEFAULT_SERVER_URL.to_string()),
            stream: Some(true),
            chunks: Some(2),
            token_limit: None,
            retriever: None,
            active_docs: None,
            prompt_id: Some("default".to_string()),
            auto_retry: Some(true),
        };

        default_config.save()?;
        Ok(path)
    }

    pub fn server_url(&self) -> &str {
        self.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    /// Request settings for the pipeline
    pub fn request_options(&self) -> RequestOptions {
        RequestOptions {
            prompt_id: self.prompt_id.clone(),
            chunks: self.chunks,
            token_limit: self.token_limit,
            active_docs: self.active_docs.clone(),
            retriever: self.retriever.clone(),
        }
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# quill configuration file
# Place at ~/.config/quill/config.toml (Linux/Mac) or %APPDATA%\quill\config.toml (Windows)
# or point QUILL_CONFIG_PATH at another file

# Answer service base URL
server_url = "http://localhost:7091"

# Stream answers as they are produced; false waits for the full answer
stream = true

# Number of document chunks retrieved per question
chunks = 2

# Token budget for conversation history (optional)
# token_limit = 2000

# Knowledge source and retriever (optional)
# active_docs = "local/my-docs"
# retriever = "classic"

# Prompt template id
prompt_id = "default"

# Resubmitting after a failed answer retries that answer instead of appending
auto_retry = true
"#
}
