use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::providers::traits::GenerationParams;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
    #[error("Unknown provider: {0}. Available providers: bedrock, openai")]
    UnknownProvider(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Bedrock,
    OpenAI,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bedrock" | "aws" => Ok(ProviderKind::Bedrock),
            "openai" => Ok(ProviderKind::OpenAI),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BedrockConfig {
    pub region: String,
    /// Overrides the regional `bedrock-runtime` endpoint, e.g. a VPC endpoint.
    pub endpoint_url: Option<String>,
    pub bearer_token: Option<String>,
    pub embedding_model: String,
    pub chat_model: String,
}

#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub embedding_model: String,
    pub chat_model: String,
}

/// Where the persisted index pair lives. Both paths are always used together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub papers_dir: PathBuf,
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: impl Into<PathBuf>, papers_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            index_path: data_dir.join("faiss_index.bin"),
            metadata_path: data_dir.join("metadata.json"),
            papers_dir: papers_dir.into(),
            data_dir,
        }
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("index.lock")
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: ProviderKind,
    pub storage: StorageConfig,
    pub chunk_size: usize,
    pub top_k: usize,
    pub embed_concurrency: usize,
    pub generation: GenerationParams,
    pub http_timeout: Duration,
    pub bedrock: BedrockConfig,
    pub openai: OpenAIConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let provider = env::var("RAG_PROVIDER")
            .map(|p| p.parse::<ProviderKind>())
            .unwrap_or(Ok(ProviderKind::Bedrock))?;

        let data_dir = env::var("RAG_DATA_DIR").unwrap_or_else(|_| "data".to_string());
        let papers_dir = env::var("RAG_PAPERS_DIR").unwrap_or_else(|_| "papers".to_string());
        let mut storage = StorageConfig::new(&data_dir, papers_dir);
        if let Ok(name) = env::var("RAG_INDEX_FILE") {
            storage.index_path = storage.data_dir.join(name);
        }
        if let Ok(name) = env::var("RAG_METADATA_FILE") {
            storage.metadata_path = storage.data_dir.join(name);
        }

        let generation = GenerationParams {
            max_output_tokens: parse_var("RAG_MAX_TOKENS", 500)?,
            temperature: parse_var("RAG_TEMPERATURE", 0.3)?,
        };

        let bedrock = BedrockConfig {
            region: env::var("AWS_DEFAULT_REGION").unwrap_or_else(|_| "ap-southeast-2".to_string()),
            endpoint_url: env::var("BEDROCK_ENDPOINT_URL").ok().filter(|u| !u.trim().is_empty()),
            bearer_token: env::var("AWS_BEARER_TOKEN_BEDROCK").ok(),
            embedding_model: env::var("BEDROCK_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "amazon.titan-embed-text-v2:0".to_string()),
            chat_model: env::var("BEDROCK_CHAT_MODEL")
                .unwrap_or_else(|_| "amazon.nova-pro-v1:0".to_string()),
        };

        let openai = OpenAIConfig {
            api_key: env::var("OPENAI_API_KEY").ok(),
            api_url: env::var("OPENAI_API_URL").ok(),
            embedding_model: env::var("OPENAI_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            chat_model: env::var("OPENAI_CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        };

        let config = Self {
            provider,
            storage,
            chunk_size: parse_var("RAG_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
            top_k: parse_var("RAG_TOP_K", DEFAULT_TOP_K)?,
            embed_concurrency: parse_var("RAG_EMBED_CONCURRENCY", 4)?,
            generation,
            http_timeout: Duration::from_secs(parse_var("RAG_HTTP_TIMEOUT_SECS", 120)?),
            bedrock,
            openai,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("RAG_CHUNK_SIZE", self.chunk_size),
            ("RAG_TOP_K", self.top_k),
            ("RAG_EMBED_CONCURRENCY", self.embed_concurrency),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
        if !(0.0..=1.0).contains(&self.generation.temperature) {
            return Err(ConfigError::InvalidValue {
                name: "RAG_TEMPERATURE".to_string(),
                value: self.generation.temperature.to_string(),
            });
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Bedrock,
            storage: StorageConfig::new("data", "papers"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            top_k: DEFAULT_TOP_K,
            embed_concurrency: 4,
            generation: GenerationParams::default(),
            http_timeout: Duration::from_secs(120),
            bedrock: BedrockConfig {
                region: "ap-southeast-2".to_string(),
                endpoint_url: None,
                bearer_token: None,
                embedding_model: "amazon.titan-embed-text-v2:0".to_string(),
                chat_model: "amazon.nova-pro-v1:0".to_string(),
            },
            openai: OpenAIConfig {
                api_key: None,
                api_url: None,
                embedding_model: "text-embedding-3-small".to_string(),
                chat_model: "gpt-4o-mini".to_string(),
            },
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}
