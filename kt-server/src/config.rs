//! Server configuration read from the environment.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use kt_core::CoreConfig;
use kt_rag::RagConfig;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("{0} is required")]
    Missing(String),
}

/// Which language model and embedding backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAI,
    /// Scripted model and hash embeddings; no network access.
    Mock,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "mock" => Ok(Self::Mock),
            other => Err(format!("unknown provider '{other}' (expected openai or mock)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorDbKind {
    Memory,
    Qdrant,
}

impl FromStr for VectorDbKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "qdrant" => Ok(Self::Qdrant),
            other => Err(format!("unknown vector db '{other}' (expected memory or qdrant)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected pretty or json)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub provider: ProviderKind,
    pub openai_api_key: Option<String>,
    pub llm_model: String,
    pub embedding_model: String,
    pub dimensions: usize,
    pub vector_db: VectorDbKind,
    pub qdrant_url: String,
    pub collection: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            provider: ProviderKind::OpenAI,
            openai_api_key: None,
            llm_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            dimensions: 768,
            vector_db: VectorDbKind::Memory,
            qdrant_url: "http://localhost:6334".to_string(),
            collection: "knowledge_table".to_string(),
            chunk_size: 512,
            chunk_overlap: 64,
            request_timeout: Duration::from_secs(60),
            log_format: LogFormat::Pretty,
        }
    }
}

impl ServerConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from a key lookup. Unset or empty keys keep their
    /// defaults; unparseable values are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let config = Self {
            host: get("KT_HOST").unwrap_or(defaults.host),
            port: parse(&get, "KT_PORT", defaults.port)?,
            provider: parse(&get, "KT_PROVIDER", defaults.provider)?,
            openai_api_key: get("OPENAI_API_KEY"),
            llm_model: get("KT_LLM_MODEL").unwrap_or(defaults.llm_model),
            embedding_model: get("KT_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            dimensions: parse(&get, "KT_DIMENSIONS", defaults.dimensions)?,
            vector_db: parse(&get, "KT_VECTOR_DB", defaults.vector_db)?,
            qdrant_url: get("KT_QDRANT_URL").unwrap_or(defaults.qdrant_url),
            collection: get("KT_COLLECTION").unwrap_or(defaults.collection),
            chunk_size: parse(&get, "KT_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse(&get, "KT_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            request_timeout: Duration::from_secs(parse(
                &get,
                "KT_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            log_format: parse(&get, "KT_LOG_FORMAT", defaults.log_format)?,
        };

        if config.provider == ProviderKind::OpenAI && config.openai_api_key.is_none() {
            return Err(ConfigError::Missing("OPENAI_API_KEY".to_string()));
        }
        config.rag_config()?;
        config.core_config()?;
        Ok(config)
    }

    pub fn rag_config(&self) -> Result<RagConfig, ConfigError> {
        RagConfig::builder()
            .chunk_size(self.chunk_size)
            .chunk_overlap(self.chunk_overlap)
            .dimensions(self.dimensions)
            .collection(self.collection.clone())
            .build()
            .map_err(|e| ConfigError::Invalid { key: "KT_CHUNK_*/KT_DIMENSIONS".to_string(), message: e.to_string() })
    }

    pub fn core_config(&self) -> Result<CoreConfig, ConfigError> {
        CoreConfig::builder()
            .request_timeout(self.request_timeout)
            .build()
            .map_err(|e| ConfigError::Invalid { key: "KT_REQUEST_TIMEOUT_SECS".to_string(), message: e.to_string() })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid { key: key.to_string(), message: e.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn mock_provider_needs_no_key() {
        let config = ServerConfig::from_lookup(lookup(&[("KT_PROVIDER", "mock")])).unwrap();
        assert_eq!(config.provider, ProviderKind::Mock);
        assert_eq!(config.port, 8000);
        assert_eq!(config.vector_db, VectorDbKind::Memory);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn openai_requires_key() {
        let err = ServerConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("OPENAI_API_KEY".to_string()));
        let config = ServerConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn reads_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("KT_PROVIDER", "MOCK"),
            ("KT_HOST", "0.0.0.0"),
            ("KT_PORT", "9100"),
            ("KT_VECTOR_DB", "qdrant"),
            ("KT_DIMENSIONS", "1536"),
            ("KT_REQUEST_TIMEOUT_SECS", "5"),
            ("KT_LOG_FORMAT", "json"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:9100");
        assert_eq!(config.vector_db, VectorDbKind::Qdrant);
        assert_eq!(config.dimensions, 1536);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_values_are_errors() {
        let err = ServerConfig::from_lookup(lookup(&[("KT_PROVIDER", "mock"), ("KT_PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "KT_PORT"));

        let err =
            ServerConfig::from_lookup(lookup(&[("KT_PROVIDER", "mock"), ("KT_CHUNK_OVERLAP", "600")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = ServerConfig::from_lookup(lookup(&[("KT_PROVIDER", "gemini")])).unwrap_err();
        assert!(err.to_string().contains("KT_PROVIDER"));
    }

    #[test]
    fn blank_values_keep_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[("KT_PROVIDER", "mock"), ("KT_PORT", "  ")])).unwrap();
        assert_eq!(config.port, 8000);
    }
}
