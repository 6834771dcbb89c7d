//! Error types for the `kt-core` crate.

use std::fmt;

use kt_rag::RagError;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the answer pipeline and the service facade.
#[derive(Debug, Error)]
pub enum KtError {
    /// A request field is missing or invalid.
    #[error("Bad input: {0}")]
    BadInput(String),

    /// Model output could not be coerced to the requested shape.
    ///
    /// The pipeline turns this into a null answer; it only escapes from
    /// [`validate`](crate::validate::validate) itself.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// An LLM, embedding or vector-store call failed or ran out of time.
    #[error("External service unavailable ({service}): {message}")]
    ExternalUnavailable {
        /// The collaborator that failed.
        service: String,
        /// A description of the failure.
        message: String,
    },

    /// Invalid configuration or wiring.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KtError {
    /// Build an [`KtError::ExternalUnavailable`].
    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalUnavailable { service: service.into(), message: message.into() }
    }

    /// The category reported to clients.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadInput(_) => ErrorKind::BadInput,
            Self::SchemaViolation(_) => ErrorKind::SchemaViolation,
            Self::ExternalUnavailable { .. } => ErrorKind::ExternalUnavailable,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<RagError> for KtError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::ConfigError(message) => Self::Config(message),
            RagError::EmbeddingError { provider, message } => {
                Self::ExternalUnavailable { service: format!("embedding:{provider}"), message }
            }
            RagError::VectorStoreError { backend, message } => {
                Self::ExternalUnavailable { service: format!("vector_store:{backend}"), message }
            }
            RagError::LoaderError { loader, message } => {
                Self::BadInput(format!("document could not be loaded ({loader}): {message}"))
            }
            other => Self::ExternalUnavailable { service: "storage".to_string(), message: other.to_string() },
        }
    }
}

/// Machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadInput,
    SchemaViolation,
    ExternalUnavailable,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadInput => "bad_input",
            Self::SchemaViolation => "schema_violation",
            Self::ExternalUnavailable => "external_unavailable",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A convenience result type for core operations.
pub type Result<T> = std::result::Result<T, KtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rag_errors_map_to_kinds() {
        let config: KtError = RagError::ConfigError("bad".into()).into();
        assert_eq!(config.kind(), ErrorKind::Config);

        let store: KtError =
            RagError::VectorStoreError { backend: "qdrant".into(), message: "down".into() }.into();
        assert_eq!(store.kind(), ErrorKind::ExternalUnavailable);
        assert!(store.to_string().contains("vector_store:qdrant"));

        let pipeline: KtError = RagError::PipelineError("upsert failed".into()).into();
        assert_eq!(pipeline.kind(), ErrorKind::ExternalUnavailable);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ExternalUnavailable).unwrap();
        assert_eq!(json, "\"external_unavailable\"");
        assert_eq!(ErrorKind::BadInput.to_string(), "bad_input");
    }
}
