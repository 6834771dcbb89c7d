//! Error types for the `kt-rag` crate.

use thiserror::Error;

/// Errors that can occur while storing, embedding or loading documents.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A document could not be read or decoded.
    #[error("Loader error ({loader}): {message}")]
    LoaderError {
        /// The loader that produced the error.
        loader: String,
        /// A description of the failure.
        message: String,
    },

    /// A substring-search pattern could not be compiled.
    #[error("Pattern error: {0}")]
    PatternError(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the ingestion flow.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

/// A convenience result type for storage and ingestion operations.
pub type Result<T> = std::result::Result<T, RagError>;
