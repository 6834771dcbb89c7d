//! Document ingestion: chunk → embed → store.
//!
//! The [`Ingestor`] composes an [`EmbeddingProvider`], a [`VectorStore`] and
//! a [`Chunker`]. It owns the write side of the chunk store; retrieval reads
//! the same store directly.
//!
//! # Example
//!
//! ```rust,ignore
//! use kt_rag::{Ingestor, RagConfig, InMemoryVectorStore, RecursiveChunker};
//!
//! let ingestor = Ingestor::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//!
//! ingestor.ensure_ready().await?;
//! let stored = ingestor.ingest("doc-1", &pages).await?;
//! ```

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Page, StoredChunk};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Writes documents into the chunk store and removes them again.
///
/// Construct one via [`Ingestor::builder()`].
pub struct Ingestor {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
}

impl Ingestor {
    /// Create a new [`IngestorBuilder`].
    pub fn builder() -> IngestorBuilder {
        IngestorBuilder::default()
    }

    /// Create the collection if it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if the vector store operation fails.
    pub async fn ensure_ready(&self) -> Result<()> {
        self.vector_store.ensure_ready().await.map_err(|e| {
            error!(collection = %self.config.collection, error = %e, "failed to prepare collection");
            RagError::PipelineError(format!(
                "failed to prepare collection '{}': {e}",
                self.config.collection
            ))
        })
    }

    /// Ingest the pages of one document.
    ///
    /// Chunks are numbered densely from 0 across the whole document and get
    /// fresh UUID point ids. Returns the stored records.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if embedding or storage fails,
    /// including the document ID in the error message.
    pub async fn ingest(&self, document_id: &str, pages: &[Page]) -> Result<Vec<StoredChunk>> {
        let pieces = self.chunker.chunk(pages);
        if pieces.is_empty() {
            info!(document.id = document_id, chunk_count = 0, "ingested document (empty)");
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = pieces.iter().map(|p| p.text.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            error!(document.id = document_id, error = %e, "embedding failed during ingestion");
            RagError::PipelineError(format!("embedding failed for document '{document_id}': {e}"))
        })?;
        if embeddings.len() != pieces.len() {
            return Err(RagError::PipelineError(format!(
                "embedding provider returned {} vectors for {} chunks",
                embeddings.len(),
                pieces.len()
            )));
        }

        let records: Vec<StoredChunk> = pieces
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (piece, vector))| StoredChunk {
                id: Uuid::new_v4().to_string(),
                text: piece.text,
                page_number: piece.page,
                chunk_number: i as u32,
                document_id: document_id.to_string(),
                vector,
            })
            .collect();

        self.vector_store.upsert(&records).await.map_err(|e| {
            error!(document.id = document_id, error = %e, "upsert failed during ingestion");
            RagError::PipelineError(format!("upsert failed for document '{document_id}': {e}"))
        })?;

        info!(document.id = document_id, chunk_count = records.len(), "ingested document");
        Ok(records)
    }

    /// Delete every chunk of a document. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if the vector store operation fails.
    pub async fn delete(&self, document_id: &str) -> Result<usize> {
        let deleted = self.vector_store.delete_by_document(document_id).await.map_err(|e| {
            error!(document.id = document_id, error = %e, "delete failed");
            RagError::PipelineError(format!("delete failed for document '{document_id}': {e}"))
        })?;
        info!(document.id = document_id, deleted, "deleted document chunks");
        Ok(deleted)
    }
}

/// Builder for constructing an [`Ingestor`].
///
/// `embedding_provider` and `vector_store` are required. Without an explicit
/// chunker a [`RecursiveChunker`] is built from the config.
#[derive(Default)]
pub struct IngestorBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl IngestorBuilder {
    /// Set the ingestion configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`Ingestor`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the provider's dimensionality disagrees with the config.
    pub fn build(self) -> Result<Ingestor> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        if embedding_provider.dimensions() != config.dimensions {
            return Err(RagError::ConfigError(format!(
                "embedding provider produces {} dimensions but the collection expects {}",
                embedding_provider.dimensions(),
                config.dimensions
            )));
        }
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap))
        });
        Ok(Ingestor { config, embedding_provider, vector_store, chunker })
    }
}
