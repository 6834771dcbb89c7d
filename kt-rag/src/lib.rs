//! # kt-rag
//!
//! Chunk storage for the knowledge table service: loading documents into
//! pages, splitting pages into numbered chunks, embedding them, and storing
//! them in a vector collection that supports similarity and substring
//! search scoped to one document.
//!
//! ## Features
//!
//! - `openai`: [`openai::OpenAIEmbeddingProvider`]
//! - `qdrant`: [`qdrant::QdrantVectorStore`]
//! - `pdf`: [`PdfLoader`], picked for `.pdf` files by [`ExtensionLoader`]
//! - `full`: everything above

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod inmemory;
pub mod loader;
pub mod pattern;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use chunking::{Chunker, PageChunk, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Page, StoredChunk};
pub use embedding::{EmbeddingProvider, HashEmbeddingProvider};
pub use error::{RagError, Result};
pub use ingest::{Ingestor, IngestorBuilder};
pub use inmemory::InMemoryVectorStore;
pub use loader::{DocumentLoader, ExtensionLoader, TextLoader};
#[cfg(feature = "pdf")]
pub use loader::PdfLoader;
pub use pattern::{LikeMatcher, like_pattern};
pub use vectorstore::VectorStore;
