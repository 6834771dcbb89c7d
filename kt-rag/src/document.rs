//! Data types for pages, retrieved chunks and stored chunk records.

use serde::{Deserialize, Serialize};

/// One page of text produced by a [`DocumentLoader`](crate::DocumentLoader).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    /// The page text.
    pub text: String,
    /// 1-based page number.
    pub page: u32,
}

/// A passage returned to callers: text plus the page it came from.
///
/// This is the unit of provenance attached to answers and graph exports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// The passage text.
    pub content: String,
    /// 1-based page number.
    pub page: u32,
}

/// A [`Chunk`] as persisted in a [`VectorStore`](crate::VectorStore).
///
/// `chunk_number` is dense and 0-based within its document and is the
/// de-duplication key for retrieval within a single query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredChunk {
    /// Point id, a hyphenated UUID (36 characters).
    pub id: String,
    /// The passage text.
    pub text: String,
    /// 1-based page number.
    pub page_number: u32,
    /// Document-local position of the chunk.
    pub chunk_number: u32,
    /// The owning document.
    pub document_id: String,
    /// The embedding of `text`. Backends may leave this empty on reads.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vector: Vec<f32>,
}

impl StoredChunk {
    /// Strip storage details, keeping content and page.
    pub fn to_chunk(&self) -> Chunk {
        Chunk { content: self.text.clone(), page: self.page_number }
    }
}

impl From<StoredChunk> for Chunk {
    fn from(stored: StoredChunk) -> Self {
        Chunk { content: stored.text, page: stored.page_number }
    }
}
