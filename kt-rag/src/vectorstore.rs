//! Vector store trait for storing and searching document chunks.

use async_trait::async_trait;

use crate::document::StoredChunk;
use crate::error::Result;

/// A storage backend for chunk embeddings scoped to a single collection.
///
/// One store instance is shared by every request and must be safe to use
/// concurrently. All searches are filtered to a single `document_id`.
///
/// # Example
///
/// ```rust,ignore
/// use kt_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.ensure_ready().await?;
/// store.upsert(&records).await?;
/// let hits = store.vector_search(&query_embedding, "doc-1", 40).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the backing collection if it is absent. Idempotent.
    async fn ensure_ready(&self) -> Result<()>;

    /// Insert or replace records by id. Returns the number written.
    async fn upsert(&self, records: &[StoredChunk]) -> Result<usize>;

    /// Return up to `limit` chunks of `document_id`, most similar first.
    async fn vector_search(
        &self,
        query: &[f32],
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredChunk>>;

    /// Return every chunk of `document_id` whose text matches at least one
    /// SQL `LIKE` pattern (see [`like_pattern`](crate::pattern::like_pattern)).
    ///
    /// Results are unranked; callers score them.
    async fn substring_search(
        &self,
        document_id: &str,
        patterns: &[String],
    ) -> Result<Vec<StoredChunk>>;

    /// Count the chunks stored for `document_id`.
    async fn count_by_document(&self, document_id: &str) -> Result<usize>;

    /// Delete every chunk of `document_id`, returning how many were removed.
    async fn delete_by_document(&self, document_id: &str) -> Result<usize>;
}
