//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a zero-dependency vector store
//! backed by a `HashMap` protected by a `tokio::sync::RwLock`. It is suitable
//! for development, testing, and small-scale use cases.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::StoredChunk;
use crate::error::{RagError, Result};
use crate::pattern::LikeMatcher;
use crate::vectorstore::VectorStore;

/// An in-memory vector store using cosine similarity for search.
///
/// Records are keyed by point id. The collection does not exist until
/// [`ensure_ready`](VectorStore::ensure_ready) is called, mirroring
/// server-backed stores.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collection: RwLock<Option<HashMap<String, StoredChunk>>>,
}

impl InMemoryVectorStore {
    /// Create a new store with no collection.
    pub fn new() -> Self {
        Self::default()
    }

    fn missing_collection() -> RagError {
        RagError::VectorStoreError {
            backend: "InMemory".to_string(),
            message: "collection does not exist".to_string(),
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_ready(&self) -> Result<()> {
        let mut collection = self.collection.write().await;
        if collection.is_none() {
            *collection = Some(HashMap::new());
            debug!(backend = "InMemory", "created collection");
        }
        Ok(())
    }

    async fn upsert(&self, records: &[StoredChunk]) -> Result<usize> {
        let mut collection = self.collection.write().await;
        let store = collection.as_mut().ok_or_else(Self::missing_collection)?;
        for record in records {
            store.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn vector_search(
        &self,
        query: &[f32],
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredChunk>> {
        let collection = self.collection.read().await;
        let store = collection.as_ref().ok_or_else(Self::missing_collection)?;

        let mut scored: Vec<(f32, &StoredChunk)> = store
            .values()
            .filter(|record| record.document_id == document_id)
            .map(|record| (cosine_similarity(&record.vector, query), record))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.chunk_number.cmp(&b.1.chunk_number))
        });
        scored.truncate(limit);
        Ok(scored.into_iter().map(|(_, record)| record.clone()).collect())
    }

    async fn substring_search(
        &self,
        document_id: &str,
        patterns: &[String],
    ) -> Result<Vec<StoredChunk>> {
        if patterns.is_empty() {
            return Ok(Vec::new());
        }
        let matcher = LikeMatcher::new(patterns)?;
        let collection = self.collection.read().await;
        let store = collection.as_ref().ok_or_else(Self::missing_collection)?;

        let mut matches: Vec<StoredChunk> = store
            .values()
            .filter(|record| record.document_id == document_id)
            .filter(|record| matcher.is_match(&record.text))
            .cloned()
            .collect();
        matches.sort_by_key(|record| record.chunk_number);
        Ok(matches)
    }

    async fn count_by_document(&self, document_id: &str) -> Result<usize> {
        let collection = self.collection.read().await;
        let store = collection.as_ref().ok_or_else(Self::missing_collection)?;
        Ok(store.values().filter(|record| record.document_id == document_id).count())
    }

    async fn delete_by_document(&self, document_id: &str) -> Result<usize> {
        let mut collection = self.collection.write().await;
        let store = collection.as_mut().ok_or_else(Self::missing_collection)?;
        let before = store.len();
        store.retain(|_, record| record.document_id != document_id);
        Ok(before - store.len())
    }
}
