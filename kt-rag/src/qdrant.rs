//! Qdrant vector store backend.
//!
//! Provides [`QdrantVectorStore`] which implements [`VectorStore`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//! Chunk fields are stored as payload; `document_id` is keyword-indexed so
//! every query can filter on it.
//!
//! # Example
//!
//! ```rust,ignore
//! use kt_rag::qdrant::QdrantVectorStore;
//!
//! let store = QdrantVectorStore::new("http://localhost:6334", "knowledge_table", 768)?;
//! store.ensure_ready().await?;
//! store.upsert(&records).await?;
//! let hits = store.vector_search(&query_embedding, "doc-1", 40).await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, Filter, PointId, PointStruct, ScrollPointsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::debug;

use crate::document::StoredChunk;
use crate::error::{RagError, Result};
use crate::pattern::{LikeMatcher, like_literal};
use crate::vectorstore::VectorStore;

const SCROLL_PAGE: u32 = 256;

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
///
/// One instance maps to one Qdrant collection with cosine distance.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    dimensions: usize,
}

impl QdrantVectorStore {
    /// Create a new Qdrant vector store connecting to the given URL.
    pub fn new(url: &str, collection: impl Into<String>, dimensions: usize) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Self::map_err)?;
        Ok(Self::from_client(client, collection, dimensions))
    }

    /// Create a new Qdrant vector store from an existing client.
    pub fn from_client(client: Qdrant, collection: impl Into<String>, dimensions: usize) -> Self {
        Self { client, collection: collection.into(), dimensions }
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::VectorStoreError { backend: "qdrant".to_string(), message: e.to_string() }
    }

    fn document_filter(document_id: &str) -> Filter {
        Filter::must([Condition::matches("document_id", document_id.to_string())])
    }

    fn extract_string(value: &QdrantValue) -> Option<String> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn extract_u32(value: &QdrantValue) -> Option<u32> {
        match &value.kind {
            Some(Kind::IntegerValue(n)) => u32::try_from(*n).ok(),
            Some(Kind::DoubleValue(n)) => Some(*n as u32),
            _ => None,
        }
    }

    fn point_id_string(id: Option<&PointId>) -> String {
        id.and_then(|pid| match &pid.point_id_options {
            Some(PointIdOptions::Uuid(s)) => Some(s.clone()),
            Some(PointIdOptions::Num(n)) => Some(n.to_string()),
            None => None,
        })
        .unwrap_or_default()
    }

    fn record_from_payload(id: Option<&PointId>, payload: &HashMap<String, QdrantValue>) -> StoredChunk {
        let text = payload.get("text").and_then(Self::extract_string).unwrap_or_default();
        let document_id =
            payload.get("document_id").and_then(Self::extract_string).unwrap_or_default();
        let page_number = payload.get("page_number").and_then(Self::extract_u32).unwrap_or(0);
        let chunk_number = payload.get("chunk_number").and_then(Self::extract_u32).unwrap_or(0);
        StoredChunk {
            id: Self::point_id_string(id),
            text,
            page_number,
            chunk_number,
            document_id,
            vector: Vec::new(),
        }
    }

    async fn scroll(&self, filter: Filter) -> Result<Vec<StoredChunk>> {
        let mut records = Vec::new();
        let mut offset: Option<PointId> = None;
        loop {
            let mut request = ScrollPointsBuilder::new(&self.collection)
                .filter(filter.clone())
                .limit(SCROLL_PAGE)
                .with_payload(true);
            if let Some(next) = offset.take() {
                request = request.offset(next);
            }
            let response = self.client.scroll(request).await.map_err(Self::map_err)?;
            records.extend(
                response
                    .result
                    .iter()
                    .map(|point| Self::record_from_payload(point.id.as_ref(), &point.payload)),
            );
            match response.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_ready(&self) -> Result<()> {
        let exists =
            self.client.collection_exists(&self.collection).await.map_err(Self::map_err)?;
        if exists {
            debug!(collection = %self.collection, "qdrant collection already exists, skipping creation");
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.dimensions as u64, Distance::Cosine),
                ),
            )
            .await
            .map_err(Self::map_err)?;
        self.client
            .create_field_index(
                CreateFieldIndexCollectionBuilder::new(
                    &self.collection,
                    "document_id",
                    FieldType::Keyword,
                )
                .wait(true),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection = %self.collection, dimensions = self.dimensions, "created qdrant collection");
        Ok(())
    }

    async fn upsert(&self, records: &[StoredChunk]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let points: Vec<PointStruct> = records
            .iter()
            .map(|record| {
                let mut payload = Payload::new();
                payload.insert("text", record.text.clone());
                payload.insert("document_id", record.document_id.clone());
                payload.insert("page_number", i64::from(record.page_number));
                payload.insert("chunk_number", i64::from(record.chunk_number));
                PointStruct::new(record.id.clone(), record.vector.clone(), payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection = %self.collection, count = records.len(), "upserted chunks to qdrant");
        Ok(records.len())
    }

    async fn vector_search(
        &self,
        query: &[f32],
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredChunk>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, query.to_vec(), limit as u64)
                    .filter(Self::document_filter(document_id))
                    .with_payload(true),
            )
            .await
            .map_err(Self::map_err)?;

        Ok(response
            .result
            .iter()
            .map(|scored| Self::record_from_payload(scored.id.as_ref(), &scored.payload))
            .collect())
    }

    async fn substring_search(
        &self,
        document_id: &str,
        patterns: &[String],
    ) -> Result<Vec<StoredChunk>> {
        if patterns.is_empty() {
            return Ok(Vec::new());
        }

        let literals: Option<Vec<String>> = patterns.iter().map(|p| like_literal(p)).collect();
        let mut records = match literals {
            // unindexed text match is an exact substring test
            Some(literals) => {
                let mut filter = Self::document_filter(document_id);
                filter.should =
                    literals.into_iter().map(|l| Condition::matches_text("text", l)).collect();
                self.scroll(filter).await?
            }
            None => {
                let matcher = LikeMatcher::new(patterns)?;
                let mut all = self.scroll(Self::document_filter(document_id)).await?;
                all.retain(|record| matcher.is_match(&record.text));
                all
            }
        };
        records.sort_by_key(|record| record.chunk_number);
        Ok(records)
    }

    async fn count_by_document(&self, document_id: &str) -> Result<usize> {
        let response = self
            .client
            .count(
                CountPointsBuilder::new(&self.collection)
                    .filter(Self::document_filter(document_id))
                    .exact(true),
            )
            .await
            .map_err(Self::map_err)?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    async fn delete_by_document(&self, document_id: &str) -> Result<usize> {
        let count = self.count_by_document(document_id).await?;
        if count == 0 {
            return Ok(0);
        }

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(Self::document_filter(document_id))
                    .wait(true),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection = %self.collection, document.id = document_id, count, "deleted points from qdrant");
        Ok(count)
    }
}
