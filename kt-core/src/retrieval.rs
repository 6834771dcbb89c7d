//! Retrieval planning: vector, hybrid and decomposition search.
//!
//! Every mode ends with [`fuse`]: a stable sort by `chunk_number` followed
//! by de-duplication on `chunk_number`, keeping the first arrival. Results
//! therefore come back in document order with strictly increasing chunk
//! numbers.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use futures::future::try_join_all;
use kt_rag::{EmbeddingProvider, StoredChunk, VectorStore, like_pattern};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::error::Result;
use crate::llm::{CompletionShape, LanguageModel};
use crate::prompt;
use crate::rule::{self, Rule};
use crate::shape::{AnswerShape, AnswerValue};
use crate::validate::validate;

/// Message attached to a retrieval over a document with no stored chunks.
pub const NO_DATA_MESSAGE: &str = "No data found for the given document.";
const SUCCESS_MESSAGE: &str = "Query processed successfully.";

/// Retrieval strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Top-K similarity search.
    #[default]
    #[serde(alias = "simple_vector")]
    Vector,
    /// Keyword substring matches fused with similarity search.
    Hybrid,
    /// Hybrid search over model-generated sub-queries.
    #[serde(alias = "decomposed")]
    Decomposition,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Hybrid => "hybrid",
            Self::Decomposition => "decomposition",
        }
    }

    /// Pick the mode for a query.
    ///
    /// An explicit decomposition request wins. Otherwise any rule or a
    /// boolean shape forces hybrid, and everything else uses the requested
    /// mode, vector by default.
    pub fn select(requested: Option<Self>, shape: AnswerShape, rules: &[Rule]) -> Self {
        match requested {
            Some(Self::Decomposition) => Self::Decomposition,
            _ if !rules.is_empty() || shape == AnswerShape::Bool => Self::Hybrid,
            requested => requested.unwrap_or_default(),
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of one retrieval.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieval {
    /// Fused passages in ascending `chunk_number` order.
    pub chunks: Vec<StoredChunk>,
    pub message: String,
    /// Keywords used for substring search, if any.
    pub keywords: Vec<String>,
    /// Sub-queries searched in decomposition mode.
    pub sub_queries: Vec<String>,
}

struct HybridHits {
    chunks: Vec<StoredChunk>,
    keywords: Vec<String>,
}

/// Runs retrieval against one chunk store.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LanguageModel>,
    config: CoreConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn LanguageModel>,
        config: CoreConfig,
    ) -> Self {
        Self { embedder, store, llm, config }
    }

    /// Retrieve passages of `document_id` for `query`.
    ///
    /// A document with no stored chunks yields an empty retrieval with
    /// [`NO_DATA_MESSAGE`]. Store, embedding and LLM transport failures are
    /// returned as errors.
    pub async fn retrieve(
        &self,
        mode: RetrievalMode,
        query: &str,
        document_id: &str,
        rules: &[Rule],
    ) -> Result<Retrieval> {
        let stored = self.store.count_by_document(document_id).await?;
        if stored == 0 {
            warn!(document.id = document_id, "no chunks stored for document");
            return Ok(Retrieval { message: NO_DATA_MESSAGE.to_string(), ..Default::default() });
        }

        let retrieval = match mode {
            RetrievalMode::Vector => Retrieval {
                chunks: fuse([self.vector(query, document_id).await?]),
                message: SUCCESS_MESSAGE.to_string(),
                ..Default::default()
            },
            RetrievalMode::Hybrid => {
                let hits = self.hybrid(query, document_id, rules).await?;
                Retrieval {
                    chunks: hits.chunks,
                    message: SUCCESS_MESSAGE.to_string(),
                    keywords: hits.keywords,
                    sub_queries: Vec::new(),
                }
            }
            RetrievalMode::Decomposition => {
                let sub_queries = self.decompose(query).await?;
                let batches = try_join_all(
                    sub_queries.iter().map(|sub_query| self.hybrid(sub_query, document_id, rules)),
                )
                .await?;

                let mut keywords: Vec<String> = Vec::new();
                let mut chunk_batches = Vec::with_capacity(batches.len());
                for hits in batches {
                    for keyword in hits.keywords {
                        if !keywords.contains(&keyword) {
                            keywords.push(keyword);
                        }
                    }
                    chunk_batches.push(hits.chunks);
                }
                Retrieval {
                    chunks: fuse(chunk_batches),
                    message: SUCCESS_MESSAGE.to_string(),
                    keywords,
                    sub_queries,
                }
            }
        };

        info!(
            document.id = document_id,
            mode = %mode,
            chunk_count = retrieval.chunks.len(),
            "retrieval completed"
        );
        Ok(retrieval)
    }

    async fn vector(&self, query: &str, document_id: &str) -> Result<Vec<StoredChunk>> {
        let embedding = self.embedder.embed(query).await?;
        let hits = self.store.vector_search(&embedding, document_id, self.config.vector_top_k).await?;
        debug!(document.id = document_id, hit_count = hits.len(), "vector search");
        Ok(hits)
    }

    async fn hybrid(&self, query: &str, document_id: &str, rules: &[Rule]) -> Result<HybridHits> {
        let ((keywords, keyword_hits), vector_hits) = tokio::try_join!(
            self.keyword_search(query, document_id, rules),
            self.vector(query, document_id),
        )?;
        Ok(HybridHits { chunks: fuse([keyword_hits, vector_hits]), keywords })
    }

    async fn keyword_search(
        &self,
        query: &str,
        document_id: &str,
        rules: &[Rule],
    ) -> Result<(Vec<String>, Vec<StoredChunk>)> {
        let mut keywords = rule::keyword_options(rules);
        if keywords.is_empty() {
            keywords = self.extract_keywords(query).await?;
        }
        if keywords.is_empty() {
            debug!(document.id = document_id, "no keywords; skipping substring search");
            return Ok((keywords, Vec::new()));
        }

        let patterns: Vec<String> = keywords.iter().map(|k| like_pattern(k)).collect();
        let matches = self.store.substring_search(document_id, &patterns).await?;
        let ranked = rank_by_keywords(matches, &keywords, self.config.keyword_top_k);
        debug!(document.id = document_id, ?keywords, hit_count = ranked.len(), "keyword search");
        Ok((keywords, ranked))
    }

    async fn extract_keywords(&self, query: &str) -> Result<Vec<String>> {
        let raw = self.llm.complete(&prompt::keywords(query), CompletionShape::Keywords).await?;
        Ok(string_list_or_empty(raw, "keywords"))
    }

    /// Sub-queries for `query`, or the query itself when the model declines.
    async fn decompose(&self, query: &str) -> Result<Vec<String>> {
        let raw = self
            .llm
            .complete(&prompt::sub_queries(query, self.config.max_sub_queries), CompletionShape::SubQueries)
            .await?;
        let mut sub_queries = string_list_or_empty(raw, "sub_queries");
        sub_queries.truncate(self.config.max_sub_queries);
        if sub_queries.is_empty() {
            debug!("query not decomposable; using it as is");
            sub_queries.push(query.to_string());
        }
        Ok(sub_queries)
    }
}

fn string_list_or_empty(raw: Option<serde_json::Value>, what: &str) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match validate(AnswerShape::StringList, &[], &raw) {
        Ok(Some(AnswerValue::StringList(items))) => {
            items.into_iter().filter(|item| !item.is_empty()).collect()
        }
        Ok(_) => Vec::new(),
        Err(e) => {
            warn!(error = %e, what, "ignoring malformed model output");
            Vec::new()
        }
    }
}

/// Concatenate batches, stable-sort by `chunk_number`, keep the first of
/// each `chunk_number`.
pub fn fuse<I>(batches: I) -> Vec<StoredChunk>
where
    I: IntoIterator<Item = Vec<StoredChunk>>,
{
    let mut chunks: Vec<StoredChunk> = batches.into_iter().flatten().collect();
    chunks.sort_by_key(|chunk| chunk.chunk_number);
    let mut seen = HashSet::new();
    chunks.retain(|chunk| seen.insert(chunk.chunk_number));
    chunks
}

/// Order chunks by total case-insensitive keyword occurrences, most first,
/// and keep the top `limit`. Ties keep arrival order.
pub fn rank_by_keywords(chunks: Vec<StoredChunk>, keywords: &[String], limit: usize) -> Vec<StoredChunk> {
    let lowered: Vec<String> =
        keywords.iter().map(|k| k.to_lowercase()).filter(|k| !k.is_empty()).collect();
    let mut scored: Vec<(usize, StoredChunk)> = chunks
        .into_iter()
        .map(|chunk| {
            let text = chunk.text.to_lowercase();
            let score = lowered.iter().map(|k| text.matches(k.as_str()).count()).sum();
            (score, chunk)
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(limit).map(|(_, chunk)| chunk).collect()
}
