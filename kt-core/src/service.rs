//! The request facade used by the HTTP layer.
//!
//! [`KnowledgeService`] wires the answer pipeline, graph export and the
//! ingestion plumbing to one set of collaborators, and bounds every
//! request's external work with the configured deadline.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use kt_rag::{DocumentLoader, EmbeddingProvider, ExtensionLoader, Ingestor, RagConfig, VectorStore};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::answer::{AnswerEngine, AnswerRequest, TypedAnswer};
use crate::config::CoreConfig;
use crate::error::{KtError, Result};
use crate::llm::LanguageModel;
use crate::schema::SchemaInducer;
use crate::table::Table;
use crate::triples::{GraphExport, TripleSynthesizer};

/// Reserved document id that requests an inferred answer.
pub const NULL_DOCUMENT_ID: &str = "00000000000000000000000000000000";

const DELETED_MESSAGE: &str = "Document deleted successfully.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub document_id: String,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub status: String,
    pub message: String,
    pub deleted: usize,
}

/// Answers queries, exports graphs and manages documents.
///
/// Construct one via [`KnowledgeService::builder()`].
pub struct KnowledgeService {
    engine: AnswerEngine,
    inducer: SchemaInducer,
    synthesizer: TripleSynthesizer,
    ingestor: Ingestor,
    loader: Arc<dyn DocumentLoader>,
    config: CoreConfig,
}

impl KnowledgeService {
    pub fn builder() -> KnowledgeServiceBuilder {
        KnowledgeServiceBuilder::default()
    }

    /// Prepare the chunk store. Call once before serving.
    pub async fn ensure_ready(&self) -> Result<()> {
        self.ingestor.ensure_ready().await?;
        Ok(())
    }

    /// Answer one query.
    ///
    /// # Errors
    ///
    /// [`KtError::BadInput`] for an empty query or document id, and
    /// [`KtError::ExternalUnavailable`] when a collaborator fails or the
    /// deadline passes.
    pub async fn answer(&self, request: &AnswerRequest) -> Result<TypedAnswer> {
        if request.prompt.query.trim().is_empty() {
            return Err(KtError::BadInput("query must not be empty".to_string()));
        }
        if !request.inferred && request.document_id.trim().is_empty() {
            return Err(KtError::BadInput("document_id must not be empty".to_string()));
        }
        self.with_deadline("answer", self.engine.answer(request)).await
    }

    /// Build a knowledge graph from `table`. Always succeeds, possibly empty.
    pub async fn export_triples(&self, table: &Table) -> GraphExport {
        let relationships =
            match tokio::time::timeout(self.config.request_timeout, self.inducer.induce(table)).await {
                Ok(relationships) => relationships,
                Err(_) => {
                    warn!(timeout = ?self.config.request_timeout, "schema induction timed out");
                    return GraphExport::default();
                }
            };
        if relationships.is_empty() {
            return GraphExport::default();
        }
        self.synthesizer.synthesize(table, &relationships)
    }

    /// Load, chunk, embed and store the file at `path`. Loading counts
    /// against the deadline.
    ///
    /// A 32-hex id is generated when `document_id` is `None`. The
    /// null-document id is rejected.
    pub async fn upload(&self, document_id: Option<&str>, path: &Path) -> Result<UploadOutcome> {
        let document_id = match document_id.map(str::trim) {
            Some("") => return Err(KtError::BadInput("document_id must not be empty".to_string())),
            Some(NULL_DOCUMENT_ID) => {
                return Err(KtError::BadInput("document_id is reserved".to_string()));
            }
            Some(id) => id.to_string(),
            None => Uuid::new_v4().simple().to_string(),
        };

        let stored = self
            .with_deadline("upload", async {
                let pages = self.loader.load(path).await?;
                self.ingestor.ingest(&document_id, &pages).await.map_err(KtError::from)
            })
            .await?;

        info!(document.id = %document_id, chunk_count = stored.len(), "uploaded document");
        Ok(UploadOutcome { document_id, chunk_count: stored.len() })
    }

    /// Remove every chunk of `document_id`. Idempotent.
    pub async fn delete(&self, document_id: &str) -> Result<DeleteOutcome> {
        if document_id.trim().is_empty() {
            return Err(KtError::BadInput("document_id must not be empty".to_string()));
        }
        let deleted = self
            .with_deadline("delete", async {
                self.ingestor.delete(document_id).await.map_err(KtError::from)
            })
            .await?;
        Ok(DeleteOutcome {
            status: "success".to_string(),
            message: DELETED_MESSAGE.to_string(),
            deleted,
        })
    }

    async fn with_deadline<T>(&self, operation: &str, work: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.config.request_timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                error!(operation, timeout = ?self.config.request_timeout, "request deadline exceeded");
                Err(KtError::external(
                    "deadline",
                    format!("{operation} exceeded {:?}", self.config.request_timeout),
                ))
            }
        }
    }
}

/// Builder for a [`KnowledgeService`].
///
/// The language model, embedding provider and vector store are required.
/// The loader defaults to [`ExtensionLoader`].
#[derive(Default)]
pub struct KnowledgeServiceBuilder {
    llm: Option<Arc<dyn LanguageModel>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn VectorStore>>,
    loader: Option<Arc<dyn DocumentLoader>>,
    synthesizer: Option<TripleSynthesizer>,
    rag_config: Option<RagConfig>,
    core_config: Option<CoreConfig>,
}

impl KnowledgeServiceBuilder {
    pub fn language_model(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn embedding_provider(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn triple_synthesizer(mut self, synthesizer: TripleSynthesizer) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn rag_config(mut self, config: RagConfig) -> Self {
        self.rag_config = Some(config);
        self
    }

    pub fn core_config(mut self, config: CoreConfig) -> Self {
        self.core_config = Some(config);
        self
    }

    /// # Errors
    ///
    /// Returns [`KtError::Config`] if a collaborator is missing or the
    /// embedding dimensionality disagrees with the RAG config.
    pub fn build(self) -> Result<KnowledgeService> {
        let llm = self.llm.ok_or_else(|| KtError::Config("language_model is required".to_string()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| KtError::Config("embedding_provider is required".to_string()))?;
        let store = self.store.ok_or_else(|| KtError::Config("vector_store is required".to_string()))?;
        let config = self.core_config.unwrap_or_default();

        let ingestor = Ingestor::builder()
            .config(self.rag_config.unwrap_or_default())
            .embedding_provider(embedder.clone())
            .vector_store(store.clone())
            .build()?;

        Ok(KnowledgeService {
            engine: AnswerEngine::new(embedder, store, llm.clone(), config.clone()),
            inducer: SchemaInducer::new(llm),
            synthesizer: self.synthesizer.unwrap_or_default(),
            ingestor,
            loader: self.loader.unwrap_or_else(|| Arc::new(ExtensionLoader::default())),
            config,
        })
    }
}
