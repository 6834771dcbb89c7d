use std::net::SocketAddr;
use std::path::Path as FsPath;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, State,
        multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use kt_core::{
    ErrorKind, GraphExport, KnowledgeService, KtError, LanguageModel, MockLanguageModel, Table,
};
use kt_rag::{EmbeddingProvider, HashEmbeddingProvider, InMemoryVectorStore, VectorStore};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tempfile::NamedTempFile;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::{ProviderKind, ServerConfig, VectorDbKind};
use crate::protocol::{DeleteDocumentResponse, DocumentResponse, ErrorBody, QueryRequest, QueryResponse};

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<KnowledgeService>,
}

impl AppState {
    pub fn new(service: KnowledgeService) -> Self {
        Self { service: Arc::new(service) }
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/query", post(run_query))
        .route("/api/v1/document", post(upload_document))
        .route("/api/v1/document/{document_id}", delete(delete_document))
        .route("/api/v1/graph/export-triples", post(export_triples))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Wire the service's collaborators from `config`.
pub fn build_service(config: &ServerConfig) -> anyhow::Result<KnowledgeService> {
    let llm: Arc<dyn LanguageModel> = match config.provider {
        ProviderKind::Mock => Arc::new(MockLanguageModel::new()),
        ProviderKind::OpenAI => openai_model(config)?,
    };
    let embedder: Arc<dyn EmbeddingProvider> = match config.provider {
        ProviderKind::Mock => Arc::new(HashEmbeddingProvider::new(config.dimensions)),
        ProviderKind::OpenAI => openai_embedder(config)?,
    };
    let store: Arc<dyn VectorStore> = match config.vector_db {
        VectorDbKind::Memory => Arc::new(InMemoryVectorStore::new()),
        VectorDbKind::Qdrant => qdrant_store(config)?,
    };

    let service = KnowledgeService::builder()
        .language_model(llm)
        .embedding_provider(embedder)
        .vector_store(store)
        .rag_config(config.rag_config()?)
        .core_config(config.core_config()?)
        .build()?;
    Ok(service)
}

#[cfg(feature = "openai")]
fn openai_model(config: &ServerConfig) -> anyhow::Result<Arc<dyn LanguageModel>> {
    let key = config.openai_api_key.clone().context("OPENAI_API_KEY is required")?;
    Ok(Arc::new(kt_core::openai::OpenAIChatModel::new(key, config.llm_model.clone())?))
}

#[cfg(not(feature = "openai"))]
fn openai_model(_config: &ServerConfig) -> anyhow::Result<Arc<dyn LanguageModel>> {
    anyhow::bail!("KT_PROVIDER=openai needs kt-server built with the `openai` feature")
}

#[cfg(feature = "openai")]
fn openai_embedder(config: &ServerConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let key = config.openai_api_key.clone().context("OPENAI_API_KEY is required")?;
    let provider = kt_rag::openai::OpenAIEmbeddingProvider::new(key, config.dimensions)?
        .with_model(config.embedding_model.clone());
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "openai"))]
fn openai_embedder(_config: &ServerConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    anyhow::bail!("KT_PROVIDER=openai needs kt-server built with the `openai` feature")
}

#[cfg(feature = "qdrant")]
fn qdrant_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn VectorStore>> {
    let store =
        kt_rag::qdrant::QdrantVectorStore::new(&config.qdrant_url, config.collection.clone(), config.dimensions)?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "qdrant"))]
fn qdrant_store(_config: &ServerConfig) -> anyhow::Result<Arc<dyn VectorStore>> {
    anyhow::bail!("KT_VECTOR_DB=qdrant needs kt-server built with the `qdrant` feature")
}

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let service = build_service(&config)?;
    service.ensure_ready().await.context("failed to prepare the vector collection")?;
    let app = app_router(AppState::new(service));

    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .with_context(|| "invalid host/port for kt-server")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("kt-server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// A [`KtError`] rendered as `{kind, message}`.
#[derive(Debug)]
pub struct ApiError(KtError);

impl From<KtError> for ApiError {
    fn from(err: KtError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(KtError::BadInput(rejection.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self(KtError::BadInput(rejection.body_text()))
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self(KtError::BadInput(err.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = match kind {
            ErrorKind::BadInput => StatusCode::BAD_REQUEST,
            ErrorKind::ExternalUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::SchemaViolation | ErrorKind::Config => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(kind = %kind, error = %self.0, "request failed");
        } else {
            warn!(kind = %kind, error = %self.0, "request rejected");
        }
        (status, Json(ErrorBody { kind, message: self.0.to_string() })).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({"status":"ok","service":"kt-server"}))
}

async fn run_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = payload?;
    let document_id = request.document_id.clone();
    let prompt = request.prompt.clone();
    let answer = state.service.answer(&request.into_answer_request()).await?;
    Ok(Json(QueryResponse::new(document_id, &prompt, answer)))
}

async fn upload_document(
    State(state): State<AppState>,
    payload: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiError> {
    let mut multipart = payload?;
    let mut document_id: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| KtError::BadInput("File name is missing".to_string()))?;
                let bytes = field.bytes().await?;
                file = Some((name, bytes.to_vec()));
            }
            Some("document_id") => document_id = Some(field.text().await?),
            _ => {}
        }
    }
    let (name, bytes) = file.ok_or_else(|| KtError::BadInput("multipart field 'file' is required".to_string()))?;
    info!(file.name = %name, size = bytes.len(), "received upload");

    // removed when `spooled` drops, including on cancellation
    let spooled = spool_upload(&name, &bytes).await?;
    let outcome = state.service.upload(document_id.as_deref(), spooled.path()).await?;

    Ok((
        StatusCode::CREATED,
        Json(DocumentResponse { id: outcome.document_id, name, chunk_count: outcome.chunk_count }),
    ))
}

/// Write an upload to a temp file that keeps the original extension, so the
/// loader can dispatch on it.
async fn spool_upload(file_name: &str, bytes: &[u8]) -> Result<NamedTempFile, KtError> {
    let suffix = FsPath::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    let spooled = tempfile::Builder::new()
        .prefix("kt-upload-")
        .suffix(&suffix)
        .tempfile()
        .map_err(|e| KtError::external("filesystem", format!("failed to create spool file: {e}")))?;
    tokio::fs::write(spooled.path(), bytes)
        .await
        .map_err(|e| KtError::external("filesystem", format!("failed to spool upload: {e}")))?;
    Ok(spooled)
}

async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<DeleteDocumentResponse>, ApiError> {
    let outcome = state.service.delete(&document_id).await?;
    Ok(Json(DeleteDocumentResponse::new(document_id, outcome)))
}

async fn export_triples(
    State(state): State<AppState>,
    payload: Result<Json<Table>, JsonRejection>,
) -> Result<Json<GraphExport>, ApiError> {
    let Json(table) = payload?;
    Ok(Json(state.service.export_triples(&table).await))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spooled_upload_keeps_extension_and_is_removed_on_drop() {
        let spooled = spool_upload("Annual Report.PDF", b"%PDF-1.4").await.unwrap();
        let path = spooled.path().to_path_buf();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("PDF"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF-1.4");

        drop(spooled);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn spooled_upload_without_extension() {
        let spooled = spool_upload("notes", b"plain").await.unwrap();
        assert!(spooled.path().extension().is_none());
    }
}
