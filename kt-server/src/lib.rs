//! # kt-server
//!
//! HTTP API for the knowledge table service.
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | `POST` | `/api/v1/query` | [`protocol::QueryRequest`] |
//! | `POST` | `/api/v1/document` | multipart `file` (and optional `document_id`) |
//! | `DELETE` | `/api/v1/document/{document_id}` | |
//! | `POST` | `/api/v1/graph/export-triples` | a [`kt_core::Table`] |
//! | `GET` | `/health` | |
//!
//! Errors are returned as `{kind, message}`.

pub mod config;
pub mod protocol;
pub mod server;
pub mod telemetry;

pub use config::{ConfigError, LogFormat, ProviderKind, ServerConfig, VectorDbKind};
pub use server::{ApiError, AppState, app_router, build_service, run_server};
