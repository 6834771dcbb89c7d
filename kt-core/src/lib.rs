//! # kt-core
//!
//! Typed answers over uploaded documents, and knowledge-graph export from
//! tables of such answers.
//!
//! A query declares an [`AnswerShape`] and optional [`Rule`]s. The
//! [`AnswerEngine`] retrieves passages ([`Retriever`]), prompts the
//! [`LanguageModel`], coerces its output with [`validate`], and applies
//! entity resolution. For a populated [`Table`], the [`SchemaInducer`]
//! proposes relationships between column entity types and the
//! [`TripleSynthesizer`] turns them into triples linked to their passages.
//!
//! [`KnowledgeService`] bundles all of this behind one request surface.
//!
//! ## Features
//!
//! - `openai`: [`openai::OpenAIChatModel`] and OpenAI embeddings
//! - `qdrant`: the Qdrant vector store
//! - `pdf`: PDF uploads
//! - `full`: everything above

pub mod answer;
pub mod config;
pub mod error;
pub mod llm;
pub mod mock;
pub mod prompt;
pub mod resolve;
pub mod retrieval;
pub mod rule;
pub mod schema;
pub mod service;
pub mod shape;
pub mod table;
pub mod triples;
pub mod validate;

#[cfg(feature = "openai")]
pub mod openai;

pub use answer::{AnswerEngine, AnswerRequest, QueryPrompt, TypedAnswer};
pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{ErrorKind, KtError, Result};
pub use llm::{CompletionShape, LanguageModel};
pub use mock::MockLanguageModel;
pub use resolve::{EntityResolver, EntitySource, EntityText, ResolvedEntity, SourceKind};
pub use retrieval::{NO_DATA_MESSAGE, Retrieval, RetrievalMode, Retriever, fuse};
pub use rule::Rule;
pub use schema::{SchemaInducer, SchemaRelationship};
pub use service::{DeleteOutcome, KnowledgeService, KnowledgeServiceBuilder, NULL_DOCUMENT_ID, UploadOutcome};
pub use shape::{AnswerShape, AnswerValue};
pub use table::{Cell, CellAnswer, Column, Row, RowDocument, Table};
pub use triples::{GraphChunk, GraphExport, Node, Triple, TripleSynthesizer};
pub use validate::{is_null_like, validate};
