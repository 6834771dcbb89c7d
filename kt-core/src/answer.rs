//! The typed-answer pipeline: retrieve, prompt, validate, post-process.

use std::sync::Arc;

use kt_rag::{Chunk, EmbeddingProvider, StoredChunk, VectorStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::error::{KtError, Result};
use crate::llm::{CompletionShape, LanguageModel};
use crate::prompt;
use crate::resolve::{EntitySource, ResolvedEntity, resolve_answer};
use crate::retrieval::{RetrievalMode, Retriever};
use crate::rule::Rule;
use crate::shape::{AnswerShape, AnswerValue};
use crate::validate::validate;

/// A question with its declared answer shape and rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPrompt {
    pub id: String,
    #[serde(alias = "entityType")]
    pub entity_type: String,
    pub query: String,
    #[serde(rename = "type", alias = "answer_shape")]
    pub shape: AnswerShape,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// One answer request.
///
/// `inferred` requests an answer from the model's own knowledge, skipping
/// retrieval. `document_id` is ignored in that case.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerRequest {
    pub document_id: String,
    pub inferred: bool,
    pub prompt: QueryPrompt,
    /// Requested retrieval mode; see [`RetrievalMode::select`].
    pub mode: Option<RetrievalMode>,
    /// Origin recorded in resolved-entity records. Defaults to the prompt.
    pub source: Option<EntitySource>,
}

impl AnswerRequest {
    /// Answer from passages of `document_id`.
    pub fn grounded(document_id: impl Into<String>, prompt: QueryPrompt) -> Self {
        Self { document_id: document_id.into(), inferred: false, prompt, mode: None, source: None }
    }

    /// Answer without retrieval.
    pub fn inferred(prompt: QueryPrompt) -> Self {
        Self { document_id: String::new(), inferred: true, prompt, mode: None, source: None }
    }

    pub fn with_mode(mut self, mode: RetrievalMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_source(mut self, source: EntitySource) -> Self {
        self.source = Some(source);
        self
    }
}

/// A validated answer with its supporting passages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypedAnswer {
    /// `None` when the model could not answer under the rules.
    pub value: Option<AnswerValue>,
    pub chunks: Vec<Chunk>,
    pub resolved_entities: Option<Vec<ResolvedEntity>>,
}

/// Answers [`AnswerRequest`]s against one chunk store and model.
pub struct AnswerEngine {
    retriever: Retriever,
    llm: Arc<dyn LanguageModel>,
    config: CoreConfig,
}

impl AnswerEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn LanguageModel>,
        config: CoreConfig,
    ) -> Self {
        let retriever = Retriever::new(embedder, store, llm.clone(), config.clone());
        Self { retriever, llm, config }
    }

    /// Run the pipeline for one request.
    ///
    /// # Errors
    ///
    /// Returns [`KtError::ExternalUnavailable`] if retrieval or the model
    /// call fails. Model output that does not fit the shape is not an
    /// error; it yields a `None` value.
    pub async fn answer(&self, request: &AnswerRequest) -> Result<TypedAnswer> {
        let query = &request.prompt;
        let source = request.source.clone().unwrap_or_else(|| EntitySource::query(&query.id));

        if request.inferred {
            let text = prompt::inferred(&query.query, query.shape, &query.rules);
            let value = self.complete_and_validate(&text, query).await?;
            let (value, resolved_entities) = resolve(value, query, &source)?;
            info!(prompt.id = %query.id, answered = value.is_some(), "inferred answer");
            return Ok(TypedAnswer { value, chunks: Vec::new(), resolved_entities });
        }

        let mode = RetrievalMode::select(request.mode, query.shape, &query.rules);
        let retrieval = self
            .retriever
            .retrieve(mode, &query.query, &request.document_id, &query.rules)
            .await?;
        if retrieval.chunks.is_empty() {
            debug!(document.id = %request.document_id, message = %retrieval.message, "no passages retrieved");
        }
        let mut chunks: Vec<Chunk> = retrieval.chunks.iter().map(StoredChunk::to_chunk).collect();

        let text = prompt::grounded(&query.query, &chunks, query.shape, &query.rules);
        let value = self.complete_and_validate(&text, query).await?;
        let (value, resolved_entities) = resolve(value, query, &source)?;

        if value.is_none() && mode != RetrievalMode::Decomposition {
            chunks.clear();
        }
        chunks.truncate(self.config.max_answer_chunks);

        info!(
            document.id = %request.document_id,
            prompt.id = %query.id,
            mode = %mode,
            answered = value.is_some(),
            chunk_count = chunks.len(),
            "answered query"
        );
        Ok(TypedAnswer { value, chunks, resolved_entities })
    }

    async fn complete_and_validate(&self, text: &str, query: &QueryPrompt) -> Result<Option<AnswerValue>> {
        let raw = self.llm.complete(text, CompletionShape::Answer(query.shape)).await?;
        validate_output(query, raw.as_ref())
    }
}

fn validate_output(query: &QueryPrompt, raw: Option<&Value>) -> Result<Option<AnswerValue>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match validate(query.shape, &query.rules, raw) {
        Ok(value) => Ok(value),
        Err(KtError::SchemaViolation(message)) => {
            warn!(prompt.id = %query.id, shape = %query.shape, %message, "model output rejected; answering null");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn resolve(
    value: Option<AnswerValue>,
    query: &QueryPrompt,
    source: &EntitySource,
) -> Result<(Option<AnswerValue>, Option<Vec<ResolvedEntity>>)> {
    match value {
        Some(value) if query.shape.is_textual() => {
            let (value, records) = resolve_answer(value, &query.rules, source, &query.entity_type)?;
            Ok((Some(value), records))
        }
        other => Ok((other, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(shape: AnswerShape) -> QueryPrompt {
        QueryPrompt {
            id: "p1".into(),
            entity_type: "Thing".into(),
            query: "q".into(),
            shape,
            rules: Vec::new(),
        }
    }

    #[test]
    fn schema_violations_become_null() {
        let q = query(AnswerShape::Int);
        assert_eq!(validate_output(&q, Some(&json!("many"))).unwrap(), None);
        assert_eq!(validate_output(&q, Some(&json!(4))).unwrap(), Some(AnswerValue::Int(4)));
        assert_eq!(validate_output(&q, None).unwrap(), None);
    }

    #[test]
    fn query_prompt_accepts_wire_names() {
        let prompt: QueryPrompt = serde_json::from_value(json!({
            "id": "p1",
            "entityType": "Capital",
            "query": "What is the capital?",
            "type": "str",
            "rules": [{"type": "must_return", "options": ["Paris"]}]
        }))
        .unwrap();
        assert_eq!(prompt.shape, AnswerShape::String);
        assert_eq!(prompt.entity_type, "Capital");
        assert_eq!(prompt.rules, vec![Rule::MustReturn(vec!["Paris".into()])]);
    }

    #[test]
    fn non_textual_answers_skip_resolution() {
        let mut q = query(AnswerShape::Int);
        q.rules = vec![Rule::ResolveEntity([("1".to_string(), "one".to_string())].into())];
        let (value, records) = resolve(Some(AnswerValue::Int(1)), &q, &EntitySource::query("p1")).unwrap();
        assert_eq!(value, Some(AnswerValue::Int(1)));
        assert!(records.is_none());
    }
}
