//! Request and response bodies of the HTTP API.

use kt_core::{
    AnswerRequest, AnswerShape, AnswerValue, DeleteOutcome, ErrorKind, NULL_DOCUMENT_ID, QueryPrompt,
    ResolvedEntity, RetrievalMode, TypedAnswer,
};
use kt_rag::Chunk;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub document_id: String,
    pub prompt: QueryPrompt,
    #[serde(default, alias = "mode")]
    pub rag_type: Option<RetrievalMode>,
}

impl QueryRequest {
    /// The null-document id becomes an inferred request.
    pub fn into_answer_request(self) -> AnswerRequest {
        let request = if self.document_id == NULL_DOCUMENT_ID {
            AnswerRequest::inferred(self.prompt)
        } else {
            AnswerRequest::grounded(self.document_id, self.prompt)
        };
        match self.rag_type {
            Some(mode) => request.with_mode(mode),
            None => request,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub id: String,
    pub document_id: String,
    pub prompt_id: String,
    pub answer: Option<AnswerValue>,
    pub chunks: Vec<Chunk>,
    #[serde(rename = "type")]
    pub shape: AnswerShape,
    pub resolved_entities: Option<Vec<ResolvedEntity>>,
}

impl QueryResponse {
    pub fn new(document_id: String, prompt: &QueryPrompt, answer: TypedAnswer) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            document_id,
            prompt_id: prompt.id.clone(),
            answer: answer.value,
            chunks: answer.chunks,
            shape: prompt.shape,
            resolved_entities: answer.resolved_entities,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub id: String,
    pub name: String,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteDocumentResponse {
    pub id: String,
    pub status: String,
    pub message: String,
    pub deleted: usize,
}

impl DeleteDocumentResponse {
    pub fn new(id: String, outcome: DeleteOutcome) -> Self {
        Self { id, status: outcome.status, message: outcome.message, deleted: outcome.deleted }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(document_id: &str) -> QueryRequest {
        serde_json::from_value(json!({
            "document_id": document_id,
            "prompt": {"id": "p1", "entity_type": "Capital", "query": "What is the capital?", "type": "str"},
            "rag_type": "decomposed"
        }))
        .unwrap()
    }

    #[test]
    fn null_document_id_requests_inferred_answer() {
        let inferred = request(NULL_DOCUMENT_ID).into_answer_request();
        assert!(inferred.inferred);

        let grounded = request("abc").into_answer_request();
        assert!(!grounded.inferred);
        assert_eq!(grounded.document_id, "abc");
        assert_eq!(grounded.mode, Some(RetrievalMode::Decomposition));
    }

    #[test]
    fn response_uses_wire_names() {
        let prompt = request("abc").prompt;
        let answer = TypedAnswer {
            value: Some(AnswerValue::String("Paris".into())),
            chunks: vec![Chunk { content: "Paris".into(), page: 1 }],
            resolved_entities: None,
        };
        let json = serde_json::to_value(QueryResponse::new("abc".into(), &prompt, answer)).unwrap();
        assert_eq!(json["type"], "string");
        assert_eq!(json["answer"], "Paris");
        assert_eq!(json["prompt_id"], "p1");
        assert_eq!(json["id"].as_str().unwrap().len(), 32);
        assert!(json["resolved_entities"].is_null());
    }
}
