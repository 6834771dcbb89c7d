//! The language-model capability used by the pipeline.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::Result;
use crate::shape::AnswerShape;

/// What a completion is expected to produce.
///
/// Providers that support structured output use [`json_schema`](Self::json_schema)
/// to constrain the model to an object with a single
/// [`field_name`](Self::field_name) property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionShape {
    /// A typed answer to a query.
    Answer(AnswerShape),
    /// Keywords extracted from a query.
    Keywords,
    /// Sub-questions of a query.
    SubQueries,
    /// `{head, relation, tail}` relationships between entity types.
    Schema,
}

impl CompletionShape {
    /// The property holding the result in structured output.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Answer(_) => "answer",
            Self::Keywords => "keywords",
            Self::SubQueries => "sub_queries",
            Self::Schema => "relationships",
        }
    }

    /// A short name for logs and schema titles.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Answer(AnswerShape::Bool) => "bool_answer",
            Self::Answer(AnswerShape::Int) => "int_answer",
            Self::Answer(AnswerShape::String) => "string_answer",
            Self::Answer(AnswerShape::IntList) => "int_list_answer",
            Self::Answer(AnswerShape::StringList) => "string_list_answer",
            Self::Keywords => "keywords",
            Self::SubQueries => "sub_queries",
            Self::Schema => "schema",
        }
    }

    /// JSON Schema of the structured response object.
    pub fn json_schema(&self) -> Value {
        let field = match self {
            Self::Answer(AnswerShape::Bool) => json!({"type": ["boolean", "null"]}),
            Self::Answer(AnswerShape::Int) => json!({"type": ["integer", "null"]}),
            Self::Answer(AnswerShape::String) => json!({"type": ["string", "null"]}),
            Self::Answer(AnswerShape::IntList) => {
                json!({"type": ["array", "null"], "items": {"type": "integer"}})
            }
            Self::Answer(AnswerShape::StringList) | Self::Keywords | Self::SubQueries => {
                json!({"type": ["array", "null"], "items": {"type": "string"}})
            }
            Self::Schema => json!({
                "type": ["array", "null"],
                "items": {
                    "type": "object",
                    "properties": {
                        "head": {"type": "string"},
                        "relation": {"type": "string"},
                        "tail": {"type": "string"}
                    },
                    "required": ["head", "relation", "tail"],
                    "additionalProperties": false
                }
            }),
        };
        json!({
            "type": "object",
            "properties": { self.field_name(): field },
            "required": [self.field_name()],
            "additionalProperties": false
        })
    }
}

/// A chat-completion backend.
///
/// `complete` returns the raw value of the shape's field, or `None` when
/// the model produced nothing usable. Callers re-validate every value.
/// Transport failures are [`KtError::ExternalUnavailable`](crate::KtError::ExternalUnavailable).
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str, shape: CompletionShape) -> Result<Option<Value>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_wraps_a_single_required_field() {
        let schema = CompletionShape::Answer(AnswerShape::IntList).json_schema();
        assert_eq!(schema["required"], json!(["answer"]));
        assert_eq!(schema["properties"]["answer"]["items"]["type"], json!("integer"));
        assert_eq!(schema["additionalProperties"], json!(false));
    }

    #[test]
    fn relationship_schema_requires_all_fields() {
        let schema = CompletionShape::Schema.json_schema();
        assert_eq!(
            schema["properties"]["relationships"]["items"]["required"],
            json!(["head", "relation", "tail"])
        );
    }
}
