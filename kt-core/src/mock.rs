//! Scripted language model for tests and offline runs.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{KtError, Result};
use crate::llm::{CompletionShape, LanguageModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    Answer,
    Keywords,
    SubQueries,
    Schema,
}

impl From<CompletionShape> for Kind {
    fn from(shape: CompletionShape) -> Self {
        match shape {
            CompletionShape::Answer(_) => Kind::Answer,
            CompletionShape::Keywords => Kind::Keywords,
            CompletionShape::SubQueries => Kind::SubQueries,
            CompletionShape::Schema => Kind::Schema,
        }
    }
}

/// A [`LanguageModel`] that returns a fixed response per completion kind
/// and records every prompt it receives.
///
/// Kinds without a scripted response complete with `None`.
///
/// ```rust,ignore
/// let llm = MockLanguageModel::new()
///     .with_answer(json!(true))
///     .with_keywords(json!(["Paris"]));
/// ```
#[derive(Debug, Default)]
pub struct MockLanguageModel {
    responses: HashMap<Kind, Value>,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(CompletionShape, String)>>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Response to every answer completion.
    pub fn with_answer(mut self, value: Value) -> Self {
        self.responses.insert(Kind::Answer, value);
        self
    }

    pub fn with_keywords(mut self, value: Value) -> Self {
        self.responses.insert(Kind::Keywords, value);
        self
    }

    pub fn with_sub_queries(mut self, value: Value) -> Self {
        self.responses.insert(Kind::SubQueries, value);
        self
    }

    /// Response to schema completions, the `relationships` array.
    pub fn with_schema(mut self, value: Value) -> Self {
        self.responses.insert(Kind::Schema, value);
        self
    }

    /// Fail every completion as an unavailable service.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every `(shape, prompt)` received so far, in call order.
    pub fn calls(&self) -> Vec<(CompletionShape, String)> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Prompts received for completions of `shape`.
    pub fn prompts_for(&self, shape: CompletionShape) -> Vec<String> {
        self.calls().into_iter().filter(|(s, _)| *s == shape).map(|(_, p)| p).collect()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, prompt: &str, shape: CompletionShape) -> Result<Option<Value>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((shape, prompt.to_string()));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(KtError::external("mock", message.clone()));
        }
        Ok(self.responses.get(&Kind::from(shape)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::AnswerShape;
    use serde_json::json;

    #[tokio::test]
    async fn returns_scripted_response_per_kind() {
        let llm = MockLanguageModel::new().with_answer(json!("Paris")).with_keywords(json!(["capital"]));

        let answer = llm.complete("q", CompletionShape::Answer(AnswerShape::String)).await.unwrap();
        assert_eq!(answer, Some(json!("Paris")));
        let keywords = llm.complete("k", CompletionShape::Keywords).await.unwrap();
        assert_eq!(keywords, Some(json!(["capital"])));
        assert_eq!(llm.complete("s", CompletionShape::Schema).await.unwrap(), None);

        assert_eq!(llm.calls().len(), 3);
        assert_eq!(llm.prompts_for(CompletionShape::Keywords), vec!["k".to_string()]);
    }

    #[tokio::test]
    async fn failing_mock_is_external_unavailable() {
        let llm = MockLanguageModel::new().failing("down");
        let err = llm.complete("q", CompletionShape::Keywords).await.unwrap_err();
        assert!(matches!(err, KtError::ExternalUnavailable { .. }));
    }
}
