//! OpenAI chat-completion adapter with structured JSON output.
//!
//! This module is only available when the `openai` feature is enabled.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{KtError, Result};
use crate::llm::{CompletionShape, LanguageModel};

/// The default chat model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// A [`LanguageModel`] backed by the OpenAI chat completions API.
///
/// Each call requests a `json_schema` response format built from the
/// [`CompletionShape`] and returns the shape's field from the parsed reply.
///
/// # Example
///
/// ```rust,ignore
/// use kt_core::openai::OpenAIChatModel;
///
/// let llm = OpenAIChatModel::new(std::env::var("OPENAI_API_KEY")?, "gpt-4o")?;
/// ```
pub struct OpenAIChatModel {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIChatModel {
    /// Create a new client.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(KtError::Config("OpenAI API key must not be empty".to_string()));
        }
        let config = OpenAIConfig::new().with_api_key(api_key);
        Ok(Self { client: Client::with_config(config), model: model.into() })
    }

    fn map_err(e: impl std::fmt::Display) -> KtError {
        error!(provider = "OpenAI", error = %e, "chat completion failed");
        KtError::external("openai", e.to_string())
    }
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    async fn complete(&self, prompt: &str, shape: CompletionShape) -> Result<Option<Value>> {
        debug!(provider = "OpenAI", model = %self.model, shape = shape.name(), "requesting completion");

        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(Self::map_err)?;
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![ChatCompletionRequestMessage::User(message)])
            .response_format(ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    description: None,
                    name: shape.name().to_string(),
                    schema: Some(shape.json_schema()),
                    strict: Some(true),
                },
            })
            .build()
            .map_err(Self::map_err)?;

        let response = self.client.chat().create(request).await.map_err(Self::map_err)?;
        let Some(content) = response.choices.into_iter().next().and_then(|c| c.message.content)
        else {
            warn!(provider = "OpenAI", shape = shape.name(), "completion had no content");
            return Ok(None);
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(mut object)) => {
                Ok(object.remove(shape.field_name()).filter(|value| !value.is_null()))
            }
            Ok(other) => Ok(Some(other)),
            Err(_) => {
                // not JSON; let validation decide what the bare text means
                Ok(Some(Value::String(content)))
            }
        }
    }
}
