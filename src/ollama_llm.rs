use async_trait::async_trait;
use futures::StreamExt;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, ChatMessageResponseStream, request::ChatMessageRequest},
    generation::parameters::FormatType,
    models::ModelOptions,
};
use rand::Rng;

use crate::llm_client::{LlmClient, LlmError, Token, TokenStream};

/// Build a chat request for the given model and prompt.
fn build_request(model: &str, prompt: &str) -> ChatMessageRequest {
    let mut rng = rand::thread_rng();
    let temperature = rng.gen_range(0.5..=0.9);
    tracing::trace!(%temperature, "llm temperature");
    ChatMessageRequest::new(model.to_string(), vec![ChatMessage::user(prompt.to_string())])
        .options(ModelOptions::default().temperature(temperature))
}

/// Map an Ollama response stream into a [`TokenStream`].
fn map_stream(stream: ChatMessageResponseStream) -> TokenStream {
    let mapped = stream.map(|res| match res {
        Ok(resp) => {
            let tok = resp.message.content;
            tracing::trace!(%tok, "llm token");
            Ok(Token { text: tok })
        }
        Err(e) => {
            tracing::error!(?e, "ollama stream error");
            Err(LlmError::from(format!("ollama stream error: {e:?}")))
        }
    });
    Box::pin(mapped)
}

/// [`LlmClient`] implementation backed by [`Ollama`].
#[derive(Clone)]
pub struct OllamaLlm {
    client: Ollama,
    model: String,
}

impl OllamaLlm {
    /// Creates a new Ollama-backed client.
    pub fn new(client: Ollama, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Returns the configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for OllamaLlm {
    async fn complete_text(&self, prompt: &str) -> Result<String, LlmError> {
        let req = build_request(&self.model, prompt);
        let resp = self.client.send_chat_messages(req).await?;
        Ok(resp.message.content)
    }

    /// JSON-mode completion. The response body is parsed eagerly so callers
    /// always receive either a JSON value or an error, never raw text.
    async fn complete_structured(&self, prompt: &str) -> Result<serde_json::Value, LlmError> {
        let req = build_request(&self.model, prompt).format(FormatType::Json);
        let resp = self.client.send_chat_messages(req).await?;
        let value = serde_json::from_str(&resp.message.content)?;
        Ok(value)
    }

    async fn stream_text(&self, prompt: &str) -> Result<TokenStream, LlmError> {
        let req = build_request(&self.model, prompt);
        let stream = self.client.send_chat_messages_stream(req).await?;
        Ok(map_stream(stream))
    }
}
