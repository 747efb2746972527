#![cfg(test)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream;

use crate::llm_client::{LlmClient, LlmError, Token, TokenStream};

/// Scriptable [`LlmClient`] double. Calls without a scripted reply fail,
/// which doubles as the "provider down" script.
#[derive(Default)]
pub struct ScriptedLlm {
    text_reply: Option<String>,
    structured_reply: Option<serde_json::Value>,
    stream_script: Mutex<Option<Vec<Result<String, String>>>>,
    structured_prompts: Mutex<Vec<String>>,
    structured_calls: AtomicUsize,
    stream_calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, reply: impl Into<String>) -> Self {
        self.text_reply = Some(reply.into());
        self
    }

    pub fn with_structured(mut self, reply: serde_json::Value) -> Self {
        self.structured_reply = Some(reply);
        self
    }

    pub fn with_stream(self, tokens: Vec<&str>) -> Self {
        self.with_stream_results(tokens.into_iter().map(Ok).collect())
    }

    pub fn with_stream_results(self, tokens: Vec<Result<&str, &str>>) -> Self {
        *self.stream_script.lock().unwrap() = Some(
            tokens
                .into_iter()
                .map(|r| r.map(str::to_string).map_err(str::to_string))
                .collect(),
        );
        self
    }

    pub fn structured_calls(&self) -> usize {
        self.structured_calls.load(Ordering::SeqCst)
    }

    /// Prompt given to the nth `complete_structured` call.
    pub fn structured_prompt(&self, idx: usize) -> String {
        self.structured_prompts.lock().unwrap()[idx].clone()
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete_text(&self, _prompt: &str) -> Result<String, LlmError> {
        self.text_reply
            .clone()
            .ok_or_else(|| "no text reply scripted".into())
    }

    async fn complete_structured(&self, prompt: &str) -> Result<serde_json::Value, LlmError> {
        self.structured_prompts.lock().unwrap().push(prompt.to_string());
        self.structured_calls.fetch_add(1, Ordering::SeqCst);
        self.structured_reply
            .clone()
            .ok_or_else(|| "no structured reply scripted".into())
    }

    async fn stream_text(&self, _prompt: &str) -> Result<TokenStream, LlmError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let script = self
            .stream_script
            .lock()
            .unwrap()
            .clone()
            .ok_or("no stream scripted")?;
        let items = script
            .into_iter()
            .map(|r| r.map(|text| Token { text }).map_err(LlmError::from));
        Ok(Box::pin(stream::iter(items)))
    }
}
