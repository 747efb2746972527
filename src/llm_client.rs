use async_trait::async_trait;
use futures::stream::BoxStream;

/// Boxed error type used across provider calls.
pub type LlmError = Box<dyn std::error::Error + Send + Sync>;

/// Text fragment emitted by a streaming generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Fragment text as provided by the model.
    pub text: String,
}

/// Stream of [`Token`]s. Mid-stream failures surface as `Err` items so a
/// consumer can deliver a terminal error after partial output.
pub type TokenStream = BoxStream<'static, Result<Token, LlmError>>;

/// Common interface to the generative text provider.
///
/// Implementations may be slow and may fail; callers decide per call site
/// whether a failure is fatal or recoverable.
///
/// # Examples
/// ```
/// use async_trait::async_trait;
/// use futures::stream;
/// use reverie::{LlmClient, LlmError, Token, TokenStream};
///
/// struct Canned;
///
/// #[async_trait]
/// impl LlmClient for Canned {
///     async fn complete_text(&self, _prompt: &str) -> Result<String, LlmError> {
///         Ok("- a bullet".into())
///     }
///     async fn complete_structured(&self, _prompt: &str) -> Result<serde_json::Value, LlmError> {
///         Ok(serde_json::json!({}))
///     }
///     async fn stream_text(&self, _prompt: &str) -> Result<TokenStream, LlmError> {
///         let s = stream::iter(vec![Ok::<_, LlmError>(Token { text: "hi".into() })]);
///         Ok(Box::pin(s))
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let llm = Canned;
/// assert_eq!(llm.complete_text("x").await.unwrap(), "- a bullet");
/// # });
/// ```
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a complete text response for `prompt`.
    async fn complete_text(&self, prompt: &str) -> Result<String, LlmError>;

    /// Generate a JSON object response for `prompt`. The schema the object
    /// should follow is described inside the prompt; the returned value is
    /// whatever the model produced and still needs validation.
    async fn complete_structured(&self, prompt: &str) -> Result<serde_json::Value, LlmError>;

    /// Generate a response as an ordered stream of text fragments.
    async fn stream_text(&self, prompt: &str) -> Result<TokenStream, LlmError>;
}

#[async_trait]
impl<C> LlmClient for std::sync::Arc<C>
where
    C: LlmClient + ?Sized,
{
    async fn complete_text(&self, prompt: &str) -> Result<String, LlmError> {
        (**self).complete_text(prompt).await
    }

    async fn complete_structured(&self, prompt: &str) -> Result<serde_json::Value, LlmError> {
        (**self).complete_structured(prompt).await
    }

    async fn stream_text(&self, prompt: &str) -> Result<TokenStream, LlmError> {
        (**self).stream_text(prompt).await
    }
}
