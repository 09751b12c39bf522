use async_trait::async_trait;

/// A hosted text-completion backend.
///
/// Implementations send one prompt as a single user message and return the
/// generated text, trimmed. Failures are returned as-is; callers do not retry.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;

    /// Name of the credential that must be set before this provider can be
    /// called, or `None` when it is ready.
    fn missing_credential(&self) -> Option<&str> {
        None
    }

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    fn name(&self) -> &str;
}
