//! Text generation providers used to score candidates.

pub mod gemini;

use async_trait::async_trait;

use crate::error::OrchestratorResult;

pub use gemini::GeminiClient;

/// Something that turns a prompt into a JSON document.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn generate_json(&self, prompt: &str) -> OrchestratorResult<String>;

    fn name(&self) -> &'static str;
}
