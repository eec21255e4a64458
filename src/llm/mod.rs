//! LLM Client module.
//!
//! This module defines the `LlmProvider` trait that abstracts over the two
//! supported backends, and provides concrete implementations.
//!
//! Key concepts:
//! - **Two modes**: `execute_command` is a stateless one-shot request,
//!   `send_message` continues a conversation and returns the updated history
//! - **Streaming**: both modes hand partial text to an `on_chunk` callback as
//!   it arrives, in order, exactly once
//! - **Provider pattern**: Gemini and Ollama speak different protocols and
//!   keep history in different shapes, but both implement the same trait and
//!   both accept and return the neutral `History` type

pub mod frame;
pub mod gemini;
pub mod ollama;

use async_trait::async_trait;

use crate::config::{AiSettings, ProviderKind};
use crate::error::Result;
use crate::prompts::Prompts;
use crate::types::{History, Turn};

/// Callback receiving streamed text. Runs inline with the network read loop,
/// so it must return quickly.
pub type OnChunk<'a> = dyn FnMut(&str) + Send + 'a;

/// Trait that every backend implements.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one stateless request, streaming the reply into `on_chunk`.
    async fn execute_command(&self, prompt: &str, on_chunk: &mut OnChunk<'_>) -> Result<()>;

    /// Send `message` on top of `history`, streaming the reply into
    /// `on_chunk`, and return the history the conversation should continue
    /// from.
    async fn send_message(
        &self,
        message: &str,
        history: &[Turn],
        on_chunk: &mut OnChunk<'_>,
    ) -> Result<History>;

    /// Return the provider's display name (for logging).
    fn name(&self) -> &str;
}

/// Build the provider selected by `settings.provider`.
pub fn create_provider(
    client: &reqwest::Client,
    settings: &AiSettings,
    prompts: &Prompts,
) -> Box<dyn LlmProvider> {
    match settings.provider {
        ProviderKind::Gemini => Box::new(gemini::GeminiProvider::new(
            client.clone(),
            &settings.gemini,
            prompts,
        )),
        ProviderKind::Ollama => Box::new(ollama::OllamaProvider::new(
            client.clone(),
            &settings.ollama,
            prompts,
        )),
    }
}
