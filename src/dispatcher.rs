//! Provider-agnostic entry points.
//!
//! The dispatcher picks the backend named in the settings for every call and
//! is the last line of error handling: whatever goes wrong inside a
//! provider reaches the caller as a single `Error: ...` chunk, never as a
//! returned error, and a failed chat leaves the caller's history as it was.

use tracing::error;

use crate::config::AiSettings;
use crate::llm::{create_provider, LlmProvider, OnChunk};
use crate::prompts::Prompts;
use crate::types::History;

pub struct Dispatcher {
    client: reqwest::Client,
    prompts: Prompts,
}

impl Dispatcher {
    pub fn new(prompts: Prompts) -> Self {
        Self::with_client(reqwest::Client::new(), prompts)
    }

    pub fn with_client(client: reqwest::Client, prompts: Prompts) -> Self {
        Self { client, prompts }
    }

    fn provider(&self, settings: &AiSettings) -> Box<dyn LlmProvider> {
        create_provider(&self.client, settings, &self.prompts)
    }

    /// Run `input` as an emulated terminal command.
    pub async fn execute_command(
        &self,
        input: &str,
        settings: &AiSettings,
        on_chunk: &mut OnChunk<'_>,
    ) {
        let provider = self.provider(settings);
        if let Err(err) = provider.execute_command(input, on_chunk).await {
            error!(provider = provider.name(), error = %err, "Error executing command");
            on_chunk(&format!("Error: {}", err));
        }
    }

    /// Send `input` as the next chat message and return the history to keep.
    ///
    /// On failure the returned history is `history` itself, untouched.
    pub async fn send_message(
        &self,
        input: &str,
        history: History,
        settings: &AiSettings,
        on_chunk: &mut OnChunk<'_>,
    ) -> History {
        let provider = self.provider(settings);
        match provider.send_message(input, &history, on_chunk).await {
            Ok(new_history) => new_history,
            Err(err) => {
                error!(provider = provider.name(), error = %err, "Error sending message");
                on_chunk(&format!("Error: {}", err));
                history
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Prompts::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeminiSettings, OllamaSettings, ProviderKind};
    use crate::testing::{ndjson_body, spawn_server, sse_body, Recorded};
    use crate::types::Turn;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use serde_json::json;

    fn settings(provider: ProviderKind, gemini_base: &str, ollama_base: &str) -> AiSettings {
        AiSettings {
            provider,
            gemini: GeminiSettings {
                model: "gemini-test".into(),
                api_base: Some(gemini_base.into()),
                api_key: Some("k".into()),
                api_key_env: "AITERM_TEST_UNSET_GEMINI_KEY".into(),
                ..GeminiSettings::default()
            },
            ollama: OllamaSettings {
                base_url: ollama_base.into(),
                ..OllamaSettings::default()
            },
        }
    }

    async fn both_servers() -> (Recorded, String, Recorded, String) {
        let gemini = Recorded::default();
        let gemini_base = spawn_server(gemini.clone(), |_| {
            sse_body(vec![json!({
                "candidates": [{ "content": { "role": "model", "parts": [{ "text": "from gemini" }] } }]
            })])
        })
        .await;
        let ollama = Recorded::default();
        let ollama_base = spawn_server(ollama.clone(), |path| {
            if path == "/api/chat" {
                ndjson_body(vec![b"{\"message\":{\"content\":\"from ollama\"}}\n".to_vec()])
            } else {
                ndjson_body(vec![b"{\"response\":\"from ollama\"}\n".to_vec()])
            }
        })
        .await;
        (gemini, gemini_base, ollama, ollama_base)
    }

    #[tokio::test]
    async fn test_exactly_one_provider_per_call() {
        let (gemini, gemini_base, ollama, ollama_base) = both_servers().await;
        let dispatcher = Dispatcher::default();

        let mut chunks = Vec::new();
        let ollama_settings = settings(ProviderKind::Ollama, &gemini_base, &ollama_base);
        dispatcher
            .execute_command("ls", &ollama_settings, &mut |c: &str| chunks.push(c.to_string()))
            .await;
        assert_eq!(chunks, vec!["from ollama"]);
        assert_eq!(ollama.requests().len(), 1);
        assert_eq!(gemini.requests().len(), 0);

        chunks.clear();
        let gemini_settings = settings(ProviderKind::Gemini, &gemini_base, &ollama_base);
        let history = dispatcher
            .send_message("hi", Vec::new(), &gemini_settings, &mut |c: &str| {
                chunks.push(c.to_string())
            })
            .await;
        assert_eq!(chunks, vec!["from gemini"]);
        assert_eq!(history, vec![Turn::user("hi"), Turn::assistant("from gemini")]);
        assert_eq!(ollama.requests().len(), 1);
        assert_eq!(gemini.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_chat_returns_input_history() {
        let base = spawn_server(Recorded::default(), |_| {
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
        .await;
        let settings = settings(ProviderKind::Ollama, "http://127.0.0.1:9", &base);
        let history = vec![Turn::user("hi"), Turn::assistant("hello")];

        let mut chunks = Vec::new();
        let returned = Dispatcher::default()
            .send_message("again", history.clone(), &settings, &mut |c: &str| {
                chunks.push(c.to_string())
            })
            .await;

        assert_eq!(returned, history);
        assert_eq!(
            chunks,
            vec!["Error: Ollama API error: 500 Internal Server Error"]
        );
    }

    #[tokio::test]
    async fn test_failed_command_emits_one_error_chunk() {
        // Nothing listens on port 9 (discard), so the connection is refused.
        let settings = settings(ProviderKind::Ollama, "http://127.0.0.1:9", "http://127.0.0.1:9");
        let mut chunks = Vec::new();
        Dispatcher::default()
            .execute_command("ls", &settings, &mut |c: &str| chunks.push(c.to_string()))
            .await;
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with("Error: Request failed"));
    }

    #[tokio::test]
    async fn test_missing_gemini_key_in_chat_keeps_history() {
        let mut settings = settings(ProviderKind::Gemini, "http://127.0.0.1:9", "http://127.0.0.1:9");
        settings.gemini.api_key = None;
        let history = vec![Turn::user("hi"), Turn::assistant("hello")];

        let mut chunks = Vec::new();
        let returned = Dispatcher::default()
            .send_message("again", history.clone(), &settings, &mut |c: &str| {
                chunks.push(c.to_string())
            })
            .await;

        assert_eq!(returned, history);
        assert_eq!(chunks, vec!["Error: Gemini API key is not configured."]);
    }
}
