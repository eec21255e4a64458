//! Ollama (local model server) provider implementation.
//!
//! Key concepts:
//! - **Endpoints**: `POST {base_url}/api/generate` for one-shot commands and
//!   `POST {base_url}/api/chat` for conversations
//! - **Wire format**: the response body is newline-delimited JSON, one object
//!   per line; `frame::decode_stream` reassembles the lines
//! - **No server-side session**: the server keeps no history, so this
//!   provider rebuilds the returned history itself from the input history,
//!   the user message and the accumulated reply
//!
//! Ollama's messages are flat `{ role, content }` strings. A turn with a
//! part that has no text (e.g. inline image data from a Gemini session) has
//! no representation there and is dropped from the request.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::frame::decode_stream;
use super::{LlmProvider, OnChunk};
use crate::config::OllamaSettings;
use crate::error::{Error, Result};
use crate::prompts::{self, Prompts};
use crate::types::{History, Role, Turn};

const PROVIDER: &str = "Ollama";
const COMMAND_TEMPERATURE: f32 = 0.1;
const CHAT_TEMPERATURE: f32 = 0.7;

pub struct OllamaProvider {
    base_url: String,
    model: String,
    command_system: String,
    chat_system: String,
    client: reqwest::Client,
}

// --- API Request Types ---

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: Options,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    system: &'a str,
    stream: bool,
    options: Options,
}

#[derive(Serialize, Debug, PartialEq)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct Options {
    temperature: f32,
}

// --- Implementation ---

impl OllamaProvider {
    pub fn new(client: reqwest::Client, settings: &OllamaSettings, prompts: &Prompts) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            command_system: prompts::resolve(
                settings.command_system_instruction.as_deref(),
                &prompts.command,
            ),
            chat_system: prompts::resolve(
                settings.chat_system_instruction.as_deref(),
                &prompts.chat,
            ),
            client,
        }
    }

    /// Translate the neutral history into Ollama messages.
    fn build_messages(history: &[Turn], message: &str) -> Vec<ApiMessage> {
        let mut messages: Vec<ApiMessage> = history
            .iter()
            .filter_map(|turn| {
                let Some(content) = turn.plain_text() else {
                    debug!(role = ?turn.role, "Dropping non-text turn from Ollama history");
                    return None;
                };
                let role = match turn.role {
                    Role::Assistant => "assistant",
                    Role::User => "user",
                };
                Some(ApiMessage { role, content })
            })
            .collect();

        messages.push(ApiMessage {
            role: "user",
            content: message.to_string(),
        });
        messages
    }

    /// POST `body` to `path` and feed every streamed record to `on_record`.
    async fn stream<T: Serialize>(
        &self,
        path: &str,
        body: &T,
        on_record: impl FnMut(Value) -> Result<()>,
    ) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, model = %self.model, "Sending Ollama request");

        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http(PROVIDER, status));
        }

        decode_stream(response.bytes_stream(), on_record).await
    }
}

/// Ollama reports failures that happen after the stream started as a
/// record with an `error` field.
fn check_error(record: &Value) -> Result<()> {
    match record.get("error").and_then(Value::as_str) {
        Some(message) => Err(Error::Upstream {
            provider: PROVIDER,
            message: message.to_string(),
        }),
        None => Ok(()),
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn execute_command(&self, prompt: &str, on_chunk: &mut OnChunk<'_>) -> Result<()> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            system: &self.command_system,
            stream: true,
            options: Options {
                temperature: COMMAND_TEMPERATURE,
            },
        };

        self.stream("/api/generate", &request, |record| {
            check_error(&record)?;
            if let Some(text) = record.get("response").and_then(Value::as_str) {
                if !text.is_empty() {
                    on_chunk(text);
                }
            }
            Ok(())
        })
        .await
    }

    async fn send_message(
        &self,
        message: &str,
        history: &[Turn],
        on_chunk: &mut OnChunk<'_>,
    ) -> Result<History> {
        let request = ChatRequest {
            model: &self.model,
            messages: Self::build_messages(history, message),
            system: &self.chat_system,
            stream: true,
            options: Options {
                temperature: CHAT_TEMPERATURE,
            },
        };

        let mut reply = String::new();
        self.stream("/api/chat", &request, |record| {
            check_error(&record)?;
            if let Some(text) = record.pointer("/message/content").and_then(Value::as_str) {
                if !text.is_empty() {
                    on_chunk(text);
                    reply.push_str(text);
                }
            }
            Ok(())
        })
        .await?;

        let mut new_history = history.to_vec();
        new_history.push(Turn::user(message));
        new_history.push(Turn::assistant(reply));
        Ok(new_history)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
