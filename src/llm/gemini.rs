//! Google Gemini provider implementation.
//!
//! This module implements the `LlmProvider` trait for Gemini's native
//! streaming API.
//!
//! Key concepts:
//! - **Endpoint**: `POST {api_base}/v1beta/models/{model}:streamGenerateContent?alt=sse`,
//!   authenticated with the `x-goog-api-key` header
//! - **Request format**: the conversation is a list of `Content` objects,
//!   each a role (`"user"` or `"model"`) plus a list of parts; the system
//!   instruction and temperature are top-level fields
//! - **Response format**: server-sent events, each carrying one partial
//!   `GenerateContentResponse` whose first candidate holds the new parts
//! - **Chat sessions**: `GeminiChat` owns the native history. After a
//!   message completes it records the user turn and the model turn, and that
//!   history is what `send_message` hands back to the caller

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest_eventsource::{Event, RequestBuilderExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{LlmProvider, OnChunk};
use crate::config::GeminiSettings;
use crate::error::{Error, Result};
use crate::prompts::{self, Prompts};
use crate::types::{History, Part, Role, Turn};

const PROVIDER: &str = "Gemini";
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
const COMMAND_TEMPERATURE: f32 = 0.1;
const CHAT_TEMPERATURE: f32 = 0.7;

/// Gemini API client.
pub struct GeminiProvider {
    api_key: Option<String>,
    api_base: String,
    model: String,
    command_system: String,
    chat_system: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_key", &self.api_key.as_ref().map(|_| "<REDACTED>"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

// --- API Request Types ---

/// One turn in Gemini's native format.
///
/// Parts stay as raw JSON so that anything the model returns (text,
/// inline data, function calls) survives being stored and sent back.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Content {
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Value>,
}

impl Content {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![json!({ "text": text })],
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest<'a> {
    contents: &'a [Content],
    system_instruction: SystemInstruction,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Value>,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

// --- API Response Types ---

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct StreamResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: ApiError,
}

impl StreamResponse {
    /// Concatenated text of the first candidate, skipping thought parts.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|p| p.get("thought").and_then(Value::as_bool) != Some(true))
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }
}

// --- History conversion ---

/// The text of a part that holds nothing but text.
fn plain_text(part: &Value) -> Option<&str> {
    let map = part.as_object()?;
    if map.len() != 1 {
        return None;
    }
    map.get("text").and_then(Value::as_str)
}

fn to_native(turn: &Turn) -> Content {
    let role = match turn.role {
        Role::User => "user",
        Role::Assistant => "model",
    };
    let parts = turn
        .parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => json!({ "text": text }),
            Part::Opaque(value) => value.clone(),
        })
        .collect();
    Content {
        role: role.to_string(),
        parts,
    }
}

fn from_native(content: Content) -> Turn {
    let role = if content.role == "model" {
        Role::Assistant
    } else {
        Role::User
    };
    let parts = content
        .parts
        .into_iter()
        .map(|part| match plain_text(&part) {
            Some(text) => Part::Text(text.to_string()),
            None => Part::Opaque(part),
        })
        .collect();
    Turn { role, parts }
}

/// Fold the parts of all streamed fragments into one model turn, joining
/// runs of plain text parts.
fn merge_parts(parts: Vec<Value>) -> Vec<Value> {
    let mut merged: Vec<Value> = Vec::new();
    for part in parts {
        if let (Some(text), Some(last)) = (plain_text(&part), merged.last_mut()) {
            if let Some(previous) = plain_text(last) {
                let joined = format!("{}{}", previous, text);
                *last = json!({ "text": joined });
                continue;
            }
        }
        merged.push(part);
    }
    if merged.is_empty() {
        merged.push(json!({ "text": "" }));
    }
    merged
}

// --- Implementation ---

impl GeminiProvider {
    pub fn new(client: reqwest::Client, settings: &GeminiSettings, prompts: &Prompts) -> Self {
        Self {
            api_key: settings.api_key(),
            api_base: settings
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
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

    /// Start a chat session seeded with `history`.
    pub fn start_chat(&self, history: Vec<Content>) -> GeminiChat<'_> {
        GeminiChat {
            provider: self,
            history,
            system_instruction: self.chat_system.clone(),
            temperature: CHAT_TEMPERATURE,
        }
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }

    /// Stream one generation, forwarding text to `on_chunk`. Returns every
    /// part the model produced, in order.
    async fn stream_generate(
        &self,
        contents: &[Content],
        system_instruction: &str,
        temperature: f32,
        on_chunk: &mut OnChunk<'_>,
    ) -> Result<Vec<Value>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(Error::MissingCredential { provider: PROVIDER })?;

        let request = ApiRequest {
            contents,
            system_instruction: SystemInstruction {
                parts: vec![json!({ "text": system_instruction })],
            },
            generation_config: GenerationConfig { temperature },
        };

        let url = self.stream_url();
        debug!(url = %url, turns = contents.len(), "Sending Gemini request");

        let mut source = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .eventsource()
            .map_err(|e| Error::EventStream(e.to_string()))?;

        let mut parts = Vec::new();
        let outcome = loop {
            let Some(event) = source.next().await else {
                break Ok(());
            };
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(message)) => {
                    if let Err(err) = handle_event(&message.data, &mut parts, on_chunk) {
                        break Err(err);
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break Ok(()),
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    break Err(status_error(status, response).await);
                }
                Err(reqwest_eventsource::Error::Transport(err)) => break Err(err.into()),
                Err(err) => break Err(Error::EventStream(err.to_string())),
            }
        };
        // The event source reconnects on its own unless closed.
        source.close();

        outcome.map(|()| parts)
    }
}

/// Handle one SSE payload: surface errors, forward text, collect parts.
fn handle_event(data: &str, parts: &mut Vec<Value>, on_chunk: &mut OnChunk<'_>) -> Result<()> {
    let chunk: StreamResponse = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(err) => {
            warn!(error = %err, data = %data, "Skipping unparseable Gemini event");
            return Ok(());
        }
    };

    if let Some(error) = chunk.error {
        return Err(Error::Upstream {
            provider: PROVIDER,
            message: error.message,
        });
    }
    if let Some(reason) = chunk
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(Error::Upstream {
            provider: PROVIDER,
            message: format!("prompt blocked ({})", reason),
        });
    }

    let text = chunk.text();
    if !text.is_empty() {
        on_chunk(&text);
    }
    if let Some(content) = chunk.candidates.into_iter().next().and_then(|c| c.content) {
        parts.extend(content.parts);
    }
    Ok(())
}

/// Turn a non-success response into an error, preferring the message
/// Gemini puts in the body.
async fn status_error(status: reqwest::StatusCode, response: reqwest::Response) -> Error {
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => Error::Upstream {
            provider: PROVIDER,
            message: format!("{} ({})", envelope.error.message, status.as_u16()),
        },
        Err(_) => Error::http(PROVIDER, status),
    }
}

/// A stateful conversation with Gemini.
///
/// The session's history is authoritative: it only grows after a message
/// completes, and a failed message leaves it untouched.
pub struct GeminiChat<'p> {
    provider: &'p GeminiProvider,
    history: Vec<Content>,
    system_instruction: String,
    temperature: f32,
}

impl GeminiChat<'_> {
    pub async fn send_message_stream(
        &mut self,
        message: &str,
        on_chunk: &mut OnChunk<'_>,
    ) -> Result<()> {
        self.history.push(Content::text("user", message));

        let result = self
            .provider
            .stream_generate(
                &self.history,
                &self.system_instruction,
                self.temperature,
                on_chunk,
            )
            .await;

        match result {
            Ok(parts) => {
                self.history.push(Content {
                    role: "model".to_string(),
                    parts: merge_parts(parts),
                });
                Ok(())
            }
            Err(err) => {
                self.history.pop();
                Err(err)
            }
        }
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    pub fn into_history(self) -> Vec<Content> {
        self.history
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn execute_command(&self, prompt: &str, on_chunk: &mut OnChunk<'_>) -> Result<()> {
        if self.api_key.is_none() {
            on_chunk("Error: Gemini API key is not configured.");
            return Ok(());
        }
        let contents = [Content::text("user", prompt)];
        self.stream_generate(&contents, &self.command_system, COMMAND_TEMPERATURE, on_chunk)
            .await
            .map(|_| ())
    }

    async fn send_message(
        &self,
        message: &str,
        history: &[Turn],
        on_chunk: &mut OnChunk<'_>,
    ) -> Result<History> {
        if self.api_key.is_none() {
            return Err(Error::MissingCredential { provider: PROVIDER });
        }
        let mut chat = self.start_chat(history.iter().map(to_native).collect());
        chat.send_message_stream(message, on_chunk).await?;
        Ok(chat.into_history().into_iter().map(from_native).collect())
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
