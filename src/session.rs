//! Chat session - the caller side of a conversation.
//!
//! A `ChatSession` owns one conversation history and the settings it runs
//! with. It is the piece a front end holds on to between prompts:
//!
//! ```text
//! prompt ──> ChatSession ──> Dispatcher ──> Gemini | Ollama
//!                ^                                  |
//!                └──────── replaced history ────────┘
//! ```
//!
//! Exchanges take `&mut self`, so a session can only have one in flight.

use crate::config::AiSettings;
use crate::dispatcher::Dispatcher;
use crate::llm::OnChunk;
use crate::types::{History, Turn};

pub struct ChatSession {
    dispatcher: Dispatcher,
    settings: AiSettings,
    history: History,
}

impl ChatSession {
    /// Create a session with an empty history.
    pub fn new(dispatcher: Dispatcher, settings: AiSettings) -> Self {
        Self {
            dispatcher,
            settings,
            history: History::new(),
        }
    }

    pub fn settings(&self) -> &AiSettings {
        &self.settings
    }

    /// Run a stateless emulated command. The history is not involved.
    pub async fn execute(&mut self, command: &str, on_chunk: &mut OnChunk<'_>) {
        self.dispatcher
            .execute_command(command, &self.settings, on_chunk)
            .await;
    }

    /// Send a chat message and adopt the history the dispatcher hands back.
    pub async fn chat(&mut self, message: &str, on_chunk: &mut OnChunk<'_>) {
        let history = std::mem::take(&mut self.history);
        self.history = self
            .dispatcher
            .send_message(message, history, &self.settings, on_chunk)
            .await;
    }

    /// Forget the conversation.
    pub fn reset(&mut self) {
        self.history = History::new();
    }

    /// Get a reference to the conversation history.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }
}
