//! aiterm - an AI-emulated terminal with two interchangeable backends.
//!
//! The crate's core is the streaming layer in [`llm`]: one
//! [`llm::LlmProvider`] trait implemented for Gemini and Ollama, the
//! newline-delimited JSON decoder Ollama needs, and the [`Dispatcher`] that
//! selects a backend per call and turns failures into output.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod llm;
pub mod prompts;
pub mod session;
pub mod types;

#[cfg(test)]
mod testing;

pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use session::ChatSession;
pub use types::{History, Part, Role, Turn};
