//! Core data types shared by the dispatcher and both providers.
//!
//! The history type here is provider-neutral. Each provider converts it to
//! and from its own wire format; nothing outside `llm` needs to know what
//! those formats look like.

use serde_json::Value;

// --- Roles ---

/// Who produced a turn.
///
/// Gemini calls the assistant side `"model"`, Ollama calls it
/// `"assistant"`. Both map onto [`Role::Assistant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

// --- Parts ---

/// One piece of a turn's payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// Plain text.
    Text(String),
    /// Any non-text part a provider produced (inline data, function calls,
    /// ...), kept verbatim so it survives a round trip through the history.
    Opaque(Value),
}

impl Part {
    /// The part's text, if it has any.
    ///
    /// Opaque parts count as text when they carry a string `text` field;
    /// Gemini attaches extra keys such as `thoughtSignature` to text parts.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(text) => Some(text),
            Part::Opaque(value) => value.get("text").and_then(Value::as_str),
        }
    }
}

// --- Turns ---

/// A single entry in the conversation history.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    /// Create a user turn holding one text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Create an assistant turn holding one text part.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// The turn's text, with parts joined by a single space.
    ///
    /// Returns `None` when any part has no text, since such a turn cannot be
    /// reduced to a plain string without losing content.
    pub fn plain_text(&self) -> Option<String> {
        let texts = self
            .parts
            .iter()
            .map(Part::as_text)
            .collect::<Option<Vec<_>>>()?;
        Some(texts.join(" "))
    }
}

/// Ordered conversation log. Replaced wholesale after each chat exchange.
pub type History = Vec<Turn>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_text_joins_parts() {
        let turn = Turn {
            role: Role::User,
            parts: vec![Part::Text("ls".into()), Part::Text("-la".into())],
        };
        assert_eq!(turn.plain_text().as_deref(), Some("ls -la"));
    }

    #[test]
    fn test_plain_text_rejects_opaque_parts() {
        let turn = Turn {
            role: Role::Assistant,
            parts: vec![
                Part::Text("here".into()),
                Part::Opaque(json!({"inlineData": {"mimeType": "image/png", "data": "AA=="}})),
            ],
        };
        assert_eq!(turn.plain_text(), None);
    }

    #[test]
    fn test_plain_text_accepts_annotated_text_parts() {
        let turn = Turn {
            role: Role::Assistant,
            parts: vec![
                Part::Opaque(json!({"text": "step one", "thought": true})),
                Part::Opaque(json!({"text": "done", "thoughtSignature": "c2ln"})),
            ],
        };
        assert_eq!(turn.plain_text().as_deref(), Some("step one done"));
        assert_eq!(Part::Opaque(json!({"text": 3})).as_text(), None);
    }

    #[test]
    fn test_constructors() {
        assert_eq!(Turn::user("hi").role, Role::User);
        assert_eq!(Turn::assistant("yo").plain_text().as_deref(), Some("yo"));
    }
}
