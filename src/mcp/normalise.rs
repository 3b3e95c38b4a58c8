//! Normalisation of prompt handler return values into MCP messages.
//!
//! A prompt handler may return any serialisable value. [`PromptReturn`]
//! classifies it into one of four accepted shapes and
//! [`PromptReturn::normalise`] turns each shape into the `messages` array of
//! a `prompts/get` result:
//!
//! | Shape | Messages |
//! |-------|----------|
//! | `Text` | one user message holding the text |
//! | `MessageList` | the list, unchanged |
//! | `MessageEnvelope` | its `messages`; the other keys are passed through |
//! | `Opaque` | one user message holding the value as JSON text |

use serde::Serialize;
use serde_json::{Map, Value};

/// Content block of a message or tool result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

impl Content {
    /// Creates a text content block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// A prompt message with a text body.
///
/// Prompt handlers can return these (or a `Vec` of them) instead of building
/// the JSON by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Speaker role, e.g. `user`, `system` or `assistant`.
    pub role: String,
    /// Message body.
    pub content: Content,
}

impl Message {
    /// Creates a message with an arbitrary role.
    #[must_use]
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Content::text(text),
        }
    }

    /// Creates a `user` message.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new("user", text)
    }

    /// Creates a `system` message.
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::new("system", text)
    }

    /// Creates an `assistant` message.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new("assistant", text)
    }

    fn into_value(self) -> Value {
        serde_json::json!({
            "role": self.role,
            "content": self.content,
        })
    }
}

/// Whether `value` is an object with both `role` and `content` keys.
#[must_use]
pub fn is_message(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.contains_key("role") && obj.contains_key("content"))
}

fn all_messages(items: &[Value]) -> bool {
    items.iter().all(is_message)
}

/// The accepted return shapes of a prompt handler.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptReturn {
    /// Plain text.
    Text(String),
    /// A sequence in which every element is a message.
    MessageList(Vec<Value>),
    /// An object whose `messages` key holds a message sequence.
    MessageEnvelope {
        /// The message sequence.
        messages: Vec<Value>,
        /// Every other key of the object.
        extra: Map<String, Value>,
    },
    /// Anything else.
    Opaque(Value),
}

/// Messages plus any pass-through keys from an envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalisedPrompt {
    /// Canonical message list.
    pub messages: Vec<Value>,
    /// Keys to place next to `messages` in the response.
    pub extra: Map<String, Value>,
}

impl PromptReturn {
    /// Classifies a handler's return value.
    ///
    /// A sequence (or envelope) containing even one element that is not a
    /// message is [`PromptReturn::Opaque`] as a whole.
    #[must_use]
    pub fn classify(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            Value::Array(items) if all_messages(&items) => Self::MessageList(items),
            Value::Object(mut obj) => match obj.remove("messages") {
                Some(Value::Array(messages)) if all_messages(&messages) => {
                    Self::MessageEnvelope {
                        messages,
                        extra: obj,
                    }
                }
                taken => {
                    if let Some(messages) = taken {
                        obj.insert("messages".to_string(), messages);
                    }
                    Self::Opaque(Value::Object(obj))
                }
            },
            other => Self::Opaque(other),
        }
    }

    /// Converts the classified value into its message list.
    #[must_use]
    pub fn normalise(self) -> NormalisedPrompt {
        match self {
            Self::Text(text) => NormalisedPrompt {
                messages: vec![Message::user(text).into_value()],
                extra: Map::new(),
            },
            Self::MessageList(messages) => NormalisedPrompt {
                messages,
                extra: Map::new(),
            },
            Self::MessageEnvelope { messages, extra } => NormalisedPrompt { messages, extra },
            Self::Opaque(value) => NormalisedPrompt {
                messages: vec![Message::user(value.to_string()).into_value()],
                extra: Map::new(),
            },
        }
    }
}

impl From<Value> for PromptReturn {
    fn from(value: Value) -> Self {
        Self::classify(value)
    }
}
