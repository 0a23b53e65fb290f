//! Minimal provider-agnostic contract for one chat-completion exchange.
//!
//! This crate defines the message list sent upstream, the response mode, and
//! the error taxonomy callers branch on. It excludes transport details and
//! anything about how conversations are persisted.

use std::fmt;
use std::time::Duration;

/// Request timeout used when the caller has no configured value.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error returned while constructing/configuring a provider before any request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderInitError {}

impl From<String> for ProviderInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name used in request bodies.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(role, content)` entry of the transient message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// `[system?, user]` for a single prompt. Blank instructions are omitted.
#[must_use]
pub fn prompt_messages(instructions: Option<&str>, prompt: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(text) = instructions.filter(|text| !text.trim().is_empty()) {
        messages.push(ChatMessage::system(text));
    }
    messages.push(ChatMessage::user(prompt));
    messages
}

/// Whether the reply is delivered in one body or as incremental fragments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseMode {
    #[default]
    Buffered,
    Streaming,
}

impl ResponseMode {
    #[must_use]
    pub fn from_flag(streaming: bool) -> Self {
        if streaming {
            Self::Streaming
        } else {
            Self::Buffered
        }
    }

    #[must_use]
    pub fn is_streaming(self) -> bool {
        matches!(self, Self::Streaming)
    }
}

/// Failure of one completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// Missing credential or other setup problem; no request was attempted.
    Configuration(String),
    /// Transport failure, timeout, or non-2xx status. `status` is `None`
    /// when the server never answered.
    Request { status: Option<u16>, body: String },
    /// A streamed fragment could not be decoded; the whole call is aborted.
    StreamDecode(String),
}

impl CompletionError {
    #[must_use]
    pub fn request(status: Option<u16>, body: impl Into<String>) -> Self {
        Self::Request {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => *status,
            _ => None,
        }
    }

    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "configuration error: {message}"),
            Self::Request {
                status: Some(status),
                body,
            } => write!(f, "request failed with HTTP {status}: {body}"),
            Self::Request { status: None, body } => write!(f, "request failed: {body}"),
            Self::StreamDecode(message) => write!(f, "stream decode error: {message}"),
        }
    }
}

impl std::error::Error for CompletionError {}

/// Immutable metadata describing a completion provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// Blocking interface for one chat-completion exchange.
pub trait CompletionProvider: Send + Sync + 'static {
    fn profile(&self) -> ProviderProfile;

    /// Sends `messages` and returns the reply text.
    ///
    /// In [`ResponseMode::Streaming`] every fragment is passed to `emit` in
    /// arrival order and the returned text equals their concatenation.
    /// Buffered providers may call `emit` once with the whole reply or not
    /// at all.
    fn complete(
        &self,
        messages: &[ChatMessage],
        mode: ResponseMode,
        timeout: Duration,
        emit: &mut dyn FnMut(&str),
    ) -> Result<String, CompletionError>;
}
