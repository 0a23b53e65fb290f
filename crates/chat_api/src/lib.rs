//! Transport-only client for OpenAI-compatible chat-completion endpoints.
//!
//! This crate owns request building, URL normalization, and response/stream
//! decoding for `POST <base>/v1/chat/completions`. It knows nothing about
//! sessions or terminals; callers receive text and typed errors.

pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod payload;
pub mod sse;
pub mod url;

pub use client::ChatApiClient;
pub use config::{ChatApiConfig, DEFAULT_MODEL};
pub use error::ChatApiError;
pub use payload::{ChatRequest, ChatRequestMessage};
pub use reqwest::StatusCode;
pub use sse::SseLineDecoder;
pub use url::{normalize_completions_url, DEFAULT_BASE_URL};
