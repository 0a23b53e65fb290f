//! HTTP-backed implementation of the `chat_provider` contract.
//!
//! The adapter owns a current-thread tokio runtime and blocks on the async
//! `chat_api` client, so callers stay synchronous.

use std::sync::Arc;
use std::time::Duration;

use chat_api::{ChatApiClient, ChatApiConfig, ChatApiError, ChatRequest, ChatRequestMessage};
pub use chat_api::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use chat_provider::{
    ChatMessage, CompletionError, CompletionProvider, ProviderInitError, ProviderProfile,
    ResponseMode,
};

/// Stable provider identifier.
pub const API_PROVIDER_ID: &str = "openai-compatible";

const MISSING_KEY_MESSAGE: &str = "Missing API_KEY: set $API_KEY in the environment or a .env file";

/// Runtime configuration for the HTTP provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiProviderConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    pub user_agent: Option<String>,
    /// TCP connect timeout; `None` keeps the HTTP client's default.
    pub connect_timeout: Option<Duration>,
}

impl ApiProviderConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            user_agent: None,
            connect_timeout: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn into_chat_api_config(self) -> ChatApiConfig {
        let model = sanitize_model(&self.model);
        let mut config = ChatApiConfig::new(self.api_key).with_model(model);

        if let Some(base_url) = self.base_url {
            config = config.with_base_url(base_url);
        }

        if let Some(user_agent) = self.user_agent {
            config = config.with_user_agent(user_agent);
        }

        if let Some(timeout) = self.connect_timeout {
            config = config.with_connect_timeout(timeout);
        }

        config
    }
}

trait CompletionClient: Send + Sync {
    fn complete(&self, request: &ChatRequest, timeout: Duration) -> Result<String, ChatApiError>;

    fn stream(
        &self,
        request: &ChatRequest,
        timeout: Duration,
        on_delta: &mut dyn FnMut(&str),
    ) -> Result<String, ChatApiError>;
}

#[derive(Debug)]
struct DefaultCompletionClient {
    client: ChatApiClient,
    runtime: tokio::runtime::Runtime,
}

impl CompletionClient for DefaultCompletionClient {
    fn complete(&self, request: &ChatRequest, timeout: Duration) -> Result<String, ChatApiError> {
        self.runtime.block_on(self.client.complete(request, timeout))
    }

    fn stream(
        &self,
        request: &ChatRequest,
        timeout: Duration,
        on_delta: &mut dyn FnMut(&str),
    ) -> Result<String, ChatApiError> {
        self.runtime.block_on(
            self.client
                .stream_with_handler(request, timeout, |delta| on_delta(delta)),
        )
    }
}

/// `CompletionProvider` adapter backed by `chat_api` transport primitives.
pub struct ApiCompletionProvider {
    model: String,
    has_api_key: bool,
    client: Arc<dyn CompletionClient>,
}

impl ApiCompletionProvider {
    /// Creates a provider using real HTTP transport.
    ///
    /// A missing credential is not an error here; it surfaces as
    /// [`CompletionError::Configuration`] on the first request.
    pub fn new(config: ApiProviderConfig) -> Result<Self, ProviderInitError> {
        let config = config.into_chat_api_config();
        let model = config.model.clone();
        let has_api_key = config.has_api_key();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                ProviderInitError::new(format!("failed to initialize tokio runtime: {error}"))
            })?;
        let client = ChatApiClient::new(config).map_err(map_init_error)?;

        Ok(Self {
            model,
            has_api_key,
            client: Arc::new(DefaultCompletionClient { client, runtime }),
        })
    }

    fn build_request(&self, messages: &[ChatMessage], mode: ResponseMode) -> ChatRequest {
        let messages = messages
            .iter()
            .map(|message| ChatRequestMessage::new(message.role.as_str(), message.content.clone()))
            .collect();
        ChatRequest::new(self.model.clone(), messages).with_stream(mode.is_streaming())
    }

    #[cfg(test)]
    fn with_client_for_tests(
        model: &str,
        has_api_key: bool,
        client: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            model: sanitize_model(model),
            has_api_key,
            client,
        }
    }
}

impl CompletionProvider for ApiCompletionProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: API_PROVIDER_ID.to_string(),
            model_id: self.model.clone(),
        }
    }

    fn complete(
        &self,
        messages: &[ChatMessage],
        mode: ResponseMode,
        timeout: Duration,
        emit: &mut dyn FnMut(&str),
    ) -> Result<String, CompletionError> {
        if !self.has_api_key {
            return Err(CompletionError::Configuration(MISSING_KEY_MESSAGE.to_string()));
        }

        let request = self.build_request(messages, mode);
        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            streaming = mode.is_streaming(),
            "completion requested"
        );

        let result = match mode {
            ResponseMode::Buffered => self.client.complete(&request, timeout),
            ResponseMode::Streaming => self.client.stream(&request, timeout, emit),
        };
        result.map_err(map_completion_error)
    }
}

fn sanitize_model(model: &str) -> String {
    let trimmed = model.trim();
    if trimmed.is_empty() {
        chat_api::DEFAULT_MODEL.to_string()
    } else {
        trimmed.to_string()
    }
}

fn map_init_error(error: ChatApiError) -> ProviderInitError {
    ProviderInitError::new(format!("failed to initialize HTTP client: {error}"))
}

fn map_completion_error(error: ChatApiError) -> CompletionError {
    match error {
        ChatApiError::MissingApiKey => {
            CompletionError::Configuration(MISSING_KEY_MESSAGE.to_string())
        }
        ChatApiError::InvalidHeader(message) => CompletionError::Configuration(message),
        ChatApiError::Status(status, body) => CompletionError::request(Some(status.as_u16()), body),
        malformed @ ChatApiError::MalformedChunk { .. } => {
            CompletionError::StreamDecode(malformed.to_string())
        }
        other => CompletionError::request(
            other.status().map(|status| status.as_u16()),
            other.to_string(),
        ),
    }
}
