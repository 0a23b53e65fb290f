use std::future::Future;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};

use crate::config::ChatApiConfig;
use crate::error::ChatApiError;
use crate::headers::build_headers;
use crate::payload::{ChatRequest, ChatRequestMessage, ChatResponse};
use crate::sse::SseLineDecoder;
use crate::url::normalize_completions_url;

#[derive(Debug)]
pub struct ChatApiClient {
    http: Client,
    config: ChatApiConfig,
}

impl ChatApiClient {
    pub fn new(config: ChatApiConfig) -> Result<Self, ChatApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().map_err(ChatApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ChatApiConfig {
        &self.config
    }

    pub fn normalized_endpoint(&self) -> String {
        normalize_completions_url(&self.config.base_url)
    }

    /// Request body for `messages` using the configured model.
    pub fn request_for(&self, messages: Vec<ChatRequestMessage>, streaming: bool) -> ChatRequest {
        ChatRequest::new(self.config.model.clone(), messages).with_stream(streaming)
    }

    pub fn build_headers(&self, streaming: bool) -> Result<HeaderMap, ChatApiError> {
        let headers = build_headers(&self.config, streaming)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| ChatApiError::InvalidHeader(format!("invalid header key: {key}")))?,
                HeaderValue::from_str(&value).map_err(|_| {
                    ChatApiError::InvalidHeader(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    /// Fails with [`ChatApiError::MissingApiKey`] without touching the network.
    pub fn build_request(
        &self,
        request: &ChatRequest,
    ) -> Result<reqwest::RequestBuilder, ChatApiError> {
        let headers = self.build_headers(request.is_streaming())?;
        Ok(self
            .http
            .post(self.normalized_endpoint())
            .headers(headers)
            .json(request))
    }

    /// Buffered exchange; `timeout` bounds connect through the full body.
    pub async fn complete(
        &self,
        request: &ChatRequest,
        timeout: Duration,
    ) -> Result<String, ChatApiError> {
        let mut request = request.clone();
        request.stream = None;
        let builder = self.build_request(&request)?;

        tracing::debug!(
            endpoint = %self.normalized_endpoint(),
            messages = request.messages.len(),
            "sending buffered completion request"
        );

        with_deadline(timeout, "waiting for the completion response", async {
            let response = check_status(builder.send().await?).await?;
            let body = response.text().await?;
            let parsed: ChatResponse = serde_json::from_str(&body)?;
            parsed
                .first_content()
                .map(ToOwned::to_owned)
                .ok_or(ChatApiError::MissingContent(body))
        })
        .await?
    }

    /// Streaming exchange. `on_delta` sees every content fragment in arrival
    /// order; the return value is their concatenation.
    ///
    /// `timeout` bounds connect plus response headers, then each chunk read.
    pub async fn stream_with_handler<F>(
        &self,
        request: &ChatRequest,
        timeout: Duration,
        mut on_delta: F,
    ) -> Result<String, ChatApiError>
    where
        F: FnMut(&str),
    {
        let request = request.clone().with_stream(true);
        let builder = self.build_request(&request)?;

        tracing::debug!(
            endpoint = %self.normalized_endpoint(),
            messages = request.messages.len(),
            "sending streaming completion request"
        );

        let response = with_deadline(timeout, "waiting for response headers", async {
            check_status(builder.send().await?).await
        })
        .await??;

        let mut bytes = response.bytes_stream();
        let mut decoder = SseLineDecoder::default();
        let mut reply = String::new();

        loop {
            let Some(chunk) = with_deadline(timeout, "reading the response stream", bytes.next())
                .await?
            else {
                break;
            };
            let chunk = chunk.map_err(ChatApiError::from)?;
            for delta in decoder.feed(&chunk)? {
                on_delta(&delta);
                reply.push_str(&delta);
            }
            if decoder.is_done() {
                break;
            }
        }

        for delta in decoder.finish()? {
            on_delta(&delta);
            reply.push_str(&delta);
        }

        tracing::debug!(chars = reply.len(), "completion stream finished");
        Ok(reply)
    }

    /// Streaming exchange that only collects the text.
    pub async fn stream(
        &self,
        request: &ChatRequest,
        timeout: Duration,
    ) -> Result<String, ChatApiError> {
        self.stream_with_handler(request, timeout, |_| {}).await
    }
}

async fn check_status(response: Response) -> Result<Response, ChatApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), "completion request rejected");
    Err(ChatApiError::Status(status, body))
}

async fn with_deadline<F>(
    after: Duration,
    phase: &'static str,
    future: F,
) -> Result<F::Output, ChatApiError>
where
    F: Future,
{
    tokio::time::timeout(after, future)
        .await
        .map_err(|_| ChatApiError::Timeout { phase, after })
}
