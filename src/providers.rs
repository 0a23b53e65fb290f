//! Completion provider selection at startup.

use std::time::Duration;

use chat_provider::{CompletionProvider, ProviderInitError};
use chat_provider_api::{ApiCompletionProvider, ApiProviderConfig};
use chat_provider_mock::{MockProvider, MOCK_PROVIDER_ID};

use crate::config::EnvConfig;

pub const API_PROVIDER: &str = "api";

const MOCK_TOKEN_DELAY: Duration = Duration::from_millis(15);

pub fn provider_from_config(
    config: &EnvConfig,
) -> Result<Box<dyn CompletionProvider>, ProviderInitError> {
    provider_for_id(config.provider.trim(), config)
}

pub fn provider_for_id(
    provider_id: &str,
    config: &EnvConfig,
) -> Result<Box<dyn CompletionProvider>, ProviderInitError> {
    match provider_id {
        API_PROVIDER => Ok(Box::new(ApiCompletionProvider::new(api_config(config))?)),
        MOCK_PROVIDER_ID => Ok(Box::new(
            MockProvider::new().with_token_delay(MOCK_TOKEN_DELAY),
        )),
        unknown => Err(ProviderInitError::new(format!(
            "Unsupported provider '{unknown}'. Available providers: {API_PROVIDER}, {MOCK_PROVIDER_ID}"
        ))),
    }
}

/// The request timeout also bounds connection setup.
fn api_config(config: &EnvConfig) -> ApiProviderConfig {
    ApiProviderConfig::new(config.api_key.clone().unwrap_or_default(), &config.model)
        .with_base_url(config.base_url.clone())
        .with_connect_timeout(config.timeout)
}
