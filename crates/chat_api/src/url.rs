/// Default base URL for chat-completion requests.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/";

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Normalize a base URL to the chat-completions endpoint.
///
/// Normalization rules:
/// 1) keep `/v1/chat/completions` unchanged
/// 2) append `/chat/completions` when path ends in `/v1`
/// 3) append `/v1/chat/completions` otherwise
pub fn normalize_completions_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with(COMPLETIONS_PATH) {
        return trimmed.to_string();
    }
    if trimmed.ends_with("/v1") {
        return format!("{trimmed}/chat/completions");
    }
    format!("{trimmed}{COMPLETIONS_PATH}")
}
