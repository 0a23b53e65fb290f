//! Deterministic mock implementation of the shared `chat_provider` contract.
//!
//! This crate contains no transport logic and is intended for offline runs
//! and orchestrator-level tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chat_provider::{
    ChatMessage, CompletionError, CompletionProvider, ProviderProfile, ResponseMode, Role,
};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

const MOCK_MODEL_ID: &str = "mock";

/// One scripted answer for the next call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    /// Reply delivered as these fragments.
    Reply(Vec<String>),
    Failure(CompletionError),
}

impl MockOutcome {
    #[must_use]
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply(vec![text.into()])
    }

    #[must_use]
    pub fn chunks(chunks: &[&str]) -> Self {
        Self::Reply(chunks.iter().map(|chunk| chunk.to_string()).collect())
    }
}

/// What one `complete` call received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub messages: Vec<ChatMessage>,
    pub mode: ResponseMode,
    pub timeout: Duration,
}

/// Deterministic provider: scripted outcomes first, then an echo reply.
#[derive(Debug, Default)]
pub struct MockProvider {
    outcomes: Mutex<VecDeque<MockOutcome>>,
    requests: Mutex<Vec<RecordedRequest>>,
    token_delay: Duration,
}

impl MockProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that answers with `outcomes` in order.
    #[must_use]
    pub fn scripted(outcomes: impl IntoIterator<Item = MockOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Sleeps between streamed fragments, for interactive local runs.
    #[must_use]
    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    pub fn push_outcome(&self, outcome: MockOutcome) {
        lock_unpoisoned(&self.outcomes).push_back(outcome);
    }

    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        lock_unpoisoned(&self.requests).len()
    }

    fn next_outcome(&self, messages: &[ChatMessage]) -> MockOutcome {
        lock_unpoisoned(&self.outcomes)
            .pop_front()
            .unwrap_or_else(|| MockOutcome::Reply(echo_chunks(messages)))
    }
}

impl CompletionProvider for MockProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: MOCK_MODEL_ID.to_string(),
        }
    }

    fn complete(
        &self,
        messages: &[ChatMessage],
        mode: ResponseMode,
        timeout: Duration,
        emit: &mut dyn FnMut(&str),
    ) -> Result<String, CompletionError> {
        lock_unpoisoned(&self.requests).push(RecordedRequest {
            messages: messages.to_vec(),
            mode,
            timeout,
        });

        let chunks = match self.next_outcome(messages) {
            MockOutcome::Reply(chunks) => chunks,
            MockOutcome::Failure(error) => return Err(error),
        };

        if mode.is_streaming() {
            for chunk in &chunks {
                if !self.token_delay.is_zero() {
                    thread::sleep(self.token_delay);
                }
                emit(chunk);
            }
        }

        Ok(chunks.concat())
    }
}

fn echo_chunks(messages: &[ChatMessage]) -> Vec<String> {
    let prompt = messages
        .iter()
        .rev()
        .find(|message| message.role == Role::User)
        .map(|message| message.content.trim())
        .unwrap_or_default();

    let mut chunks = vec!["Mock reply to:".to_string()];
    chunks.extend(prompt.split_whitespace().map(|word| format!(" {word}")));
    chunks
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
