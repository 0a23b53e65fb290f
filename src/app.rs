//! Interactive chat loop.
//!
//! The loop is an explicit state machine:
//!
//! ```text
//! AwaitingInput --line--> Sending --reply--> Appended --resume--> AwaitingInput
//!                                 --error--> Failed   --resume--> AwaitingInput
//! AwaitingInput --exit | end of input--> Ended
//! ```
//!
//! Every turn resends the whole message list. A failed turn removes the user
//! message it added, so the next turn starts from the same history.

use std::time::Duration;

use chat_provider::{ChatMessage, CompletionProvider, ResponseMode, Role};
use session_store::{CommitStatus, Exchange, SessionStore, StoreError};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::commands::{parse_repl_command, ReplCommand, HELP_TEXT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplState {
    AwaitingInput,
    Sending,
    Appended,
    Failed,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplEvent {
    LineSubmitted,
    ExitRequested,
    InputClosed,
    ReplyReceived,
    RequestFailed,
    Resume,
}

impl ReplState {
    /// Next state for `event`, or `None` when the transition is not allowed.
    #[must_use]
    pub fn on(self, event: ReplEvent) -> Option<Self> {
        use ReplEvent as E;
        use ReplState as S;

        match (self, event) {
            (S::AwaitingInput, E::LineSubmitted) => Some(S::Sending),
            (S::AwaitingInput, E::ExitRequested | E::InputClosed) => Some(S::Ended),
            (S::Sending, E::ReplyReceived) => Some(S::Appended),
            (S::Sending, E::RequestFailed) => Some(S::Failed),
            (S::Appended | S::Failed, E::Resume) => Some(S::AwaitingInput),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Ended
    }
}

/// Result of one interactive read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    Eof,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Terminal side of the loop.
pub trait ReplIo {
    fn read_line(&mut self, prompt: &str) -> ReadOutcome;
    /// Writes reply text as it arrives.
    fn write_chunk(&mut self, text: &str);
    /// Called once after a reply (or a partial reply) has been written.
    fn end_reply(&mut self);
    fn notice(&mut self, level: NoticeLevel, message: &str);
    fn confirm(&mut self, question: &str) -> bool;
    /// Asks for a session name. `None` cancels; an empty answer takes the suggestion.
    fn ask_name(&mut self, question: &str, suggestion: &str) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    NothingToSave,
    Discarded,
    Saved { name: String },
}

pub const INPUT_PROMPT: &str = ">> ";
const SAVE_QUESTION: &str = "Save this conversation?";
const NAME_QUESTION: &str = "Session name";

pub struct Repl {
    state: ReplState,
    instruction: Option<String>,
    messages: Vec<ChatMessage>,
    exchanges: Vec<Exchange>,
    mode: ResponseMode,
    timeout: Duration,
}

impl Repl {
    pub fn new(instruction: Option<String>, mode: ResponseMode, timeout: Duration) -> Self {
        let instruction = instruction.filter(|text| !text.trim().is_empty());
        let messages = instruction
            .iter()
            .map(|text| ChatMessage::system(text.clone()))
            .collect();

        Self {
            state: ReplState::AwaitingInput,
            instruction,
            messages,
            exchanges: Vec::new(),
            mode,
            timeout,
        }
    }

    pub fn state(&self) -> ReplState {
        self.state
    }

    /// Message list resent on the next turn.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Completed user/assistant pairs, in order.
    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    /// Reads and handles lines until the loop ends.
    pub fn run(&mut self, provider: &dyn CompletionProvider, io: &mut dyn ReplIo) {
        while !self.state.is_terminal() {
            let event = match io.read_line(INPUT_PROMPT) {
                ReadOutcome::Line(line) => {
                    self.handle_line(&line, provider, io);
                    continue;
                }
                ReadOutcome::Eof | ReadOutcome::Interrupted => ReplEvent::InputClosed,
            };
            self.resume();
            self.apply(event);
        }
    }

    /// Handles one input line and returns the state it left the loop in:
    /// `Appended`, `Failed`, `Ended`, or `AwaitingInput` for lines that sent
    /// nothing.
    pub fn handle_line(
        &mut self,
        line: &str,
        provider: &dyn CompletionProvider,
        io: &mut dyn ReplIo,
    ) -> ReplState {
        self.resume();
        if self.state.is_terminal() {
            return self.state;
        }

        let text = line.trim();
        if text.is_empty() {
            return self.state;
        }

        match parse_repl_command(text) {
            Some(ReplCommand::Exit) => {
                self.apply(ReplEvent::ExitRequested);
                return self.state;
            }
            Some(ReplCommand::Help) => {
                io.notice(NoticeLevel::Info, HELP_TEXT);
                return self.state;
            }
            None => {}
        }

        self.apply(ReplEvent::LineSubmitted);
        self.messages.push(ChatMessage::user(text));

        let result = provider.complete(&self.messages, self.mode, self.timeout, &mut |chunk| {
            io.write_chunk(chunk)
        });

        match result {
            Ok(reply) => {
                if !self.mode.is_streaming() {
                    io.write_chunk(&reply);
                }
                io.end_reply();
                self.messages.push(ChatMessage::assistant(reply.clone()));
                self.exchanges.push(Exchange::new(text, reply));
                self.apply(ReplEvent::ReplyReceived);
            }
            Err(error) => {
                if self.mode.is_streaming() {
                    io.end_reply();
                }
                self.rollback_user_turn(text);
                tracing::debug!(%error, "chat turn failed");
                io.notice(NoticeLevel::Error, &format!("Failed to fetch reply: {error}"));
                self.apply(ReplEvent::RequestFailed);
            }
        }

        self.state
    }

    /// Offers to persist the recorded exchanges into a brand-new session.
    pub fn finish(
        &mut self,
        store: &SessionStore,
        io: &mut dyn ReplIo,
    ) -> Result<SaveOutcome, StoreError> {
        if self.exchanges.is_empty() {
            return Ok(SaveOutcome::NothingToSave);
        }
        if !io.confirm(SAVE_QUESTION) {
            self.discard();
            return Ok(SaveOutcome::Discarded);
        }

        let (name, created) = loop {
            let suggestion = suggest_session_name(store, now_local())?;
            let Some(answer) = io.ask_name(NAME_QUESTION, &suggestion) else {
                self.discard();
                return Ok(SaveOutcome::Discarded);
            };
            let name = match answer.trim() {
                "" => suggestion,
                typed => typed.to_string(),
            };

            match store.create(&name, self.instruction.as_deref()) {
                Ok(status) => break (name, status),
                Err(error @ (StoreError::SessionExists { .. } | StoreError::InvalidName { .. })) => {
                    io.notice(NoticeLevel::Warning, &format!("{error}; choose another name"));
                }
                Err(error) => return Err(error),
            }
        };
        report_commit(io, &created);

        let appended = store.append_exchanges(&name, &self.exchanges)?;
        report_commit(io, &appended);

        tracing::debug!(session = %name, exchanges = self.exchanges.len(), "chat saved");
        self.exchanges.clear();
        Ok(SaveOutcome::Saved { name })
    }

    fn apply(&mut self, event: ReplEvent) {
        match self.state.on(event) {
            Some(next) => self.state = next,
            None => tracing::debug!(state = ?self.state, ?event, "ignored repl transition"),
        }
    }

    fn resume(&mut self) {
        if matches!(self.state, ReplState::Appended | ReplState::Failed) {
            self.apply(ReplEvent::Resume);
        }
    }

    fn rollback_user_turn(&mut self, prompt: &str) {
        if self
            .messages
            .last()
            .is_some_and(|message| message.role == Role::User && message.content == prompt)
        {
            self.messages.pop();
        }
    }

    fn discard(&mut self) {
        self.exchanges.clear();
        self.messages.retain(|message| message.role == Role::System);
    }
}

fn report_commit(io: &mut dyn ReplIo, status: &CommitStatus) {
    if let Some(warning) = status.warning() {
        io.notice(
            NoticeLevel::Warning,
            &format!("version history not updated: {warning}"),
        );
    }
}

fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// `chat-YYYYMMDD-HHMMSS`, suffixed `-2`, `-3`, ... until the name is free.
pub fn suggest_session_name(
    store: &SessionStore,
    at: OffsetDateTime,
) -> Result<String, StoreError> {
    let format = format_description!("chat-[year][month][day]-[hour][minute][second]");
    let base = at
        .format(&format)
        .unwrap_or_else(|_| format!("chat-{}", at.unix_timestamp()));

    if !store.exists(&base)? {
        return Ok(base);
    }
    let mut counter = 2_u32;
    loop {
        let candidate = format!("{base}-{counter}");
        if !store.exists(&candidate)? {
            return Ok(candidate);
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{ReplEvent as E, ReplState as S};

    #[test]
    fn transitions_follow_the_turn_cycle() {
        assert_eq!(S::AwaitingInput.on(E::LineSubmitted), Some(S::Sending));
        assert_eq!(S::Sending.on(E::ReplyReceived), Some(S::Appended));
        assert_eq!(S::Sending.on(E::RequestFailed), Some(S::Failed));
        assert_eq!(S::Appended.on(E::Resume), Some(S::AwaitingInput));
        assert_eq!(S::Failed.on(E::Resume), Some(S::AwaitingInput));
        assert_eq!(S::AwaitingInput.on(E::ExitRequested), Some(S::Ended));
        assert_eq!(S::AwaitingInput.on(E::InputClosed), Some(S::Ended));
    }

    #[test]
    fn ended_is_terminal_and_rejects_every_event() {
        for event in [
            E::LineSubmitted,
            E::ExitRequested,
            E::InputClosed,
            E::ReplyReceived,
            E::RequestFailed,
            E::Resume,
        ] {
            assert_eq!(S::Ended.on(event), None);
        }
        assert!(S::Ended.is_terminal());
        assert!(!S::AwaitingInput.is_terminal());
    }

    #[test]
    fn sending_cannot_be_interrupted_by_input_events() {
        assert_eq!(S::Sending.on(E::LineSubmitted), None);
        assert_eq!(S::Sending.on(E::ExitRequested), None);
        assert_eq!(S::AwaitingInput.on(E::ReplyReceived), None);
    }
}
