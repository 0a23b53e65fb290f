use std::sync::Arc;
use std::time::Duration;

use ag::ask::{AskError, AskOutcome, AskRequest, Asker, InstructionChoice};
use chat_provider::{ChatMessage, CompletionError, ResponseMode};
use chat_provider_mock::{MockOutcome, MockProvider};
use session_store::{
    render_template, CommitStatus, InstructionStore, RecordingVersionControl, SessionStore,
    StoreError,
};
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(7);

struct Fixture {
    dir: TempDir,
    sessions: SessionStore,
    instructions: InstructionStore,
    vcs: Arc<RecordingVersionControl>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let vcs = Arc::new(RecordingVersionControl::default());
        Self {
            sessions: SessionStore::open(dir.path(), vcs.clone()),
            instructions: InstructionStore::open(dir.path()),
            vcs,
            dir,
        }
    }

    fn asker<'a>(&'a self, provider: &'a MockProvider) -> Asker<'a> {
        Asker::new(&self.sessions, &self.instructions, provider, TIMEOUT)
    }

    fn instruction(&self, name: &str, text: &str) {
        let seed = self.dir.path().join(format!("{name}.seed"));
        std::fs::write(&seed, text).expect("seed should be written");
        self.instructions
            .create(name, Some(&seed))
            .expect("instruction should be created");
    }
}

fn stdin_request(text: &str) -> AskRequest {
    AskRequest {
        stdin_prompt: Some(text.to_string()),
        ..AskRequest::default()
    }
}

fn no_emit(_chunk: &str) {}

#[test]
fn session_prompt_sends_whole_file_and_appends_only_the_reply() {
    let fx = Fixture::new();
    fx.sessions.create("work", Some("rules")).expect("create");
    fx.sessions
        .append_exchange("work", "first", "one")
        .expect("append");
    let before = fx.sessions.read_full("work").expect("read");
    let provider = MockProvider::scripted([MockOutcome::reply("two")]);

    let report = fx
        .asker(&provider)
        .ask(
            &AskRequest {
                session: Some("work".to_string()),
                ..AskRequest::default()
            },
            &mut no_emit,
        )
        .expect("ask should succeed");

    assert_eq!(report.reply, "two");
    assert_eq!(
        report.outcome,
        AskOutcome::Appended {
            name: "work".to_string(),
            commit: CommitStatus::Committed
        }
    );
    assert_eq!(provider.requests()[0].messages, vec![ChatMessage::user(before.clone())]);
    assert_eq!(provider.requests()[0].timeout, TIMEOUT);

    let after = fx.sessions.read_full("work").expect("read");
    assert_eq!(after, format!("{before}\n### Assistant\n```reply\ntwo\n```\n"));
}

#[test]
fn default_session_is_used_when_no_name_is_given() {
    let fx = Fixture::new();
    fx.sessions.create("main", None).expect("create");
    fx.sessions.set_default("main").expect("set default");
    let provider = MockProvider::scripted([MockOutcome::reply("hi")]);

    let report = fx
        .asker(&provider)
        .ask(&AskRequest::default(), &mut no_emit)
        .expect("ask should succeed");

    assert!(matches!(report.outcome, AskOutcome::Appended { ref name, .. } if name == "main"));
}

#[test]
fn missing_prompt_source_is_reported_before_any_request() {
    let fx = Fixture::new();
    let provider = MockProvider::new();

    let error = fx
        .asker(&provider)
        .ask(&AskRequest::default(), &mut no_emit)
        .expect_err("ask must fail");

    assert!(matches!(error, AskError::NoPromptSource));
    assert_eq!(provider.call_count(), 0);
}

#[test]
fn stale_default_session_fails_with_not_found() {
    let fx = Fixture::new();
    fx.sessions.create("x", None).expect("create");
    fx.sessions.set_default("x").expect("set default");
    fx.sessions.delete("x").expect("delete");
    let provider = MockProvider::new();

    let error = fx
        .asker(&provider)
        .ask(&AskRequest::default(), &mut no_emit)
        .expect_err("ask must fail");

    assert!(matches!(error, AskError::Store(StoreError::SessionNotFound { ref name }) if name == "x"));
    assert_eq!(provider.call_count(), 0);
}

#[test]
fn stdin_prompt_with_target_appends_a_full_exchange() {
    let fx = Fixture::new();
    fx.sessions.create("log", None).expect("create");
    let provider = MockProvider::scripted([MockOutcome::reply("answer")]);

    let report = fx
        .asker(&provider)
        .ask(
            &AskRequest {
                session: Some("log".to_string()),
                ..stdin_request("  piped question \n")
            },
            &mut no_emit,
        )
        .expect("ask should succeed");

    assert!(matches!(report.outcome, AskOutcome::Appended { .. }));
    assert_eq!(
        provider.requests()[0].messages,
        vec![ChatMessage::user("piped question")]
    );
    assert_eq!(
        fx.sessions.read_full("log").expect("read"),
        format!(
            "{}\n### User\npiped question\n\n### Assistant\n```reply\nanswer\n```\n",
            render_template("log", None)
        )
    );
}

#[test]
fn stdin_prompt_without_target_is_discarded() {
    let fx = Fixture::new();
    let provider = MockProvider::scripted([MockOutcome::reply("gone")]);

    let report = fx
        .asker(&provider)
        .ask(&stdin_request("q"), &mut no_emit)
        .expect("ask should succeed");

    assert_eq!(report.outcome, AskOutcome::Discarded);
    assert_eq!(report.reply, "gone");
    assert!(fx.sessions.list().expect("list").is_empty());
    assert!(fx.vcs.messages().is_empty());
}

#[test]
fn temp_run_leaves_the_source_session_untouched() {
    let fx = Fixture::new();
    fx.sessions.create("work", None).expect("create");
    let before = fx.sessions.read_full("work").expect("read");
    let commits_before = fx.vcs.messages().len();
    let provider = MockProvider::scripted([MockOutcome::reply("scratch reply")]);

    let report = fx
        .asker(&provider)
        .ask(
            &AskRequest {
                session: Some("work".to_string()),
                temp: true,
                ..AskRequest::default()
            },
            &mut no_emit,
        )
        .expect("ask should succeed");

    assert_eq!(report.outcome, AskOutcome::Discarded);
    assert_eq!(fx.sessions.read_full("work").expect("read"), before);
    assert_eq!(fx.vcs.messages().len(), commits_before);
}

#[test]
fn temp_run_with_save_as_creates_a_new_session() {
    let fx = Fixture::new();
    fx.instruction("terse", "Answer briefly.");
    let provider = MockProvider::scripted([MockOutcome::reply("42")]);

    let report = fx
        .asker(&provider)
        .ask(
            &AskRequest {
                temp: true,
                save_as: Some("answers".to_string()),
                instruction: InstructionChoice::Named("terse".to_string()),
                ..stdin_request("meaning of life?")
            },
            &mut no_emit,
        )
        .expect("ask should succeed");

    assert_eq!(
        report.outcome,
        AskOutcome::SavedAs {
            name: "answers".to_string(),
            commit: CommitStatus::Committed
        }
    );
    assert_eq!(
        fx.sessions.read_full("answers").expect("read"),
        format!(
            "{}\n### User\nmeaning of life?\n\n### Assistant\n```reply\n42\n```\n",
            render_template("answers", Some("Answer briefly."))
        )
    );
    assert_eq!(fx.vcs.messages().len(), 2);
}

#[test]
fn save_as_onto_an_existing_session_fails_before_the_request() {
    let fx = Fixture::new();
    fx.sessions.create("answers", None).expect("create");
    let provider = MockProvider::new();

    let error = fx
        .asker(&provider)
        .ask(
            &AskRequest {
                temp: true,
                save_as: Some("answers".to_string()),
                ..stdin_request("q")
            },
            &mut no_emit,
        )
        .expect_err("ask must fail");

    assert!(matches!(error, AskError::Store(StoreError::SessionExists { .. })));
    assert_eq!(provider.call_count(), 0);
}

#[test]
fn save_as_on_an_appending_run_is_rejected() {
    let fx = Fixture::new();
    fx.sessions.create("work", None).expect("create");
    let before = fx.sessions.read_full("work").expect("read");
    let provider = MockProvider::new();

    for request in [
        AskRequest {
            session: Some("work".to_string()),
            save_as: Some("copy".to_string()),
            ..AskRequest::default()
        },
        AskRequest {
            session: Some("work".to_string()),
            save_as: Some("copy".to_string()),
            ..stdin_request("q")
        },
    ] {
        let error = fx
            .asker(&provider)
            .ask(&request, &mut no_emit)
            .expect_err("ask must fail");
        assert!(matches!(error, AskError::SaveAsWithoutScratch));
    }

    assert_eq!(provider.call_count(), 0);
    assert!(!fx.sessions.exists("copy").expect("exists"));
    assert_eq!(fx.sessions.read_full("work").expect("read"), before);
}

#[test]
fn completion_failure_changes_nothing() {
    let fx = Fixture::new();
    fx.sessions.create("work", None).expect("create");
    let before = fx.sessions.read_full("work").expect("read");
    let provider = MockProvider::scripted([MockOutcome::Failure(CompletionError::Configuration(
        "Missing API_KEY".to_string(),
    ))]);

    let error = fx
        .asker(&provider)
        .ask(
            &AskRequest {
                session: Some("work".to_string()),
                ..AskRequest::default()
            },
            &mut no_emit,
        )
        .expect_err("ask must fail");

    assert!(matches!(
        error,
        AskError::Completion(CompletionError::Configuration(_))
    ));
    assert_eq!(fx.sessions.read_full("work").expect("read"), before);
}

#[test]
fn streamed_fragments_reach_the_sink_and_equal_the_reply() {
    let fx = Fixture::new();
    let provider = MockProvider::scripted([MockOutcome::chunks(&["He", "llo"])]);
    let mut seen = Vec::new();

    let report = fx
        .asker(&provider)
        .ask(
            &AskRequest {
                mode: ResponseMode::Streaming,
                ..stdin_request("q")
            },
            &mut |chunk| seen.push(chunk.to_string()),
        )
        .expect("ask should succeed");

    assert_eq!(seen, vec!["He", "llo"]);
    assert_eq!(report.reply, seen.concat());
}

#[test]
fn instruction_resolution_order() {
    let fx = Fixture::new();
    let provider = MockProvider::new();
    let asker = fx.asker(&provider);

    assert_eq!(
        asker
            .resolve_instruction(&InstructionChoice::Default)
            .expect("resolve"),
        None
    );

    fx.instruction("stored", "from store");
    fx.instruction("fallback", "from default");
    fx.instructions.set_default("fallback").expect("set default");

    assert_eq!(
        asker
            .resolve_instruction(&InstructionChoice::Named("stored".to_string()))
            .expect("resolve")
            .as_deref(),
        Some("from store")
    );
    assert_eq!(
        asker
            .resolve_instruction(&InstructionChoice::Text("raw".to_string()))
            .expect("resolve")
            .as_deref(),
        Some("raw")
    );
    assert_eq!(
        asker
            .resolve_instruction(&InstructionChoice::Default)
            .expect("resolve")
            .as_deref(),
        Some("from default")
    );
}

#[test]
fn default_instruction_becomes_the_system_message() {
    let fx = Fixture::new();
    fx.instruction("terse", "Be terse.");
    fx.instructions.set_default("terse").expect("set default");
    let provider = MockProvider::scripted([MockOutcome::reply("ok")]);

    fx.asker(&provider)
        .ask(&stdin_request("q"), &mut no_emit)
        .expect("ask should succeed");

    assert_eq!(
        provider.requests()[0].messages,
        vec![ChatMessage::system("Be terse."), ChatMessage::user("q")]
    );
}

#[test]
fn stale_default_instruction_fails_with_not_found() {
    let fx = Fixture::new();
    fx.instruction("gone", "x");
    fx.instructions.set_default("gone").expect("set default");
    fx.instructions.delete("gone").expect("delete");
    let provider = MockProvider::new();

    let error = fx
        .asker(&provider)
        .ask(&stdin_request("q"), &mut no_emit)
        .expect_err("ask must fail");

    assert!(matches!(
        error,
        AskError::Store(StoreError::InstructionNotFound { ref name }) if name == "gone"
    ));
    assert_eq!(provider.call_count(), 0);
}
