use std::fs;
use std::io;
use std::sync::{Arc, Mutex};

use session_store::{
    render_template, CommitStatus, Exchange, NoVersionControl, RecordingVersionControl,
    SessionStore, StoreError,
};
use tempfile::TempDir;

fn store_with_recorder() -> (TempDir, SessionStore, Arc<RecordingVersionControl>) {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let vcs = Arc::new(RecordingVersionControl::default());
    let store = SessionStore::open(dir.path(), vcs.clone());
    (dir, store, vcs)
}

fn plain_store() -> (TempDir, SessionStore) {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let store = SessionStore::open(dir.path(), Arc::new(NoVersionControl));
    (dir, store)
}

#[test]
fn create_writes_template_exactly_once() {
    let (_dir, store) = plain_store();
    store.create("work", None).expect("create should succeed");

    let content = store.show("work").expect("show should succeed");
    assert_eq!(content, render_template("work", None));
    assert_eq!(
        content,
        "# Chat: work\n\n## Instructions:\n\n\n## Conversation\n"
    );
    assert_eq!(content.matches("# Chat: work").count(), 1);
    assert_eq!(store.read_full("work").expect("read should succeed"), content);
}

#[test]
fn create_twice_fails_with_already_exists_and_keeps_content() {
    let (_dir, store) = plain_store();
    store
        .create("work", Some("be terse"))
        .expect("create should succeed");

    let error = store
        .create("work", None)
        .expect_err("second create must fail");
    assert!(matches!(error, StoreError::SessionExists { ref name } if name == "work"));
    assert!(error.is_already_exists());
    assert!(store
        .show("work")
        .expect("show should succeed")
        .contains("## Instructions:\nbe terse\n"));
}

#[test]
fn delete_then_read_and_delete_again_fail_with_not_found() {
    let (_dir, store) = plain_store();
    store.create("work", None).expect("create should succeed");
    store.delete("work").expect("delete should succeed");

    assert!(matches!(
        store.read_full("work"),
        Err(StoreError::SessionNotFound { .. })
    ));
    assert!(matches!(
        store.delete("work"),
        Err(StoreError::SessionNotFound { .. })
    ));
}

#[test]
fn rename_moves_content_and_old_name_disappears() {
    let (_dir, store) = plain_store();
    store.create("draft", Some("rules")).expect("create should succeed");
    store
        .append_exchange("draft", "q", "a")
        .expect("append should succeed");
    let before = store.show("draft").expect("show should succeed");

    store.rename("draft", "final").expect("rename should succeed");

    assert!(store.show("draft").expect_err("old name must be gone").is_not_found());
    assert_eq!(store.show("final").expect("new name should exist"), before);
}

#[test]
fn rename_onto_existing_name_fails_and_leaves_both_files() {
    let (_dir, store) = plain_store();
    store.create("a", Some("first")).expect("create a");
    store.create("b", Some("second")).expect("create b");
    let a_before = store.show("a").expect("show a");
    let b_before = store.show("b").expect("show b");

    let error = store.rename("a", "b").expect_err("rename must fail");
    assert!(matches!(error, StoreError::SessionExists { ref name } if name == "b"));
    assert_eq!(store.show("a").expect("show a"), a_before);
    assert_eq!(store.show("b").expect("show b"), b_before);
}

#[test]
fn rename_missing_source_fails_with_not_found() {
    let (_dir, store) = plain_store();
    let error = store.rename("ghost", "b").expect_err("rename must fail");
    assert!(matches!(error, StoreError::SessionNotFound { ref name } if name == "ghost"));
}

#[test]
fn appended_exchanges_appear_in_order_with_reply_fences() {
    let (_dir, store) = plain_store();
    store.create("work", None).expect("create should succeed");

    let turns = [
        ("first question", "first answer"),
        ("second question", "second answer"),
        ("third question", "third answer"),
    ];
    for (user, reply) in turns {
        store
            .append_exchange("work", user, reply)
            .expect("append should succeed");
    }

    let content = store.show("work").expect("show should succeed");
    let mut cursor = 0;
    for (user, reply) in turns {
        let user_at = content[cursor..]
            .find(&format!("### User\n{user}\n"))
            .expect("user text should follow previous turn")
            + cursor;
        let reply_block = format!("### Assistant\n```reply\n{reply}\n```\n");
        let reply_at = content[user_at..]
            .find(&reply_block)
            .expect("reply block should follow its user text")
            + user_at;
        cursor = reply_at + reply_block.len();
    }
    assert_eq!(cursor, content.len());
}

#[test]
fn append_reply_adds_only_assistant_section() {
    let (_dir, store) = plain_store();
    store.create("work", None).expect("create should succeed");
    store
        .append_reply("work", "  answer  \n")
        .expect("append should succeed");

    let content = store.show("work").expect("show should succeed");
    assert!(!content.contains("### User"));
    assert!(content.ends_with("\n### Assistant\n```reply\nanswer\n```\n"));
}

#[test]
fn appends_to_missing_session_fail_with_not_found() {
    let (dir, store) = plain_store();
    assert!(store
        .append_reply("ghost", "x")
        .expect_err("append must fail")
        .is_not_found());
    assert!(store
        .append_exchange("ghost", "q", "a")
        .expect_err("append must fail")
        .is_not_found());
    assert!(!dir.path().join("chats").join("ghost.md").exists());
}

#[test]
fn append_exchanges_writes_batch_with_single_commit() {
    let (_dir, store, vcs) = store_with_recorder();
    store.create("saved", None).expect("create should succeed");

    store
        .append_exchanges(
            "saved",
            &[Exchange::new("one", "uno"), Exchange::new("two", "dos")],
        )
        .expect("batch append should succeed");

    let content = store.show("saved").expect("show should succeed");
    assert!(content.find("uno").expect("uno") < content.find("two").expect("two"));
    assert_eq!(vcs.messages().len(), 2);
}

#[test]
fn every_mutation_commits_with_session_name() {
    let (_dir, store, vcs) = store_with_recorder();
    store.create("a", None).expect("create");
    store.append_exchange("a", "q", "r").expect("append exchange");
    store.append_reply("a", "r2").expect("append reply");
    store.rename("a", "b").expect("rename");
    store.delete("b").expect("delete");

    let messages = vcs.messages();
    assert_eq!(messages.len(), 5);
    assert!(messages[0].starts_with("a: Q&A @ "));
    assert!(messages[3].starts_with("b: Q&A @ "));
    assert!(messages[4].starts_with("b: Q&A @ "));
}

#[test]
fn failed_operations_do_not_commit() {
    let (_dir, store, vcs) = store_with_recorder();
    store.create("a", None).expect("create");
    let _ = store.create("a", None);
    let _ = store.delete("ghost");
    let _ = store.append_reply("ghost", "x");

    assert_eq!(vcs.messages().len(), 1);
}

#[test]
fn commit_failure_is_a_warning_and_keeps_the_mutation() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let store = SessionStore::open(
        dir.path(),
        Arc::new(RecordingVersionControl::failing("git unavailable")),
    );

    let status = store.create("work", None).expect("create must still succeed");
    assert_eq!(status, CommitStatus::Warning("git unavailable".to_string()));
    assert_eq!(status.warning(), Some("git unavailable"));

    let status = store
        .append_exchange("work", "q", "a")
        .expect("append must still succeed");
    assert!(status.warning().is_some());
    assert!(store.show("work").expect("show").contains("```reply\na\n```"));
}

#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn commit_failure_is_left_to_the_caller_to_report() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let store = SessionStore::open(
        dir.path(),
        Arc::new(RecordingVersionControl::failing("git unavailable")),
    );
    let log = CapturedLog::default();
    let writer = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();

    let status = tracing::subscriber::with_default(subscriber, || store.create("work", None))
        .expect("create must still succeed");

    assert!(status.warning().is_some());
    let logged = String::from_utf8_lossy(&log.0.lock().expect("log buffer lock")).into_owned();
    assert!(logged.is_empty(), "unexpected warn output: {logged}");
}

#[test]
fn list_is_sorted_and_only_includes_markdown_sessions() {
    let (dir, store) = plain_store();
    for name in ["zulu", "alpha", "mike"] {
        store.create(name, None).expect("create should succeed");
    }
    fs::write(dir.path().join("chats").join("notes.txt"), "ignored").expect("write stray file");
    fs::create_dir_all(dir.path().join("chats").join(".git")).expect("create git dir");

    assert_eq!(
        store.list().expect("list should succeed"),
        vec!["alpha".to_string(), "mike".to_string(), "zulu".to_string()]
    );
}

#[test]
fn default_pointer_requires_existing_session_when_set() {
    let (_dir, store) = plain_store();
    assert_eq!(store.default_session().expect("read default"), None);
    assert!(store
        .set_default("ghost")
        .expect_err("unknown session must fail")
        .is_not_found());

    store.create("work", None).expect("create should succeed");
    store.set_default("work").expect("set default should succeed");
    assert_eq!(
        store.default_session().expect("read default").as_deref(),
        Some("work")
    );
}

#[test]
fn stale_default_pointer_is_returned_but_resolution_fails() {
    let (_dir, store) = plain_store();
    store.create("x", None).expect("create should succeed");
    store.set_default("x").expect("set default should succeed");
    store.delete("x").expect("delete should succeed");

    assert_eq!(
        store.default_session().expect("read default").as_deref(),
        Some("x")
    );
    let error = store.resolve(None).expect_err("stale default must not resolve");
    assert!(matches!(error, StoreError::SessionNotFound { ref name } if name == "x"));
}

#[test]
fn resolve_prefers_explicit_name_and_handles_unset_default() {
    let (_dir, store) = plain_store();
    assert_eq!(store.resolve(None).expect("resolve"), None);

    store.create("a", None).expect("create a");
    store.create("b", None).expect("create b");
    store.set_default("a").expect("set default");

    assert_eq!(store.resolve(None).expect("resolve").as_deref(), Some("a"));
    assert_eq!(
        store.resolve(Some("b")).expect("resolve").as_deref(),
        Some("b")
    );
}

#[test]
fn invalid_names_are_rejected_before_touching_disk() {
    let (dir, store) = plain_store();
    let error = store
        .create("../escape", None)
        .expect_err("path traversal must fail");
    assert!(matches!(error, StoreError::InvalidName { .. }));
    assert!(!dir.path().join("escape.md").exists());
}
