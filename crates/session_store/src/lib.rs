//! File-backed stores for chat sessions and instruction templates.
//!
//! Sessions are markdown files under `<home>/chats`, each mutation followed by
//! a version-history commit of that directory. Instructions are plain text
//! files under `<home>/insn`. Each store tracks one default name in a small
//! pointer file that is re-validated by readers rather than trusted.

mod error;
mod instructions;
mod paths;
mod pointer;
mod schema;
mod store;
mod vcs;

pub use error::StoreError;
pub use instructions::InstructionStore;
pub use paths::{
    entry_file_name, instruction_pointer_path, instruction_root, session_pointer_path,
    session_root, validate_name,
};
pub use pointer::DefaultPointer;
pub use schema::{
    render_assistant_section, render_exchange, render_scratch, render_template,
    render_user_section, Exchange, ASSISTANT_HEADING, REPLY_FENCE_CLOSE, REPLY_FENCE_OPEN,
    TEMP_SESSION_TITLE, USER_HEADING,
};
pub use store::SessionStore;
pub use vcs::{
    commit_message, CommitStatus, GitCli, NoVersionControl, RecordingVersionControl,
    VersionControl,
};
