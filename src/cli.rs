//! Command-line surface and dispatch.
//!
//! Data (listings, session text, replies) goes to `out`; status notices go
//! to stderr so `ag cat NAME | less` and `ag ask ... > file` stay clean.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _, Result};
use chat_provider::ResponseMode;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use session_store::{CommitStatus, GitCli, InstructionStore, SessionStore, StoreError};

use crate::app::{Repl, SaveOutcome};
use crate::ask::{resolve_instruction, AskError, AskOutcome, AskRequest, Asker, InstructionChoice};
use crate::collaborators::{
    EditOutcome, Editor, ExternalEditor, ExternalSelector, Selection, Selector,
};
use crate::commands::HELP_TEXT;
use crate::config::EnvConfig;
use crate::providers::provider_from_config;
use crate::terminal::TerminalIo;

const SESSION_SELECT_PROMPT: &str = "Select chat> ";
const INSTRUCTION_SELECT_PROMPT: &str = "Select instruction> ";

#[derive(Parser, Debug)]
#[command(
    name = "ag",
    version,
    about = "File-backed chat sessions for a chat-completion service",
    arg_required_else_help = true,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new session
    New {
        name: String,
        /// Instruction text written into the session header
        #[arg(short = 'i', long = "instruction", value_name = "TEXT")]
        instruction: Option<String>,
    },
    /// Rename a session
    Mv { old: String, new: String },
    /// Delete a session
    Rm { name: String },
    /// List sessions, marking the default with `*`
    Ls,
    /// Switch the default session; picks with the selector when NAME is omitted
    Sw { name: Option<String> },
    /// Print a session file
    Cat { name: String },
    /// Open a session file in $EDITOR
    Edit { name: String },
    /// Send a session (or stdin) to the model
    ///
    /// Examples:
    ///   ag ask work --stream
    ///   echo "question" | ag ask --stdin --temp --save-as answers
    Ask(AskArgs),
    /// Interactive chat; offers to save the conversation when it ends
    Chat(ChatArgs),
    /// Print the default session
    Current,
    /// Manage stored instructions (system prompts)
    #[command(subcommand)]
    Insn(InsnCommand),
}

#[derive(Args, Debug, Default, Clone)]
pub struct InstructionArgs {
    /// Stored instruction to send as the system prompt
    #[arg(long, value_name = "NAME", conflicts_with = "system")]
    pub insn: Option<String>,
    /// Raw system prompt text
    #[arg(long, value_name = "TEXT")]
    pub system: Option<String>,
}

impl InstructionArgs {
    pub fn choice(&self) -> InstructionChoice {
        match (&self.insn, &self.system) {
            (Some(name), _) => InstructionChoice::Named(name.clone()),
            (None, Some(text)) => InstructionChoice::Text(text.clone()),
            (None, None) => InstructionChoice::Default,
        }
    }
}

#[derive(Args, Debug, Default, Clone)]
pub struct AskArgs {
    /// Session to send; defaults to the current session
    pub name: Option<String>,
    /// Read the prompt from stdin instead of the session file
    #[arg(long)]
    pub stdin: bool,
    /// Work on a temporary copy; stored sessions are left untouched
    #[arg(long)]
    pub temp: bool,
    /// Save a temporary exchange into this new session (with --temp, or --stdin without NAME)
    #[arg(long = "save-as", value_name = "NAME")]
    pub save_as: Option<String>,
    /// Print the reply as it arrives
    #[arg(long)]
    pub stream: bool,
    #[command(flatten)]
    pub instruction: InstructionArgs,
}

#[derive(Args, Debug, Default, Clone)]
pub struct ChatArgs {
    /// Print replies as they arrive
    #[arg(long)]
    pub stream: bool,
    #[command(flatten)]
    pub instruction: InstructionArgs,
}

#[derive(Subcommand, Debug)]
pub enum InsnCommand {
    /// List instructions, marking the default with `*`
    Ls,
    /// Create an instruction, optionally copied from FILE
    New {
        name: String,
        #[arg(long, value_name = "FILE")]
        from: Option<PathBuf>,
    },
    /// Delete an instruction
    Rm { name: String },
    /// Switch the default instruction; picks with the selector when NAME is omitted
    Sw { name: Option<String> },
    /// Print an instruction
    Cat { name: String },
    /// Open an instruction in $EDITOR
    Edit { name: String },
    /// Print the default instruction
    Current,
}

/// Stores and collaborators shared by every command.
pub struct Context {
    pub config: EnvConfig,
    pub sessions: SessionStore,
    pub instructions: InstructionStore,
    pub editor: Box<dyn Editor>,
    pub selector: Box<dyn Selector>,
}

impl Context {
    pub fn from_config(config: EnvConfig) -> Self {
        Self {
            sessions: SessionStore::open(&config.home, Arc::new(GitCli::default())),
            instructions: InstructionStore::open(&config.home),
            editor: Box::new(ExternalEditor::from_command_line(&config.editor)),
            selector: Box::new(ExternalSelector::from_command_line(&config.selector)),
            config,
        }
    }
}

pub fn run(command: Command, ctx: &Context, out: &mut dyn Write) -> Result<()> {
    match command {
        Command::New { name, instruction } => {
            let status = ctx.sessions.create(&name, instruction.as_deref())?;
            report_commit(&status);
            success(&format!("New session created: '{name}'"));
        }
        Command::Mv { old, new } => {
            let status = ctx.sessions.rename(&old, &new)?;
            report_commit(&status);
            success(&format!("Session renamed: {old} -> {new}"));
        }
        Command::Rm { name } => {
            let status = ctx.sessions.delete(&name)?;
            report_commit(&status);
            success(&format!("Deleted session: '{name}'"));
        }
        Command::Ls => {
            let names = ctx.sessions.list()?;
            let default = ctx.sessions.default_session()?;
            write_listing(out, &names, default.as_deref())?;
        }
        Command::Sw { name } => switch_session(ctx, name)?,
        Command::Cat { name } => {
            out.write_all(ctx.sessions.show(&name)?.as_bytes())?;
        }
        Command::Edit { name } => {
            if !ctx.sessions.exists(&name)? {
                return Err(StoreError::SessionNotFound { name }.into());
            }
            let path = ctx.sessions.path_for(&name)?;
            if ctx.editor.edit(&path) == EditOutcome::Cancelled {
                cancelled("Edit cancelled");
            }
        }
        Command::Ask(args) => ask(args, ctx, out)?,
        Command::Chat(args) => chat(args, ctx)?,
        Command::Current => {
            let current = ctx.sessions.default_session()?;
            writeln!(out, "{}", current.as_deref().unwrap_or("none"))?;
        }
        Command::Insn(command) => run_insn(command, ctx, out)?,
    }
    Ok(())
}

fn run_insn(command: InsnCommand, ctx: &Context, out: &mut dyn Write) -> Result<()> {
    match command {
        InsnCommand::Ls => {
            let names = ctx.instructions.list()?;
            let default = ctx.instructions.default_instruction()?;
            write_listing(out, &names, default.as_deref())?;
        }
        InsnCommand::New { name, from } => {
            ctx.instructions.create(&name, from.as_deref())?;
            success(&format!("New instruction created: '{name}'"));
        }
        InsnCommand::Rm { name } => {
            ctx.instructions.delete(&name)?;
            success(&format!("Deleted instruction: '{name}'"));
        }
        InsnCommand::Sw { name } => {
            let name = match name {
                Some(name) => name,
                None => {
                    let names = ctx.instructions.list()?;
                    let choice = pick(
                        ctx.selector.as_ref(),
                        INSTRUCTION_SELECT_PROMPT,
                        &names,
                        "instructions",
                    )?;
                    match choice {
                        Some(choice) => choice,
                        None => return Ok(()),
                    }
                }
            };
            ctx.instructions.set_default(&name)?;
            success(&format!("Switched default instruction to '{name}'"));
        }
        InsnCommand::Cat { name } => {
            let text = ctx.instructions.read(&name)?;
            out.write_all(text.as_bytes())?;
            if !text.ends_with('\n') {
                writeln!(out)?;
            }
        }
        InsnCommand::Edit { name } => {
            ctx.instructions.read(&name)?;
            let path = ctx.instructions.path_for(&name)?;
            if ctx.editor.edit(&path) == EditOutcome::Cancelled {
                cancelled("Edit cancelled");
            }
        }
        InsnCommand::Current => {
            let current = ctx.instructions.default_instruction()?;
            writeln!(out, "{}", current.as_deref().unwrap_or("none"))?;
        }
    }
    Ok(())
}

fn switch_session(ctx: &Context, name: Option<String>) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => {
            let names = ctx.sessions.list()?;
            match pick(ctx.selector.as_ref(), SESSION_SELECT_PROMPT, &names, "sessions")? {
                Some(choice) => choice,
                None => return Ok(()),
            }
        }
    };
    ctx.sessions.set_default(&name)?;
    success(&format!("Switched default session to '{name}'"));
    Ok(())
}

/// `Ok(None)` means the user cancelled; an empty list is an error.
fn pick(
    selector: &dyn Selector,
    prompt: &str,
    names: &[String],
    kind: &str,
) -> Result<Option<String>> {
    if names.is_empty() {
        bail!("No available {kind} found");
    }
    match selector.select(prompt, names) {
        Selection::Chosen(choice) => Ok(Some(choice)),
        Selection::Cancelled => {
            cancelled("Switch cancelled");
            Ok(None)
        }
    }
}

fn ask(args: AskArgs, ctx: &Context, out: &mut dyn Write) -> Result<()> {
    let stdin_prompt = if args.stdin {
        let prompt = read_stdin()?;
        if prompt.trim().is_empty() {
            bail!("No prompt received on stdin");
        }
        Some(prompt)
    } else {
        None
    };

    let provider = provider_from_config(&ctx.config)?;
    let asker = Asker::new(
        &ctx.sessions,
        &ctx.instructions,
        provider.as_ref(),
        ctx.config.timeout,
    );
    let request = AskRequest {
        session: args.name,
        stdin_prompt,
        temp: args.temp,
        save_as: args.save_as,
        mode: ResponseMode::from_flag(args.stream),
        instruction: args.instruction.choice(),
    };

    status("Processing...");
    let mut sink_error: Option<io::Error> = None;
    let report = asker
        .ask(&request, &mut |chunk| {
            if sink_error.is_some() {
                return;
            }
            if let Err(error) = out.write_all(chunk.as_bytes()).and_then(|()| out.flush()) {
                tracing::debug!(%error, "stopped echoing the streamed reply");
                sink_error = Some(error);
            }
        })
        .map_err(|error| match error {
            AskError::Completion(error) => anyhow!("Failed to fetch reply: {error}"),
            other => other.into(),
        })?;

    // The outcome is already applied, so report it even when stdout is gone.
    let printed = match sink_error {
        Some(error) => Err(error),
        None if request.mode.is_streaming() => writeln!(out),
        None => writeln!(out, "{}", report.reply),
    };

    match report.outcome {
        AskOutcome::Discarded => cancelled("Temporary conversation discarded"),
        AskOutcome::SavedAs { name, commit } => {
            report_commit(&commit);
            success(&format!("Saved to session '{name}'"));
        }
        AskOutcome::Appended { name, commit } => {
            report_commit(&commit);
            tracing::debug!(session = %name, "reply appended");
        }
    }
    printed.context("failed to write reply to stdout")
}

fn chat(args: ChatArgs, ctx: &Context) -> Result<()> {
    let instruction = resolve_instruction(&ctx.instructions, &args.instruction.choice())?;
    let provider = provider_from_config(&ctx.config)?;
    let mut terminal =
        TerminalIo::new().map_err(|error| anyhow!("failed to open the terminal: {error}"))?;

    let mut repl = Repl::new(
        instruction,
        ResponseMode::from_flag(args.stream),
        ctx.config.timeout,
    );
    status(HELP_TEXT);
    repl.run(provider.as_ref(), &mut terminal);

    match repl.finish(&ctx.sessions, &mut terminal)? {
        SaveOutcome::NothingToSave => {}
        SaveOutcome::Discarded => cancelled("Conversation discarded"),
        SaveOutcome::Saved { name } => success(&format!("Saved to session '{name}'")),
    }
    Ok(())
}

fn write_listing(out: &mut dyn Write, names: &[String], default: Option<&str>) -> io::Result<()> {
    for name in names {
        let prefix = if Some(name.as_str()) == default { "* " } else { "  " };
        writeln!(out, "{prefix}{name}")?;
    }
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("failed to read prompt from stdin")?;
    Ok(buffer)
}

fn report_commit(status: &CommitStatus) {
    if let Some(warning) = status.warning() {
        eprintln!(
            "{}",
            format!("Warning: version history not updated: {warning}").yellow()
        );
    }
}

fn status(message: &str) {
    eprintln!("{}", message.bright_black());
}

fn success(message: &str) {
    eprintln!("{}", message.green());
}

fn cancelled(message: &str) {
    eprintln!("{}", message.yellow());
}
