//! Markdown layout of a session file.
//!
//! ````text
//! # Chat: <name>
//!
//! ## Instructions:
//! <instruction text>
//!
//! ## Conversation
//!
//! ### User
//! <text>
//!
//! ### Assistant
//! ```reply
//! <text>
//! ```
//! ````
//!
//! Every turn section starts with its own blank separator line so appends never
//! need to inspect the existing tail of the file.

pub const USER_HEADING: &str = "### User";
pub const ASSISTANT_HEADING: &str = "### Assistant";
pub const REPLY_FENCE_OPEN: &str = "```reply";
pub const REPLY_FENCE_CLOSE: &str = "```";
pub const TEMP_SESSION_TITLE: &str = "# Temporary session";

/// One recorded user/assistant round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user: String,
    pub reply: String,
}

impl Exchange {
    #[must_use]
    pub fn new(user: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            reply: reply.into(),
        }
    }
}

#[must_use]
pub fn render_template(name: &str, instructions: Option<&str>) -> String {
    let instructions = instructions.map(str::trim).unwrap_or_default();
    format!("# Chat: {name}\n\n## Instructions:\n{instructions}\n\n## Conversation\n")
}

#[must_use]
pub fn render_user_section(text: &str) -> String {
    format!("\n{USER_HEADING}\n{}\n", text.trim())
}

#[must_use]
pub fn render_assistant_section(reply: &str) -> String {
    format!(
        "\n{ASSISTANT_HEADING}\n{REPLY_FENCE_OPEN}\n{}\n{REPLY_FENCE_CLOSE}\n",
        reply.trim()
    )
}

#[must_use]
pub fn render_exchange(exchange: &Exchange) -> String {
    let mut out = render_user_section(&exchange.user);
    out.push_str(&render_assistant_section(&exchange.reply));
    out
}

/// Body of the scratch file used by ephemeral asks.
#[must_use]
pub fn render_scratch(prompt: &str) -> String {
    format!("{TEMP_SESSION_TITLE}\n\n{prompt}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_has_empty_instructions_by_default() {
        assert_eq!(
            render_template("work", None),
            "# Chat: work\n\n## Instructions:\n\n\n## Conversation\n"
        );
    }

    #[test]
    fn template_trims_instruction_text() {
        let rendered = render_template("work", Some("  be terse \n"));
        assert!(rendered.contains("## Instructions:\nbe terse\n\n## Conversation\n"));
    }

    #[test]
    fn exchange_renders_user_then_fenced_reply() {
        let rendered = render_exchange(&Exchange::new(" hi \n", "\nhello\n"));
        assert_eq!(
            rendered,
            "\n### User\nhi\n\n### Assistant\n```reply\nhello\n```\n"
        );
    }
}
