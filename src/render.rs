//! Render projection: conversation state in, display tree out.
//!
//! [`render`] is a pure function of its inputs and is recomputed after every
//! state change. Each row carries the message after it so row renderers can
//! group consecutive messages from the same author.

use crate::conversation::ConversationState;
use crate::message::{Author, Message};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageRow {
    pub message: Message,
    /// The message rendered right after this one, if any.
    pub next: Option<Message>,
    /// Whether the remote agent is currently typing.
    pub remote_typing: bool,
}

impl MessageRow {
    /// True when the next message has the same author, so this row's
    /// author header can be folded into the following one.
    #[must_use]
    pub fn continues_with_same_author(&self) -> bool {
        self.next.as_ref().is_some_and(|next| next.author == self.message.author)
    }
}

/// The message-composition control.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposerView {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct View {
    pub rows: Vec<MessageRow>,
    pub typing_indicator: bool,
    pub error_banner: Option<String>,
    /// Absent, not merely disabled, once the channel has faulted.
    pub composer: Option<ComposerView>,
}

#[must_use]
pub fn render(state: &ConversationState, composer_text: &str) -> View {
    let typing = state.typing_indicator_visible();
    let messages = state.messages();
    let rows = messages
        .iter()
        .enumerate()
        .map(|(index, message)| MessageRow {
            message: message.clone(),
            next: messages.get(index + 1).cloned(),
            remote_typing: typing,
        })
        .collect();

    let error_banner = state.connection_error().map(|fault| fault.text.clone());
    let composer = if error_banner.is_some() {
        None
    } else {
        Some(ComposerView { text: composer_text.to_owned() })
    };

    View { rows, typing_indicator: typing, error_banner, composer }
}

/// Plain-text projection of a view for terminal output.
#[must_use]
pub fn render_text(view: &View) -> String {
    let mut out = String::new();
    let mut previous: Option<Author> = None;

    for row in &view.rows {
        if previous != Some(row.message.author) {
            let header = match row.message.author {
                Author::Local => "You",
                Author::Remote => "Botty",
            };
            out.push_str(header);
            out.push_str(":\n");
        }
        out.push_str("  ");
        out.push_str(&row.message.text);
        out.push('\n');
        previous = Some(row.message.author);
    }

    if view.typing_indicator {
        out.push_str("Botty is typing...\n");
    }
    if let Some(banner) = &view.error_banner {
        out.push_str("! ");
        out.push_str(banner);
        out.push('\n');
    }
    if let Some(composer) = &view.composer {
        out.push_str("> ");
        out.push_str(&composer.text);
    }
    out
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
