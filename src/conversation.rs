//! Conversation state: the append-only message log plus derived UI flags.
//!
//! DESIGN
//! ======
//! The log is an `Arc<[Message]>`. Every append builds a fresh sequence
//! and swaps it in; a snapshot taken before the append keeps pointing at
//! the superseded log, which is never touched again.

use std::sync::Arc;

use crate::fault::FaultKind;
use crate::message::Message;

/// Banner shown once the channel faults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionFault {
    pub kind: FaultKind,
    pub text: String,
}

/// Single source of truth for what is rendered.
#[derive(Clone, Debug)]
pub struct ConversationState {
    messages: Arc<[Message]>,
    typing_indicator_visible: bool,
    connection_error: Option<ConnectionFault>,
}

impl ConversationState {
    /// State with the greeting as the only message, authored remotely.
    #[must_use]
    pub fn new(greeting: impl Into<String>) -> Self {
        Self::from_messages(vec![Message::remote(greeting)])
    }

    #[must_use]
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages: messages.into(), typing_indicator_visible: false, connection_error: None }
    }

    /// Append a message written by the local user.
    pub fn append_local(&mut self, text: impl Into<String>) -> Message {
        let message = Message::local(text);
        self.push(message.clone());
        message
    }

    /// Append a message from the remote agent; always hides the typing indicator.
    pub fn append_remote(&mut self, text: impl Into<String>) -> Message {
        let message = Message::remote(text);
        self.push(message.clone());
        self.typing_indicator_visible = false;
        message
    }

    /// Show or hide the typing indicator.
    ///
    /// There is no inactivity timeout: once shown, only the next remote
    /// message hides it again.
    pub fn set_typing(&mut self, visible: bool) {
        self.typing_indicator_visible = visible;
    }

    /// Record a channel fault. The first fault wins and stays for the
    /// lifetime of the state; returns `false` when a banner was already set.
    pub fn set_connection_fault(&mut self, kind: FaultKind) -> bool {
        if self.connection_error.is_some() {
            return false;
        }
        self.connection_error = Some(ConnectionFault { kind, text: kind.message().to_owned() });
        true
    }

    /// Current log. Cheap to clone; later appends never alter it.
    #[must_use]
    pub fn snapshot(&self) -> Arc<[Message]> {
        Arc::clone(&self.messages)
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[must_use]
    pub fn typing_indicator_visible(&self) -> bool {
        self.typing_indicator_visible
    }

    #[must_use]
    pub fn connection_error(&self) -> Option<&ConnectionFault> {
        self.connection_error.as_ref()
    }

    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.connection_error.is_some()
    }

    fn push(&mut self, message: Message) {
        let next: Arc<[Message]> = self.messages.iter().cloned().chain(std::iter::once(message)).collect();
        self.messages = next;
    }
}

#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;
