use serde::{Deserialize, Serialize};

/// Who wrote a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Author {
    /// The end user of the widget.
    #[serde(rename = "me")]
    Local,
    /// The automated counterpart on the other end of the channel.
    #[serde(rename = "bot")]
    Remote,
}

/// A single entry in the conversation log. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub author: Author,
}

impl Message {
    #[must_use]
    pub fn local(text: impl Into<String>) -> Self {
        Self { text: text.into(), author: Author::Local }
    }

    #[must_use]
    pub fn remote(text: impl Into<String>) -> Self {
        Self { text: text.into(), author: Author::Remote }
    }
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
