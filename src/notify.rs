//! Shared "latest message" notifier.
//!
//! Every appended message, local or remote, is published here so sibling
//! views (launcher preview, unread badge) can show the most recent text
//! without holding the conversation.

use tokio::sync::watch;

/// Cloneable publisher of the most recent message text.
#[derive(Clone, Debug)]
pub struct LatestMessages {
    tx: watch::Sender<Option<String>>,
}

impl Default for LatestMessages {
    fn default() -> Self {
        Self::new()
    }
}

impl LatestMessages {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Publish new text, replacing the previous value. Works with or
    /// without subscribers.
    pub fn publish(&self, text: &str) {
        self.tx.send_replace(Some(text.to_owned()));
    }

    #[must_use]
    pub fn latest(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
#[path = "notify_test.rs"]
mod tests;
