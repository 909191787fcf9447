//! Chat session: the owner of one conversation bound to one channel.
//!
//! DESIGN
//! ======
//! A session is mounted onto an injected [`ConnectionHandle`] and attaches
//! exactly one listener set for its lifetime. Inbound events are applied in
//! the order the channel delivered them, either one at a time via
//! [`ChatSession::next_event`] + [`ChatSession::apply`] or in bulk via
//! [`ChatSession::pump`]. Tearing the session down (or dropping it) detaches
//! the listener set; the shared channel itself stays up for other holders.
//!
//! SEND ORDER
//! ==========
//! A local message is appended before the outbound emit, so the log never
//! lags behind what was sent. The latest-message notifier and the send cue
//! follow the emit.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::channel::{ChannelEvent, ConnectionHandle, Subscription};
use crate::conversation::ConversationState;
use crate::fault::FaultKind;
use crate::message::Message;
use crate::notify::LatestMessages;
use crate::render::{self, View};
use crate::sound::{SoundCue, SoundPlayer};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChatError {
    /// The composer is gone once a fault is shown; nothing can be sent.
    #[error("composer hidden after channel fault: {0}")]
    ComposerHidden(FaultKind),
}

pub struct ChatSession {
    handle: ConnectionHandle,
    subscription: Subscription,
    state: ConversationState,
    composer: String,
    latest: LatestMessages,
    sounds: Arc<dyn SoundPlayer>,
    scroll_requested: bool,
}

impl ChatSession {
    /// Attach to the channel and seed the conversation with the greeting.
    #[must_use]
    pub fn mount(
        handle: ConnectionHandle,
        greeting: impl Into<String>,
        latest: LatestMessages,
        sounds: Arc<dyn SoundPlayer>,
    ) -> Self {
        let subscription = handle.subscribe();
        info!(endpoint = %handle.endpoint(), listener = %subscription.id(), "session: mounted");
        Self {
            handle,
            subscription,
            state: ConversationState::new(greeting),
            composer: String::new(),
            latest,
            sounds,
            scroll_requested: true,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    #[must_use]
    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    #[must_use]
    pub fn composer_text(&self) -> &str {
        &self.composer
    }

    pub fn set_composer_text(&mut self, text: impl Into<String>) {
        self.composer = text.into();
    }

    /// Send whatever is in the composer and clear it.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ComposerHidden`] once the channel has faulted;
    /// the composer text is kept.
    pub fn submit(&mut self) -> Result<Message, ChatError> {
        self.ensure_composer()?;
        let text = std::mem::take(&mut self.composer);
        self.send_message(text)
    }

    /// Append a local message, emit it, and notify.
    ///
    /// Emission is fire-and-forget: a transport that already shut down is
    /// logged, not reported.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ComposerHidden`] once the channel has faulted.
    pub fn send_message(&mut self, text: impl Into<String>) -> Result<Message, ChatError> {
        self.ensure_composer()?;
        let message = self.state.append_local(text);
        self.scroll_requested = true;

        if !self.handle.send_message(&message.text) {
            warn!(endpoint = %self.handle.endpoint(), "session: transport gone, message not sent");
        }
        self.latest.publish(&message.text);
        self.sounds.play(SoundCue::Send);
        Ok(message)
    }

    /// Apply one inbound event to the conversation.
    pub fn apply(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::MessageReceived(text) => {
                debug!(len = text.len(), "session: message received");
                self.sounds.play(SoundCue::Receive);
                self.latest.publish(&text);
                self.state.append_remote(text);
                self.scroll_requested = true;
            }
            ChannelEvent::TypingSignaled => {
                self.state.set_typing(true);
            }
            ChannelEvent::FaultOccurred(kind) => {
                if self.state.set_connection_fault(kind) {
                    warn!(fault = %kind, "session: channel fault");
                } else {
                    debug!(fault = %kind, "session: fault ignored, banner already shown");
                }
            }
        }
    }

    /// Wait for the next inbound event. `None` once the channel is gone.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.subscription.recv().await
    }

    /// Apply every event already queued, in order. Returns how many ran.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.subscription.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    #[must_use]
    pub fn render(&self) -> View {
        render::render(&self.state, &self.composer)
    }

    /// Whether the view should scroll to the newest element. Set on mount
    /// and after every append; reading it clears it.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_requested)
    }

    /// Detach this session's listeners. The shared channel stays up.
    pub fn teardown(mut self) {
        self.subscription.detach();
        info!(endpoint = %self.handle.endpoint(), "session: torn down");
    }

    fn ensure_composer(&self) -> Result<(), ChatError> {
        match self.state.connection_error() {
            Some(fault) => Err(ChatError::ComposerHidden(fault.kind)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
