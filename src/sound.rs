//! Sound cues played on send and receive.

use std::fmt;

use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SoundCue {
    /// A local message went out.
    Send,
    /// A remote message arrived.
    Receive,
}

impl fmt::Display for SoundCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => f.write_str("send"),
            Self::Receive => f.write_str("receive"),
        }
    }
}

/// Plays a cue. Implementations must not block.
pub trait SoundPlayer: Send + Sync {
    fn play(&self, cue: SoundCue);
}

/// Maps cues to the configured audio assets.
///
/// Without an audio device this only traces the asset that would play;
/// hosts with one wrap it in their own [`SoundPlayer`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AudioCues {
    pub send_url: Option<String>,
    pub receive_url: Option<String>,
}

impl AudioCues {
    #[must_use]
    pub fn new(send_url: Option<String>, receive_url: Option<String>) -> Self {
        Self { send_url, receive_url }
    }

    #[must_use]
    pub fn url(&self, cue: SoundCue) -> Option<&str> {
        match cue {
            SoundCue::Send => self.send_url.as_deref(),
            SoundCue::Receive => self.receive_url.as_deref(),
        }
    }
}

impl SoundPlayer for AudioCues {
    fn play(&self, cue: SoundCue) {
        match self.url(cue) {
            Some(url) => debug!(%cue, %url, "sound: play"),
            None => debug!(%cue, "sound: no asset configured"),
        }
    }
}

#[cfg(test)]
#[path = "sound_test.rs"]
mod tests;
