//! Channel lifecycle faults and the text shown for each.

use std::fmt;

/// Any channel-lifecycle error condition.
///
/// All kinds are terminal for the session from the user's point of view;
/// they differ only in the banner text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The initial connection attempt failed.
    ConnectError,
    /// An established connection dropped.
    Disconnect,
    /// A reconnection attempt failed.
    ReconnectError,
    /// The channel reported a generic error.
    ChannelError,
    /// The initial connection attempt did not finish in time.
    ConnectTimeout,
}

/// Event name, kind and banner text for every fault.
static FAULTS: [(&str, FaultKind, &str); 5] = [
    ("connect_error", FaultKind::ConnectError, "There was an error connecting."),
    ("disconnect", FaultKind::Disconnect, "There was an error. Disconnected from Botty."),
    ("reconnect_error", FaultKind::ReconnectError, "There was an error reconnecting."),
    ("error", FaultKind::ChannelError, "There was an error. Please refresh and try again."),
    ("connect_timeout", FaultKind::ConnectTimeout, "There was an error, connection timed out."),
];

impl FaultKind {
    pub const ALL: [FaultKind; 5] = [
        Self::ConnectError,
        Self::Disconnect,
        Self::ReconnectError,
        Self::ChannelError,
        Self::ConnectTimeout,
    ];

    /// Lifecycle event name this fault is reported under.
    #[must_use]
    pub fn event_name(self) -> &'static str {
        entry(self).0
    }

    /// User-facing banner text.
    #[must_use]
    pub fn message(self) -> &'static str {
        entry(self).2
    }

    #[must_use]
    pub fn from_event_name(name: &str) -> Option<Self> {
        FAULTS.iter().find(|(event, _, _)| *event == name).map(|(_, kind, _)| *kind)
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

fn entry(kind: FaultKind) -> &'static (&'static str, FaultKind, &'static str) {
    // Every variant has exactly one row; the index mirrors `ALL`.
    let index = match kind {
        FaultKind::ConnectError => 0,
        FaultKind::Disconnect => 1,
        FaultKind::ReconnectError => 2,
        FaultKind::ChannelError => 3,
        FaultKind::ConnectTimeout => 4,
    };
    &FAULTS[index]
}

#[cfg(test)]
#[path = "fault_test.rs"]
mod tests;
