//! Listener registry and inbound event queue for one channel.
//!
//! DESIGN
//! ======
//! A channel has two halves. Consumers hold a cloneable [`ConnectionHandle`]
//! and receive events through a [`Subscription`], a FIFO queue of tagged
//! [`ChannelEvent`]s that the owner drains in order. The transport holds the
//! [`ChannelDriver`], which fans inbound events out to every attached
//! subscription and yields the frames consumers emit.
//!
//! A subscription is the whole listener set of one consumer: attaching it
//! registers every event kind at once, and detaching (explicitly or on drop)
//! removes all of them. The driver only holds a weak reference, so the
//! channel shuts down once the last handle is gone. Dropping the driver
//! marks the channel closed; handles outlive it but can no longer send.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use frames::{Frame, USER_MESSAGE};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::debug;

use crate::fault::FaultKind;

/// Inbound event, in the order the channel delivered it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The remote agent sent a message.
    MessageReceived(String),
    /// The remote agent started typing.
    TypingSignaled,
    /// The channel hit a lifecycle fault.
    FaultOccurred(FaultKind),
}

/// Identifier of one attached subscription.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

type Listeners = HashMap<ListenerId, mpsc::UnboundedSender<ChannelEvent>>;

struct Shared {
    endpoint: String,
    listeners: Mutex<Listeners>,
    next_id: AtomicU64,
    closed: AtomicBool,
    outbound: mpsc::UnboundedSender<Frame>,
}

impl Shared {
    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Consumer-side handle to a single channel. Clones share the channel.
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("endpoint", &self.shared.endpoint)
            .field("listeners", &self.active_listeners())
            .finish()
    }
}

impl ConnectionHandle {
    /// Build both halves of a channel.
    ///
    /// The websocket transport drives the returned [`ChannelDriver`]; tests
    /// drive it directly as a fake channel.
    #[must_use]
    pub fn pair(endpoint: impl Into<String>) -> (Self, ChannelDriver) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            endpoint: endpoint.into(),
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            outbound: outbound_tx,
        });
        let driver = ChannelDriver { shared: Arc::downgrade(&shared), outbound: outbound_rx };
        (Self { shared }, driver)
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    /// Attach a new listener set.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let id = ListenerId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.listeners().insert(id, tx);
        debug!(endpoint = %self.shared.endpoint, %id, "channel: listener attached");
        Subscription { id, rx, shared: Arc::downgrade(&self.shared), attached: true }
    }

    /// Queue a frame for the transport. Fire-and-forget: returns `false`
    /// only when the transport has already shut down.
    pub fn emit(&self, frame: Frame) -> bool {
        self.shared.outbound.send(frame).is_ok()
    }

    /// Emit a `user-message` event carrying `text`.
    pub fn send_message(&self, text: &str) -> bool {
        self.emit(Frame::text(USER_MESSAGE, text))
    }

    #[must_use]
    pub fn active_listeners(&self) -> usize {
        self.shared.listeners().len()
    }

    /// True once the transport behind this channel has stopped for good.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Whether both handles refer to the same channel.
    #[must_use]
    pub fn same_channel(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// One consumer's listener set and its inbound queue.
pub struct Subscription {
    id: ListenerId,
    rx: mpsc::UnboundedReceiver<ChannelEvent>,
    shared: Weak<Shared>,
    attached: bool,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Wait for the next event. Returns `None` once detached or once the
    /// channel is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        if !self.attached {
            return None;
        }
        self.rx.recv().await
    }

    /// Next queued event without waiting. A channel that is gone leaves the
    /// subscription detached.
    pub fn try_recv(&mut self) -> Option<ChannelEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.attached = false;
                None
            }
        }
    }

    /// Remove this listener set from the channel and discard anything still
    /// queued. Idempotent.
    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        if let Some(shared) = self.shared.upgrade() {
            shared.listeners().remove(&self.id);
            debug!(endpoint = %shared.endpoint, id = %self.id, "channel: listener detached");
        }
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

// =============================================================================
// DRIVER
// =============================================================================

/// Transport-side half of a channel.
pub struct ChannelDriver {
    shared: Weak<Shared>,
    outbound: mpsc::UnboundedReceiver<Frame>,
}

impl ChannelDriver {
    /// Deliver an event to every attached listener, returning how many
    /// received it.
    pub fn deliver(&self, event: ChannelEvent) -> usize {
        let Some(shared) = self.shared.upgrade() else {
            return 0;
        };
        let mut listeners = shared.listeners();
        listeners.retain(|_, tx| tx.send(event.clone()).is_ok());
        listeners.len()
    }

    /// Next frame emitted by a consumer. Returns `None` once every handle
    /// has been dropped.
    pub async fn next_outbound(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }

    /// Next emitted frame without waiting.
    pub fn try_next_outbound(&mut self) -> Option<Frame> {
        match self.outbound.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                debug!("channel: every handle dropped");
                None
            }
        }
    }

    /// True once every [`ConnectionHandle`] is gone.
    #[must_use]
    pub fn is_orphaned(&self) -> bool {
        self.shared.strong_count() == 0
    }

    #[must_use]
    pub fn active_listeners(&self) -> usize {
        self.shared.upgrade().map_or(0, |shared| shared.listeners().len())
    }
}

impl Drop for ChannelDriver {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.closed.store(true, Ordering::Release);
            debug!(endpoint = %shared.endpoint, "channel: closed");
        }
    }
}

#[cfg(test)]
#[path = "channel_test.rs"]
mod tests;
