//! Websocket transport and the connector that shares channels.
//!
//! DESIGN
//! ======
//! [`Connector`] is built once at application start and passed by reference
//! to whoever needs a channel. `connect` returns the existing handle when the
//! same endpoint and transport preferences were requested before, so every
//! consumer of one endpoint shares one socket.
//!
//! LIFECYCLE
//! =========
//! 1. Open the socket within `connect_timeout`
//!    (timeout → `connect_timeout`, failure → `connect_error`)
//! 2. Relay frames both ways until the socket ends
//!    (close → `disconnect`, socket error → `error`)
//! 3. Retry with exponential backoff (each failure → `reconnect_error`);
//!    frames emitted meanwhile stay queued and go out after reconnecting
//! 4. Stop after the last attempt, or as soon as every handle (the
//!    connector's included) is dropped; stopping closes the channel
//!
//! Faults are delivered to listeners as events; nothing here retries on the
//! consumer's behalf beyond step 3.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use frames::{BOT_MESSAGE, BOT_TYPING, Frame};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::runtime;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::channel::{ChannelDriver, ChannelEvent, ConnectionHandle};
use crate::config::{ReconnectPolicy, TransportKind, WidgetConfig, WireEncoding};
use crate::fault::FaultKind;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket error: {0}")]
    Socket(Box<tokio_tungstenite::tungstenite::Error>),
}

impl TransportError {
    /// Fault reported when the initial connection attempt fails this way.
    #[must_use]
    pub fn initial_fault(&self) -> FaultKind {
        match self {
            Self::Timeout(_) => FaultKind::ConnectTimeout,
            Self::Connect(_) | Self::Socket(_) => FaultKind::ConnectError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    pub encoding: WireEncoding,
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl From<&WidgetConfig> for TransportOptions {
    fn from(config: &WidgetConfig) -> Self {
        Self {
            encoding: config.encoding,
            connect_timeout: config.connect_timeout,
            reconnect: config.reconnect,
        }
    }
}

// =============================================================================
// CONNECTOR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ChannelKey {
    endpoint: String,
    transports: Vec<TransportKind>,
}

/// Opens channels and shares them per endpoint and transport preferences.
pub struct Connector {
    runtime: runtime::Handle,
    options: TransportOptions,
    channels: Mutex<HashMap<ChannelKey, ConnectionHandle>>,
}

impl Connector {
    #[must_use]
    pub fn new(runtime: runtime::Handle, options: TransportOptions) -> Self {
        Self { runtime, options, channels: Mutex::new(HashMap::new()) }
    }

    /// Handle to the channel for `endpoint`, opening it on first use or
    /// when the previous transport for it has stopped.
    ///
    /// Never fails synchronously: connection problems arrive later as
    /// [`ChannelEvent::FaultOccurred`].
    pub fn connect(&self, endpoint: &str, transports: &[TransportKind]) -> ConnectionHandle {
        let key = ChannelKey { endpoint: endpoint.to_owned(), transports: transports.to_vec() };
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        match channels.get(&key) {
            Some(handle) if !handle.is_closed() => {
                debug!(%endpoint, "ws: reusing shared channel");
                return handle.clone();
            }
            Some(_) => info!(%endpoint, "ws: previous channel closed, reopening"),
            None => {}
        }

        let transport = select_transport(transports);
        info!(%endpoint, transport = transport.as_str(), "ws: opening channel");
        let (handle, driver) = ConnectionHandle::pair(endpoint);
        self.runtime.spawn(run_websocket(endpoint.to_owned(), driver, self.options));
        channels.insert(key, handle.clone());
        handle
    }

    /// Channels whose transport is still running.
    #[must_use]
    pub fn open_channels(&self) -> usize {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels.values().filter(|handle| !handle.is_closed()).count()
    }
}

/// First supported preference. Only websocket is implemented; anything
/// listed ahead of it is skipped.
fn select_transport(preferences: &[TransportKind]) -> TransportKind {
    for kind in preferences {
        if *kind == TransportKind::WebSocket {
            return *kind;
        }
        warn!(transport = kind.as_str(), "ws: transport not supported, skipping");
    }
    if !preferences.contains(&TransportKind::WebSocket) {
        warn!("ws: no supported transport listed, falling back to websocket");
    }
    TransportKind::WebSocket
}

// =============================================================================
// CONNECTION LOOP
// =============================================================================

/// Why a connected session ended.
enum Ended {
    /// Every handle is gone.
    Orphaned,
    /// The server closed the socket or the stream ended.
    Closed,
    Failed(TransportError),
}

async fn run_websocket(endpoint: String, mut driver: ChannelDriver, options: TransportOptions) {
    let mut stream = match open(&endpoint, options.connect_timeout).await {
        Ok(stream) => stream,
        Err(err) => {
            warn!(%endpoint, error = %err, "ws: connect failed");
            driver.deliver(ChannelEvent::FaultOccurred(err.initial_fault()));
            match reconnect(&endpoint, &driver, &options).await {
                Some(stream) => stream,
                None => return,
            }
        }
    };
    info!(%endpoint, "ws: connected");

    loop {
        match relay(&mut stream, &mut driver, options.encoding).await {
            Ended::Orphaned => {
                if let Err(err) = stream.close(None).await {
                    debug!(%endpoint, error = %err, "ws: close after last handle dropped");
                }
                info!(%endpoint, "ws: channel released");
                return;
            }
            Ended::Closed => {
                warn!(%endpoint, "ws: disconnected");
                driver.deliver(ChannelEvent::FaultOccurred(FaultKind::Disconnect));
            }
            Ended::Failed(err) => {
                warn!(%endpoint, error = %err, "ws: socket error");
                driver.deliver(ChannelEvent::FaultOccurred(FaultKind::ChannelError));
            }
        }

        stream = match reconnect(&endpoint, &driver, &options).await {
            Some(stream) => stream,
            None => return,
        };
    }
}

async fn open(endpoint: &str, timeout: Duration) -> Result<WsStream, TransportError> {
    match tokio::time::timeout(timeout, connect_async(endpoint)).await {
        Err(_) => Err(TransportError::Timeout(timeout)),
        Ok(Err(err)) => Err(TransportError::Connect(Box::new(err))),
        Ok(Ok((stream, _response))) => Ok(stream),
    }
}

async fn reconnect(endpoint: &str, driver: &ChannelDriver, options: &TransportOptions) -> Option<WsStream> {
    let policy = options.reconnect;
    for attempt in 1..=policy.attempts {
        tokio::time::sleep(policy.backoff(attempt)).await;
        if driver.is_orphaned() {
            return None;
        }
        match open(endpoint, options.connect_timeout).await {
            Ok(stream) => {
                info!(%endpoint, attempt, "ws: reconnected");
                return Some(stream);
            }
            Err(err) => {
                warn!(%endpoint, attempt, error = %err, "ws: reconnect failed");
                driver.deliver(ChannelEvent::FaultOccurred(FaultKind::ReconnectError));
            }
        }
    }
    warn!(%endpoint, attempts = policy.attempts, "ws: giving up on reconnect");
    None
}

/// Relay frames both ways until the socket ends or every handle is gone.
async fn relay(stream: &mut WsStream, driver: &mut ChannelDriver, encoding: WireEncoding) -> Ended {
    loop {
        tokio::select! {
            outbound = driver.next_outbound() => {
                let Some(frame) = outbound else {
                    return Ended::Orphaned;
                };
                debug!(event = %frame.event, "ws: send frame");
                if let Err(err) = stream.send(encode(&frame, encoding)).await {
                    return Ended::Failed(TransportError::Socket(Box::new(err)));
                }
            }
            inbound = stream.next() => {
                match inbound {
                    None | Some(Ok(WsMessage::Close(_))) => return Ended::Closed,
                    Some(Err(err)) => return Ended::Failed(TransportError::Socket(Box::new(err))),
                    Some(Ok(message)) => dispatch(driver, message),
                }
            }
        }
    }
}

fn encode(frame: &Frame, encoding: WireEncoding) -> WsMessage {
    match encoding {
        WireEncoding::Json => WsMessage::Text(frames::encode_json(frame).into()),
        WireEncoding::Protobuf => WsMessage::Binary(frames::encode_frame(frame).into()),
    }
}

fn dispatch(driver: &ChannelDriver, message: WsMessage) {
    let decoded = match message {
        WsMessage::Text(text) => frames::decode_json(text.as_str()),
        WsMessage::Binary(bytes) => frames::decode_frame(&bytes),
        _ => return,
    };
    let frame = match decoded {
        Ok(frame) => frame,
        Err(err) => {
            warn!(error = %err, "ws: dropping undecodable frame");
            return;
        }
    };
    match inbound_event(&frame) {
        Some(event) => {
            driver.deliver(event);
        }
        None => debug!(event = %frame.event, "ws: ignoring frame"),
    }
}

/// Map an inbound frame to the event listeners see.
pub(crate) fn inbound_event(frame: &Frame) -> Option<ChannelEvent> {
    match frame.event.as_str() {
        BOT_MESSAGE => frame.text_payload().map(|text| ChannelEvent::MessageReceived(text.to_owned())),
        BOT_TYPING => Some(ChannelEvent::TypingSignaled),
        name if FaultKind::from_event_name(name) == Some(FaultKind::ChannelError) => {
            Some(ChannelEvent::FaultOccurred(FaultKind::ChannelError))
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
