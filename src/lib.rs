//! Client-side core of a real-time chat widget.
//!
//! A [`transport::Connector`] opens one shared websocket channel per bot
//! endpoint. A [`session::ChatSession`] mounts onto that channel, keeps the
//! append-only conversation log, and turns inbound events (bot messages,
//! typing signals, lifecycle faults) into state that [`render::render`]
//! projects into a view.

pub mod channel;
pub mod config;
pub mod conversation;
pub mod fault;
pub mod message;
pub mod notify;
pub mod render;
pub mod session;
pub mod sound;
pub mod transport;

pub use channel::{ChannelDriver, ChannelEvent, ConnectionHandle, Subscription};
pub use config::{ConfigError, TransportKind, WidgetConfig, WireEncoding};
pub use conversation::ConversationState;
pub use fault::FaultKind;
pub use message::{Author, Message};
pub use notify::LatestMessages;
pub use session::{ChatError, ChatSession};
pub use transport::{Connector, TransportOptions};
