//! Widget configuration parsed from environment variables.

use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:4000/chat";
pub const DEFAULT_GREETING: &str = "Hi! I'm Botty. Ask me anything and I'll do my best to help.";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1_000;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 10_000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown transport: {0}")]
    UnknownTransport(String),
    #[error("unknown wire encoding: {0} (expected 'json' or 'protobuf')")]
    UnknownEncoding(String),
    #[error("{var} must list at least one transport")]
    EmptyTransports { var: &'static str },
}

/// Transport preference, in the naming the bot server advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    WebSocket,
    Polling,
    FlashSocket,
}

impl TransportKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebSocket => "websocket",
            Self::Polling => "polling",
            Self::FlashSocket => "flashsocket",
        }
    }
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "websocket" => Ok(Self::WebSocket),
            "polling" => Ok(Self::Polling),
            "flashsocket" => Ok(Self::FlashSocket),
            other => Err(ConfigError::UnknownTransport(other.to_owned())),
        }
    }
}

/// Encoding used for outbound frames. Inbound frames are accepted in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WireEncoding {
    /// JSON text messages.
    #[default]
    Json,
    /// Protobuf binary messages.
    Protobuf,
}

impl FromStr for WireEncoding {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "protobuf" | "proto" => Ok(Self::Protobuf),
            other => Err(ConfigError::UnknownEncoding(other.to_owned())),
        }
    }
}

/// How the transport retries after an established connection drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl ReconnectPolicy {
    /// Delay before the given attempt (1-based): doubles each time, capped.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RECONNECT_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    pub endpoint: String,
    pub transports: Vec<TransportKind>,
    pub send_audio_url: Option<String>,
    pub receive_audio_url: Option<String>,
    pub greeting: String,
    pub encoding: WireEncoding,
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            transports: default_transports(),
            send_audio_url: None,
            receive_audio_url: None,
            greeting: DEFAULT_GREETING.to_owned(),
            encoding: WireEncoding::Json,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl WidgetConfig {
    /// Build typed widget config from environment variables.
    ///
    /// All optional:
    /// - `CHATTER_ENDPOINT`: bot server URL
    /// - `CHATTER_TRANSPORTS`: comma list, default `websocket,polling,flashsocket`
    /// - `CHATTER_SEND_AUDIO_URL`, `CHATTER_RECEIVE_AUDIO_URL`
    /// - `CHATTER_GREETING`: first message shown, authored by the bot
    /// - `CHATTER_ENCODING`: `json` (default) or `protobuf`
    /// - `CHATTER_CONNECT_TIMEOUT_MS`: default 20000
    /// - `CHATTER_RECONNECT_ATTEMPTS`: default 5
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for unknown transport or encoding names.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`WidgetConfig::from_env`] over an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for unknown transport or encoding names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let transports = match lookup("CHATTER_TRANSPORTS") {
            Some(raw) => parse_transports(&raw, "CHATTER_TRANSPORTS")?,
            None => defaults.transports,
        };
        let encoding = match lookup("CHATTER_ENCODING") {
            Some(raw) => raw.parse()?,
            None => defaults.encoding,
        };
        let connect_timeout = Duration::from_millis(parse_or(
            lookup("CHATTER_CONNECT_TIMEOUT_MS"),
            DEFAULT_CONNECT_TIMEOUT_MS,
        ));
        let reconnect = ReconnectPolicy {
            attempts: parse_or(lookup("CHATTER_RECONNECT_ATTEMPTS"), DEFAULT_RECONNECT_ATTEMPTS),
            ..defaults.reconnect
        };

        Ok(Self {
            endpoint: lookup("CHATTER_ENDPOINT").unwrap_or(defaults.endpoint),
            transports,
            send_audio_url: lookup("CHATTER_SEND_AUDIO_URL"),
            receive_audio_url: lookup("CHATTER_RECEIVE_AUDIO_URL"),
            greeting: lookup("CHATTER_GREETING").unwrap_or(defaults.greeting),
            encoding,
            connect_timeout,
            reconnect,
        })
    }
}

#[must_use]
pub fn default_transports() -> Vec<TransportKind> {
    vec![TransportKind::WebSocket, TransportKind::Polling, TransportKind::FlashSocket]
}

/// Parse a comma separated transport list, skipping blank entries.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownTransport`] for an unrecognized name and
/// [`ConfigError::EmptyTransports`] when nothing is listed.
pub fn parse_transports(raw: &str, var: &'static str) -> Result<Vec<TransportKind>, ConfigError> {
    let transports = raw
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect::<Result<Vec<TransportKind>, _>>()?;
    if transports.is_empty() {
        return Err(ConfigError::EmptyTransports { var });
    }
    Ok(transports)
}

fn parse_or<T: FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|raw| raw.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
