use std::sync::Arc;
use std::time::Duration;

use chatter::config::{self, ConfigError, WidgetConfig};
use chatter::render::render_text;
use chatter::sound::AudioCues;
use chatter::{ChatSession, Connector, LatestMessages, TransportOptions};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read stdin: {0}")]
    Stdin(#[from] std::io::Error),
}

/// Flags override the `CHATTER_*` environment, which `WidgetConfig::from_env`
/// reads with the same rules the library uses.
#[derive(Parser, Debug)]
#[command(name = "chatter", about = "Terminal chat client for a bot server")]
struct Cli {
    /// Bot server URL [env: CHATTER_ENDPOINT]
    #[arg(long)]
    endpoint: Option<String>,

    /// Comma separated transport preferences [env: CHATTER_TRANSPORTS]
    #[arg(long)]
    transports: Option<String>,

    #[arg(long)]
    send_audio_url: Option<String>,

    #[arg(long)]
    receive_audio_url: Option<String>,

    #[arg(long)]
    greeting: Option<String>,

    /// `json` or `protobuf` [env: CHATTER_ENCODING]
    #[arg(long)]
    encoding: Option<String>,

    #[arg(long)]
    connect_timeout_ms: Option<u64>,

    #[arg(long)]
    reconnect_attempts: Option<u32>,
}

impl Cli {
    fn into_config(self) -> Result<WidgetConfig, ConfigError> {
        self.apply(WidgetConfig::from_env()?)
    }

    fn apply(self, mut config: WidgetConfig) -> Result<WidgetConfig, ConfigError> {
        if let Some(endpoint) = self.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(raw) = self.transports {
            config.transports = config::parse_transports(&raw, "--transports")?;
        }
        if let Some(url) = self.send_audio_url {
            config.send_audio_url = Some(url);
        }
        if let Some(url) = self.receive_audio_url {
            config.receive_audio_url = Some(url);
        }
        if let Some(greeting) = self.greeting {
            config.greeting = greeting;
        }
        if let Some(raw) = self.encoding {
            config.encoding = raw.parse()?;
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(attempts) = self.reconnect_attempts {
            config.reconnect.attempts = attempts;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = Cli::parse().into_config()?;
    let connector = Connector::new(tokio::runtime::Handle::current(), TransportOptions::from(&config));
    let handle = connector.connect(&config.endpoint, &config.transports);
    let sounds =
        Arc::new(AudioCues::new(config.send_audio_url.clone(), config.receive_audio_url.clone()));
    let mut session =
        ChatSession::mount(handle, config.greeting.clone(), LatestMessages::new(), sounds);
    print_view(&mut session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                session.set_composer_text(line);
                if let Err(err) = session.submit() {
                    eprintln!("{err}");
                }
                print_view(&mut session);
            }
            event = session.next_event() => {
                let Some(event) = event else { break };
                session.apply(event);
                print_view(&mut session);
            }
        }
    }

    session.teardown();
    tracing::info!(channels = connector.open_channels(), "chatter exiting");
    Ok(())
}

/// Redraw the conversation; a fresh message redraws from the top so the
/// newest line sits at the bottom of the terminal.
fn print_view(session: &mut ChatSession) {
    if session.take_scroll_request() {
        print!("\x1b[2J\x1b[H");
    }
    println!("{}", render_text(&session.render()));
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
