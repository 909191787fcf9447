use super::*;
use std::collections::HashMap;

fn env(pairs: &[(&str, &str)]) -> WidgetConfig {
    let map: HashMap<&str, &str> = pairs.iter().copied().collect();
    WidgetConfig::from_lookup(|key: &str| map.get(key).map(|value| (*value).to_owned()))
        .expect("env config")
}

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("chatter").chain(args.iter().copied())).expect("cli args")
}

#[test]
fn no_flags_keeps_environment_values() {
    let base = env(&[("CHATTER_ENDPOINT", "ws://bots.test/chat"), ("CHATTER_ENCODING", "protobuf")]);
    let config = cli(&[]).apply(base.clone()).expect("apply");
    assert_eq!(config, base);
}

#[test]
fn unparseable_numeric_env_falls_back_to_defaults_for_the_binary_too() {
    let base = env(&[
        ("CHATTER_CONNECT_TIMEOUT_MS", "soon"),
        ("CHATTER_RECONNECT_ATTEMPTS", "many"),
    ]);
    let config = cli(&[]).apply(base).expect("apply");
    assert_eq!(config.connect_timeout, Duration::from_millis(config::DEFAULT_CONNECT_TIMEOUT_MS));
    assert_eq!(config.reconnect.attempts, config::DEFAULT_RECONNECT_ATTEMPTS);
}

#[test]
fn flags_override_environment() {
    let base = env(&[("CHATTER_ENDPOINT", "ws://from-env/chat"), ("CHATTER_RECONNECT_ATTEMPTS", "9")]);
    let config = cli(&[
        "--endpoint",
        "ws://from-flag/chat",
        "--transports",
        "polling,websocket",
        "--connect-timeout-ms",
        "750",
        "--reconnect-attempts",
        "1",
    ])
    .apply(base)
    .expect("apply");

    assert_eq!(config.endpoint, "ws://from-flag/chat");
    assert_eq!(
        config.transports,
        vec![config::TransportKind::Polling, config::TransportKind::WebSocket]
    );
    assert_eq!(config.connect_timeout, Duration::from_millis(750));
    assert_eq!(config.reconnect.attempts, 1);
}

#[test]
fn bad_encoding_flag_is_a_config_error() {
    let err = cli(&["--encoding", "xml"]).apply(WidgetConfig::default()).unwrap_err();
    assert_eq!(err, ConfigError::UnknownEncoding("xml".into()));
}
