use super::*;

#[test]
fn table_rows_match_their_kind() {
    for kind in FaultKind::ALL {
        assert_eq!(entry(kind).1, kind);
    }
}

#[test]
fn event_names_round_trip() {
    for kind in FaultKind::ALL {
        assert_eq!(FaultKind::from_event_name(kind.event_name()), Some(kind));
    }
}

#[test]
fn unknown_event_name_is_not_a_fault() {
    assert_eq!(FaultKind::from_event_name("bot-message"), None);
    assert_eq!(FaultKind::from_event_name(""), None);
}

#[test]
fn each_fault_has_distinct_text() {
    let mut texts: Vec<&str> = FaultKind::ALL.iter().map(|kind| kind.message()).collect();
    texts.sort_unstable();
    texts.dedup();
    assert_eq!(texts.len(), FaultKind::ALL.len());
}

#[test]
fn connect_error_and_timeout_text() {
    assert_eq!(FaultKind::ConnectError.message(), "There was an error connecting.");
    assert_eq!(FaultKind::ConnectTimeout.message(), "There was an error, connection timed out.");
    assert_eq!(FaultKind::ChannelError.event_name(), "error");
}

#[test]
fn display_uses_event_name() {
    assert_eq!(FaultKind::Disconnect.to_string(), "disconnect");
}
