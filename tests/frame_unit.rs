//! Unit tests for `Frame`, `Command` and `SessionInfo`.

use iridium_stomp_client::{Command, Frame, FrameError, SessionInfo};

// =============================================================================
// Command Tests
// =============================================================================

#[test]
fn command_round_trips_through_its_name() {
    for command in Command::WIRE {
        let parsed: Command = command.to_string().parse().unwrap();
        assert_eq!(parsed, command);
    }
}

#[test]
fn command_rejects_unknown_tokens() {
    for token in ["", "send", "PUBLISH", "UNKNOWN"] {
        match token.parse::<Command>() {
            Err(FrameError::UnknownCommand(t)) => assert_eq!(t, token),
            other => panic!("expected UnknownCommand for {:?}, got {:?}", token, other),
        }
    }
}

#[test]
fn command_default_is_unknown() {
    assert_eq!(Command::default(), Command::Unknown);
    assert_eq!(Frame::default().command, Command::Unknown);
}

// =============================================================================
// Construction and Builder Tests
// =============================================================================

#[test]
fn frame_new_creates_empty() {
    let frame = Frame::new(Command::Send);
    assert_eq!(frame.command, Command::Send);
    assert!(frame.headers.is_empty());
    assert!(frame.body.is_empty());
}

#[test]
fn frame_builder_chain() {
    let frame = Frame::new(Command::Send)
        .header("destination", "/queue/test")
        .header("content-type", "application/json")
        .set_body(b"{\"key\": \"value\"}".to_vec());

    assert_eq!(frame.command, Command::Send);
    assert_eq!(frame.headers.len(), 2);
    assert_eq!(frame.get_header("content-type"), Some("application/json"));
    assert_eq!(frame.body, b"{\"key\": \"value\"}");
}

#[test]
fn frame_header_last_assignment_wins() {
    let frame = Frame::new(Command::Send)
        .header("custom", "first")
        .header("custom", "second");
    assert_eq!(frame.headers.len(), 1);
    assert_eq!(frame.get_header("custom"), Some("second"));
}

#[test]
fn frame_set_header_returns_replaced_value() {
    let mut frame = Frame::new(Command::Send);
    assert_eq!(frame.set_header("k", "v1"), None);
    assert_eq!(frame.set_header("k", "v2"), Some("v1".to_string()));
}

#[test]
fn frame_receipt_adds_header() {
    let frame = Frame::new(Command::Send)
        .header("destination", "/queue/test")
        .receipt("receipt-123");
    assert_eq!(frame.get_header("receipt"), Some("receipt-123"));
    assert!(frame.has_header("destination"));
}

#[test]
fn frame_body_str() {
    assert_eq!(
        Frame::new(Command::Send).set_body("héllo").body_str(),
        Some("héllo")
    );
    assert_eq!(
        Frame::new(Command::Send).set_body(vec![0xff, 0xfe]).body_str(),
        None
    );
}

// =============================================================================
// Display Tests
// =============================================================================

#[test]
fn frame_display_lists_sorted_headers_and_body_length() {
    let frame = Frame::new(Command::Send)
        .header("destination", "/queue/test")
        .header("content-type", "text/plain")
        .set_body(b"hello".to_vec());
    let display = format!("{}", frame);
    assert!(display.starts_with("Command: SEND\n"));
    let ct = display.find("content-type: text/plain").unwrap();
    let dest = display.find("destination: /queue/test").unwrap();
    assert!(ct < dest);
    assert!(display.contains("Body (5 bytes)"));
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn validate_accepts_ordinary_frames() {
    let frame = Frame::new(Command::Send)
        .header("destination", "/queue/a:b")
        .set_body("line1\nline2");
    assert!(frame.validate().is_ok());
}

#[test]
fn validate_rejects_unknown_command() {
    assert!(matches!(
        Frame::default().validate(),
        Err(FrameError::UnknownCommand(_))
    ));
}

#[test]
fn validate_rejects_nul_in_headers_and_body() {
    let header = Frame::new(Command::Send).header("bad", "a\0b");
    match header.validate() {
        Err(FrameError::NulInHeader(k)) => assert_eq!(k, "bad"),
        other => panic!("expected NulInHeader, got {:?}", other),
    }

    let body = Frame::new(Command::Send).set_body(vec![1, 0, 2]);
    assert!(matches!(body.validate(), Err(FrameError::NulInBody)));
}

// =============================================================================
// Wire Tests
// =============================================================================

#[test]
fn to_bytes_layout() {
    let frame = Frame::new(Command::Send)
        .header("destination", "/q")
        .set_body("hi");
    assert_eq!(frame.to_bytes(), b"SEND\ndestination:/q\n\nhi\0\n".to_vec());
}

#[test]
fn parse_reads_back_to_bytes() {
    let frame = Frame::new(Command::Message)
        .header("destination", "/queue/x")
        .header("weird", "a:b\\c\r\nd")
        .set_body("body ✓");
    assert_eq!(Frame::parse(&frame.to_bytes()).unwrap(), frame);
}

// =============================================================================
// SessionInfo Tests
// =============================================================================

#[test]
fn session_info_from_connected_frame() {
    let connected = Frame::new(Command::Connected)
        .header("session", "abc")
        .header("version", "1.1")
        .header("server", "broker/1");
    let info = SessionInfo::from_frame(&connected);
    assert_eq!(info.session_id.as_deref(), Some("abc"));
    assert_eq!(info.version.as_deref(), Some("1.1"));
    assert_eq!(info.server.as_deref(), Some("broker/1"));
}

#[test]
fn session_info_missing_headers_are_none() {
    let info = SessionInfo::from_frame(&Frame::new(Command::Connected));
    assert_eq!(info, SessionInfo::default());
}
