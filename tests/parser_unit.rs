//! Unit tests for the slice parser.

use iridium_stomp_client::parser::{parse_frame, parse_header_line};
use iridium_stomp_client::{Command, FrameError};

#[test]
fn parse_full_frame_with_trailer() {
    let f = parse_frame(b"MESSAGE\ndestination:/queue/a\nmessage-id:7\n\nhello\0\n").unwrap();
    assert_eq!(f.command, Command::Message);
    assert_eq!(f.get_header("destination"), Some("/queue/a"));
    assert_eq!(f.get_header("message-id"), Some("7"));
    assert_eq!(f.body, b"hello");
}

#[test]
fn parse_tolerates_crlf_line_endings() {
    let f = parse_frame(b"CONNECTED\r\nversion:1.1\r\n\r\n\0").unwrap();
    assert_eq!(f.command, Command::Connected);
    assert_eq!(f.get_header("version"), Some("1.1"));
    assert!(f.body.is_empty());
}

#[test]
fn parse_keeps_first_duplicate_header() {
    let f = parse_frame(b"MESSAGE\nfoo:first\nfoo:second\n\n\0").unwrap();
    assert_eq!(f.get_header("foo"), Some("first"));
    assert_eq!(f.headers.len(), 1);
}

#[test]
fn parse_body_may_contain_eol() {
    let f = parse_frame(b"SEND\n\nline1\nline2\n\0").unwrap();
    assert_eq!(f.body, b"line1\nline2\n");
}

#[test]
fn parse_rejects_unknown_command() {
    match parse_frame(b"FROB\n\n\0") {
        Err(FrameError::UnknownCommand(c)) => assert_eq!(c, "FROB"),
        other => panic!("expected UnknownCommand, got {:?}", other),
    }
}

#[test]
fn parse_rejects_unterminated_input() {
    assert!(matches!(
        parse_frame(b"SEND\ndestination:/q\n\nbody"),
        Err(FrameError::Unterminated(_))
    ));
    assert!(matches!(
        parse_frame(b"SEND\ndestination:/q\0"),
        Err(FrameError::Unterminated(_))
    ));
    assert!(matches!(parse_frame(b"SEND\0"), Err(FrameError::Unterminated(_))));
}

#[test]
fn parse_rejects_header_without_colon() {
    match parse_frame(b"SEND\nnocolon\n\n\0") {
        Err(FrameError::MalformedHeader(line)) => assert_eq!(line, "nocolon"),
        other => panic!("expected MalformedHeader, got {:?}", other),
    }
}

#[test]
fn header_line_splits_on_first_colon_and_unescapes() {
    assert_eq!(
        parse_header_line(b"a\\cb:c:d\\n").unwrap(),
        ("a:b".to_string(), "c:d\n".to_string())
    );
    assert_eq!(
        parse_header_line(b"empty:").unwrap(),
        ("empty".to_string(), String::new())
    );
}

#[test]
fn header_line_rejects_invalid_utf8() {
    assert!(matches!(
        parse_header_line(&[b'k', b':', 0xff]),
        Err(FrameError::InvalidUtf8(_))
    ));
}
