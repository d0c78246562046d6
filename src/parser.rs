// Slice-based STOMP frame parser (produces an owned Frame from an input slice)
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::error::FrameError;
use crate::escape::unescape;
use crate::frame::{Command, EOL, Frame, NULL};

/// Split off the next line of `input`, without its terminator.
///
/// A single CR before the EOL is dropped. Returns `None` if no EOL exists.
fn next_line(input: &[u8]) -> Option<(&[u8], &[u8])> {
    let end = input.iter().position(|&b| b == EOL)?;
    let mut line = &input[..end];
    if line.last() == Some(&b'\r') {
        line = &line[..line.len() - 1];
    }
    Some((line, &input[end + 1..]))
}

/// Parse one `key:value` header line and unescape both sides.
///
/// The first `:` splits the line; escaped colons travel as `\c`, so any raw
/// colon is a separator candidate.
pub fn parse_header_line(line: &[u8]) -> Result<(String, String), FrameError> {
    let text = std::str::from_utf8(line)?;
    let (raw_key, raw_value) = text
        .split_once(':')
        .ok_or_else(|| FrameError::MalformedHeader(text.to_string()))?;
    Ok((unescape(raw_key)?, unescape(raw_value)?))
}

/// Parse a single STOMP frame from a raw byte slice.
///
/// The frame ends at the first NULL byte; anything after it (typically the
/// trailing EOL) is ignored. When a header is repeated the first occurrence
/// is kept.
pub fn parse_frame(input: &[u8]) -> Result<Frame, FrameError> {
    let end = input
        .iter()
        .position(|&b| b == NULL)
        .ok_or(FrameError::Unterminated("missing NULL terminator"))?;
    let input = &input[..end];

    let (command_line, mut rest) =
        next_line(input).ok_or(FrameError::Unterminated("missing end of command line"))?;
    let command = String::from_utf8_lossy(command_line).parse::<Command>()?;

    let mut headers = HashMap::new();
    loop {
        let (line, remaining) =
            next_line(rest).ok_or(FrameError::Unterminated("missing end of header block"))?;
        rest = remaining;
        if line.is_empty() {
            break;
        }
        let (key, value) = parse_header_line(line)?;
        if let Entry::Vacant(slot) = headers.entry(key) {
            slot.insert(value);
        }
    }

    Ok(Frame {
        command,
        headers,
        body: rest.to_vec(),
    })
}
