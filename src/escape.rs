//! Header escaping.
//!
//! Header names and values are escaped on the wire; bodies never are:
//! - backslash → `\\`
//! - carriage return → `\r`
//! - line feed → `\n`
//! - colon → `\c`

use crate::error::EscapeError;

/// Escape a header name or value for wire transmission.
pub fn escape(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\r' => result.push_str("\\r"),
            '\n' => result.push_str("\\n"),
            ':' => result.push_str("\\c"),
            _ => result.push(ch),
        }
    }
    result
}

/// Reverse `escape`.
///
/// A lone backslash at the very end of the input is kept as-is. Any other
/// backslash must start one of the four recognized sequences.
pub fn unescape(input: &str) -> Result<String, EscapeError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.char_indices();
    while let Some((position, ch)) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some((_, '\\')) => result.push('\\'),
            Some((_, 'r')) => result.push('\r'),
            Some((_, 'n')) => result.push('\n'),
            Some((_, 'c')) => result.push(':'),
            Some((_, other)) => {
                return Err(EscapeError {
                    sequence: format!("\\{}", other),
                    position,
                });
            }
            None => result.push('\\'),
        }
    }
    Ok(result)
}
