use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

/// Line terminator used on the wire.
pub const EOL: u8 = b'\n';
/// Frame terminator used on the wire.
pub const NULL: u8 = 0;

/// STOMP commands understood by the client.
///
/// `Unknown` is a placeholder for "no command" and is never accepted from the
/// wire: `"UNKNOWN".parse::<Command>()` fails like any other unrecognized
/// token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Command {
    Connect,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Begin,
    Commit,
    Abort,
    Ack,
    Nack,
    Disconnect,
    Message,
    Receipt,
    Error,
    Stomp,
    #[default]
    Unknown,
}

impl Command {
    /// Every command that may appear on the wire.
    pub const WIRE: [Command; 15] = [
        Command::Connect,
        Command::Connected,
        Command::Send,
        Command::Subscribe,
        Command::Unsubscribe,
        Command::Begin,
        Command::Commit,
        Command::Abort,
        Command::Ack,
        Command::Nack,
        Command::Disconnect,
        Command::Message,
        Command::Receipt,
        Command::Error,
        Command::Stomp,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Stomp => "STOMP",
            Command::Unknown => "UNKNOWN",
        }
    }
}

impl FromStr for Command {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::WIRE
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| FrameError::UnknownCommand(s.to_string()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame.
///
/// `Frame` contains the command, a header map (keys are unique, the last
/// assignment wins) and the raw body bytes. Header iteration order is
/// unspecified.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    /// STOMP command (e.g. CONNECT, SEND, SUBSCRIBE)
    pub command: Command,
    /// Header map
    pub headers: HashMap<String, String>,
    /// Raw body bytes
    pub body: Vec<u8>,
}

impl Frame {
    /// Create a new frame with the given command and empty headers/body.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Set a header (builder style). An existing value for `key` is replaced.
    ///
    /// Returns the mutated `Frame` allowing builder-style chaining.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set a header in place, returning the value it replaced.
    pub fn set_header(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        self.headers.insert(key.into(), value.into())
    }

    /// Set the frame body (builder style).
    pub fn set_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Request a receipt for this frame (builder style).
    ///
    /// The broker answers with a RECEIPT frame whose `receipt-id` header
    /// equals `receipt_id`.
    pub fn receipt(self, receipt_id: impl Into<String>) -> Self {
        self.header("receipt", receipt_id)
    }

    /// Get the value of a header by name (case-sensitive).
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    pub fn has_header(&self, key: &str) -> bool {
        self.headers.contains_key(key)
    }

    /// The body as UTF-8 text, if it is valid UTF-8.
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Encode this frame into its wire representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = bytes::BytesMut::new();
        crate::codec::encode_frame(self, &mut buf);
        buf.to_vec()
    }

    /// Decode one frame from `input`. Bytes after the NULL terminator are
    /// ignored.
    pub fn parse(input: &[u8]) -> Result<Self, FrameError> {
        crate::parser::parse_frame(input)
    }

    /// Check that the frame can be written to the wire: the command is a wire
    /// command and neither header text nor body contains a NULL byte.
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.command == Command::Unknown {
            return Err(FrameError::UnknownCommand(self.command.to_string()));
        }
        for (k, v) in &self.headers {
            if k.as_bytes().contains(&NULL) || v.as_bytes().contains(&NULL) {
                return Err(FrameError::NulInHeader(k.clone()));
            }
        }
        if self.body.contains(&NULL) {
            return Err(FrameError::NulInBody);
        }
        Ok(())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Command: {}", self.command)?;
        let mut keys: Vec<&String> = self.headers.keys().collect();
        keys.sort();
        for k in keys {
            writeln!(f, "{}: {}", k, self.headers[k])?;
        }
        writeln!(f, "Body ({} bytes)", self.body.len())
    }
}

/// Session details reported by the broker in its CONNECTED frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionInfo {
    /// `session` header
    pub session_id: Option<String>,
    /// `version` header (negotiated protocol version)
    pub version: Option<String>,
    /// `server` header
    pub server: Option<String>,
}

impl SessionInfo {
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            session_id: frame.get_header("session").map(str::to_string),
            version: frame.get_header("version").map(str::to_string),
            server: frame.get_header("server").map(str::to_string),
        }
    }
}
