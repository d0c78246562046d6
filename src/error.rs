//! Error types for the client.

use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::frame::{Command, Frame};

/// An invalid escape sequence in a header name or value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid escape sequence '{sequence}' at byte {position}")]
pub struct EscapeError {
    /// The offending two-character sequence, backslash included.
    pub sequence: String,
    /// Byte offset of the backslash in the escaped input.
    pub position: usize,
}

/// Malformed wire data.
#[derive(Error, Debug)]
pub enum FrameError {
    /// Command token is not a STOMP command
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    /// A required terminator was missing
    #[error("unterminated frame: {0}")]
    Unterminated(&'static str),
    /// Header line without a `:` separator
    #[error("malformed header line '{0}'")]
    MalformedHeader(String),
    #[error("invalid header: {0}")]
    Escape(#[from] EscapeError),
    #[error("invalid utf8 in frame: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    /// NULL byte in a header name or value
    #[error("NULL byte in header '{0}'")]
    NulInHeader(String),
    /// NULL byte inside the body
    #[error("NULL byte in frame body")]
    NulInBody,
    /// No frame terminator within the size limit
    #[error("frame exceeds {limit} bytes without a terminator")]
    TooLarge { limit: usize },
    /// I/O error surfaced through the codec
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Transport-level failure, split into timeouts and everything else.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport timed out")]
    Timeout,
    #[error("connection closed by peer")]
    Closed,
    #[error("io error: {0}")]
    Other(io::Error),
}

impl TransportError {
    /// Whether the transport cannot be used any more after this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            TransportError::Timeout => false,
            TransportError::Closed => true,
            TransportError::Other(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::NotConnected
            ),
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportError::Timeout,
            _ => TransportError::Other(e),
        }
    }
}

/// A broker ERROR frame turned into an error value.
#[derive(Debug, Clone)]
pub struct ServerError {
    /// The `message` header, or `"unknown error"` when absent.
    pub message: String,
    /// The frame body, if it was non-empty UTF-8.
    pub body: Option<String>,
    /// The `receipt-id` header, when the error answers a receipt request.
    pub receipt_id: Option<String>,
    /// The original ERROR frame.
    pub frame: Frame,
}

impl ServerError {
    pub fn from_frame(frame: Frame) -> Self {
        let message = frame
            .get_header("message")
            .unwrap_or("unknown error")
            .to_string();
        let body = frame
            .body_str()
            .filter(|b| !b.is_empty())
            .map(str::to_string);
        let receipt_id = frame.get_header("receipt-id").map(str::to_string);
        Self {
            message,
            body,
            receipt_id,
            frame,
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "STOMP server error: {}", self.message)?;
        if let Some(body) = &self.body {
            write!(f, " ({})", body)?;
        }
        Ok(())
    }
}

impl std::error::Error for ServerError {}

/// Errors returned by `Connection` operations.
#[derive(Error, Debug)]
pub enum ConnError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    /// The broker answered with an ERROR frame
    #[error("protocol error: {0}")]
    Protocol(ServerError),
    /// No reply arrived within the response timeout
    #[error("no reply to {command} within {timeout:?}")]
    ResponseTimeout { command: Command, timeout: Duration },
    #[error("invalid ack mode '{0}'")]
    InvalidAckMode(String),
    /// A receipt was requested but the confirming frame never arrived
    #[error("receipt '{0}' was requested but not received")]
    ReceiptNotReceived(String),
    /// The broker answered with a frame that does not fit the request
    #[error("unexpected {got} in reply to {request}")]
    UnexpectedReply { request: Command, got: Command },
    #[error("missing required header '{0}'")]
    MissingHeader(&'static str),
    #[error("connection closed")]
    Closed,
}

impl From<io::Error> for ConnError {
    fn from(e: io::Error) -> Self {
        ConnError::Transport(e.into())
    }
}

/// An error raised inside the background read/write loops.
///
/// Events are pushed to the error sink and read back with
/// `Connection::next_error`. `frame` is the outbound frame a write failed on;
/// it is `None` when the error is not tied to one frame.
#[derive(Error, Debug)]
#[error("[{connection}] {cause}")]
pub struct ConnectionError {
    connection: String,
    frame: Option<Frame>,
    #[source]
    cause: ConnError,
}

impl ConnectionError {
    pub fn new(connection: impl Into<String>, frame: Option<Frame>, cause: ConnError) -> Self {
        Self {
            connection: connection.into(),
            frame,
            cause,
        }
    }

    /// Label of the connection that raised the error (its peer address).
    pub fn connection(&self) -> &str {
        &self.connection
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn cause(&self) -> &ConnError {
        &self.cause
    }

    pub fn into_cause(self) -> ConnError {
        self.cause
    }
}
