//! Async STOMP client.
//!
//! A [`Connection`] runs a reader task and a writer task over one transport.
//! Request/response operations are matched to their replies by key, MESSAGE
//! frames are routed to per-destination [`Subscription`] queues, and errors
//! raised by the background loops are collected for [`Connection::next_error`].

pub mod codec;
pub mod config;
pub mod connection;
pub(crate) mod correlator;
pub mod error;
pub(crate) mod error_sink;
pub mod escape;
pub mod frame;
pub mod id;
pub mod parser;
pub(crate) mod reader;
pub mod subscription;
pub mod transport;
pub(crate) mod writer;

pub use codec::StompCodec;
pub use config::{ConnectOptions, ConnectionConfig};
pub use connection::{Connection, ConnectionState};
pub use error::{ConnError, ConnectionError, EscapeError, FrameError, ServerError, TransportError};
pub use escape::{escape, unescape};
pub use frame::{Command, Frame, SessionInfo};
pub use id::{IdGenerator, SequentialIds};
pub use subscription::{AckMode, Subscription};
pub use transport::Transport;
