//! In-process broker used by the connection tests.
//!
//! The client side of a `tokio::io::duplex` pipe goes to
//! `Connection::from_transport`; the test drives the other side through a
//! `Framed` stream using the crate's own codec.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use iridium_stomp_client::{
    Command, ConnectOptions, Connection, ConnectionConfig, Frame, SessionInfo, StompCodec,
    Transport,
};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio_util::codec::Framed;

/// Upper bound on any single wait in the tests.
pub const WAIT: Duration = Duration::from_secs(2);

pub fn config() -> ConnectionConfig {
    ConnectionConfig::default()
        .with_response_timeout(Duration::from_millis(200))
        .with_read_timeout(Duration::from_millis(20))
}

pub struct MockBroker {
    framed: Framed<DuplexStream, StompCodec>,
}

/// A client connection wired to a fresh mock broker.
pub fn pair(config: ConnectionConfig) -> (Connection, MockBroker) {
    pair_over(config, |client| client)
}

/// Like `pair`, with the client end of the pipe wrapped by `wrap`.
pub fn pair_over<T, F>(config: ConnectionConfig, wrap: F) -> (Connection, MockBroker)
where
    T: Transport,
    F: FnOnce(DuplexStream) -> T,
{
    let (client, server) = tokio::io::duplex(64 * 1024);
    let conn = Connection::from_transport(wrap(client), config);
    let broker = MockBroker {
        framed: Framed::new(server, StompCodec::new()),
    };
    (conn, broker)
}

/// A pair that has already completed the CONNECT/CONNECTED exchange.
pub async fn connected_pair() -> (Connection, MockBroker) {
    let (conn, mut broker) = pair(config());
    let session = broker.handshake(&conn).await;
    assert_eq!(session.session_id.as_deref(), Some("session-1"));
    (conn, broker)
}

/// RECEIPT answering a frame that carried a `receipt` header.
pub fn receipt_for(frame: &Frame) -> Frame {
    let id = frame.get_header("receipt").expect("frame has no receipt header");
    Frame::new(Command::Receipt).header("receipt-id", id)
}

pub fn message(destination: &str, body: &str) -> Frame {
    Frame::new(Command::Message)
        .header("destination", destination)
        .header("message-id", "m-1")
        .header("subscription", "sub-0")
        .set_body(body.as_bytes().to_vec())
}

impl MockBroker {
    /// Next frame the client wrote.
    pub async fn recv(&mut self) -> Frame {
        match tokio::time::timeout(WAIT, self.framed.next()).await {
            Ok(Some(Ok(frame))) => frame,
            other => panic!("broker expected a frame, got {:?}", other),
        }
    }

    pub async fn expect(&mut self, command: Command) -> Frame {
        let frame = self.recv().await;
        assert_eq!(frame.command, command, "unexpected frame: {}", frame);
        frame
    }

    pub async fn reply(&mut self, frame: Frame) {
        self.framed.send(frame).await.expect("broker write failed");
    }

    /// Write bytes as-is, bypassing the encoder.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        let io = self.framed.get_mut();
        io.write_all(bytes).await.expect("broker write failed");
        io.flush().await.expect("broker flush failed");
    }

    /// Assert the client writes nothing for `period`.
    pub async fn assert_silent(&mut self, period: Duration) {
        if let Ok(next) = tokio::time::timeout(period, self.framed.next()).await {
            panic!("expected no frame, got {:?}", next);
        }
    }

    /// Wait for the client to close its side of the pipe.
    pub async fn expect_closed(&mut self) {
        match tokio::time::timeout(WAIT, self.framed.next()).await {
            Ok(None) => {}
            other => panic!("expected the client to close, got {:?}", other),
        }
    }

    /// Answer the client's CONNECT with a CONNECTED frame.
    pub async fn handshake(&mut self, conn: &Connection) -> SessionInfo {
        let (session, _) = tokio::join!(conn.connect(ConnectOptions::new()), async {
            self.expect(Command::Connect).await;
            self.reply(
                Frame::new(Command::Connected)
                    .header("version", "1.1")
                    .header("session", "session-1")
                    .header("server", "mock/1"),
            )
            .await;
        });
        session.expect("connect failed")
    }

    /// Drop the broker side, closing the pipe.
    pub fn hang_up(self) {
        drop(self.framed);
    }
}
