use futures::future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use crate::codec::StompCodec;
use crate::config::{ConnectOptions, ConnectionConfig};
use crate::correlator::{Correlator, Reply, ReplyKey, await_reply};
use crate::error::{ConnError, ConnectionError, ServerError};
use crate::error_sink::ErrorSink;
use crate::frame::{Command, Frame, SessionInfo};
use crate::reader::reader_loop;
use crate::subscription::{AckMode, Subscription, SubscriptionRegistry};
use crate::transport::{self, Transport};
use crate::writer::writer_loop;

/// Lifecycle of a `Connection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Background loops are running; no STOMP session yet.
    Open,
    /// CONNECTED was received.
    Connected,
    /// Loops stopped or stopping; the transport is closed. Terminal.
    Closed,
}

impl ConnectionState {
    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

/// State shared between the `Connection` handles and the two background
/// loops. Holds no I/O handle.
pub(crate) struct Shared {
    pub(crate) label: String,
    pub(crate) state: watch::Sender<ConnectionState>,
    pub(crate) session: Mutex<Option<SessionInfo>>,
    pub(crate) correlator: Correlator,
    pub(crate) subscriptions: SubscriptionRegistry,
    pub(crate) errors: ErrorSink,
    pub(crate) inbound_tx: mpsc::Sender<Frame>,
}

impl Shared {
    /// Move to `Closed`, fail every pending reply slot, close the delivery
    /// queues and forget the session. Safe to call more than once.
    pub(crate) async fn close(&self) {
        let previous = self.state.send_replace(ConnectionState::Closed);
        self.correlator.fail_all().await;
        self.subscriptions.clear().await;
        self.session.lock().await.take();
        if !previous.is_closed() {
            tracing::info!(connection = %self.label, "connection closed");
        }
    }
}

/// High-level handle on one broker session.
///
/// `Connection` owns a reader task and a writer task over a single transport.
/// Request/response operations (`connect`, `disconnect`, receipted `send`,
/// `subscribe`) register a reply slot, queue their frame and wait for the
/// matching reply or the response timeout. Handles are cheap to clone and all
/// clones drive the same session.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
    outbound_tx: mpsc::Sender<Frame>,
    /// Shared behind a mutex so clones can call `next_frame` concurrently.
    inbound_rx: Arc<Mutex<mpsc::Receiver<Frame>>>,
    error_rx: Arc<Mutex<mpsc::Receiver<ConnectionError>>>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    config: Arc<ConnectionConfig>,
}

impl Connection {
    /// Dial `config.host:config.port` over TCP and start the background loops.
    ///
    /// The returned connection is `Open`; call `connect` to start the STOMP
    /// session.
    pub async fn open(config: ConnectionConfig) -> Result<Self, ConnError> {
        tracing::info!(connection = %config.addr(), "opening connection");
        let stream = transport::open_tcp(&config).await?;
        Ok(Self::from_transport(stream, config))
    }

    /// Start the background loops over an already established transport.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_transport<T: Transport>(transport: T, config: ConnectionConfig) -> Self {
        let (read_half, write_half) = tokio::io::split(transport);
        let (mut conn, outbound_rx) = Self::build(config);

        let reader = tokio::spawn(reader_loop(
            read_half,
            StompCodec::with_max_frame_size(conn.config.max_frame_size),
            conn.shared.clone(),
            conn.config.read_timeout,
        ));
        let writer = tokio::spawn(writer_loop(
            write_half,
            StompCodec::with_max_frame_size(conn.config.max_frame_size),
            outbound_rx,
            conn.shared.clone(),
        ));
        conn.tasks = Arc::new(Mutex::new(vec![reader, writer]));
        conn
    }

    /// Queues and shared state, without any task attached.
    fn build(config: ConnectionConfig) -> (Self, mpsc::Receiver<Frame>) {
        let label = config.addr();
        let (outbound_tx, outbound_rx) = mpsc::channel(config.queue_capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity);
        let (errors, error_rx) = ErrorSink::new(&label, config.error_capacity);
        let (state, _) = watch::channel(ConnectionState::Open);

        let shared = Arc::new(Shared {
            label,
            state,
            session: Mutex::new(None),
            correlator: Correlator::new(),
            subscriptions: SubscriptionRegistry::new(),
            errors,
            inbound_tx,
        });

        let conn = Connection {
            shared,
            outbound_tx,
            inbound_rx: Arc::new(Mutex::new(inbound_rx)),
            error_rx: Arc::new(Mutex::new(error_rx)),
            tasks: Arc::new(Mutex::new(Vec::new())),
            config: Arc::new(config),
        };
        (conn, outbound_rx)
    }

    /// Start the STOMP session.
    ///
    /// Parameters
    /// - `options`: CONNECT headers. `accept-version` defaults to `"1.1"` and
    ///   `host` to the configured broker host when not supplied.
    ///
    /// Returns the session details from the CONNECTED reply. An ERROR reply
    /// yields `ConnError::Protocol`; no reply within the response timeout
    /// yields `ConnError::ResponseTimeout`. In both cases the connection stays
    /// `Open` and is not marked connected.
    pub async fn connect(&self, options: ConnectOptions) -> Result<SessionInfo, ConnError> {
        let frame = options.into_frame(&self.config.host);
        tracing::debug!(connection = %self.shared.label, "sending CONNECT");

        let reply = self
            .request(frame, ReplyKey::Connected, Command::Connect)
            .await?;

        match reply.command {
            Command::Connected => {
                let info = SessionInfo::from_frame(&reply);
                *self.shared.session.lock().await = Some(info.clone());
                let promoted = self.shared.state.send_if_modified(|state| {
                    if state.is_closed() {
                        false
                    } else {
                        *state = ConnectionState::Connected;
                        true
                    }
                });
                if !promoted {
                    self.shared.session.lock().await.take();
                    return Err(ConnError::Closed);
                }
                tracing::info!(
                    connection = %self.shared.label,
                    session = info.session_id.as_deref().unwrap_or(""),
                    version = info.version.as_deref().unwrap_or(""),
                    "connected"
                );
                Ok(info)
            }
            Command::Error => Err(ConnError::Protocol(ServerError::from_frame(reply))),
            got => Err(ConnError::UnexpectedReply {
                request: Command::Connect,
                got,
            }),
        }
    }

    /// End the session and close the transport.
    ///
    /// Sends DISCONNECT with a generated `receipt` and waits for the matching
    /// RECEIPT, an ERROR, or the response timeout. Whatever the outcome, both
    /// loops are stopped and joined, the transport is closed and the session
    /// is cleared; a timeout or ERROR is still returned to the caller.
    pub async fn disconnect(&self) -> Result<(), ConnError> {
        self.ensure_open()?;
        let receipt = self.config.id_generator.generate_id();
        tracing::info!(connection = %self.shared.label, receipt = %receipt, "disconnecting");

        let frame = Frame::new(Command::Disconnect).receipt(receipt.clone());
        let outcome = self.confirm(frame, receipt).await;
        self.shutdown().await;
        outcome
    }

    async fn shutdown(&self) {
        self.shared.close().await;
        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for joined in future::join_all(tasks).await {
            if let Err(e) = joined {
                tracing::warn!(connection = %self.shared.label, error = %e, "background task failed");
            }
        }
    }

    /// Send `body` to `destination` without waiting for the broker.
    pub async fn send(&self, destination: &str, body: impl Into<Vec<u8>>) -> Result<(), ConnError> {
        self.send_with_headers(destination, body, std::iter::empty::<(String, String)>())
            .await
    }

    /// Send `body` to `destination` with extra headers.
    ///
    /// When `headers` contains `receipt`, the call resolves only once the
    /// broker answers with the matching RECEIPT (`Ok`), an ERROR
    /// (`ConnError::Protocol`) or not at all (`ConnError::ResponseTimeout`).
    /// Without it the call returns as soon as the frame is queued.
    pub async fn send_with_headers<I, K, V>(
        &self,
        destination: &str,
        body: impl Into<Vec<u8>>,
        headers: I,
    ) -> Result<(), ConnError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        if destination.is_empty() {
            return Err(ConnError::MissingHeader("destination"));
        }
        let mut frame = Frame::new(Command::Send);
        for (k, v) in headers {
            frame.set_header(k, v);
        }
        frame.set_header("destination", destination);
        let frame = frame.set_body(body);
        frame.validate()?;

        match frame.get_header("receipt").map(str::to_string) {
            Some(receipt) => {
                tracing::debug!(destination, receipt = %receipt, "send awaiting receipt");
                self.confirm(frame, receipt).await
            }
            None => self.submit(frame).await,
        }
    }

    /// Queue a raw frame for the writer. No reply is awaited.
    pub async fn send_frame(&self, frame: Frame) -> Result<(), ConnError> {
        frame.validate()?;
        self.submit(frame).await
    }

    /// Subscribe to `destination` with `ack:auto`.
    pub async fn subscribe(&self, destination: &str) -> Result<Subscription, ConnError> {
        self.subscribe_with_headers(destination, std::iter::empty::<(String, String)>())
            .await
    }

    pub async fn subscribe_with_ack(
        &self,
        destination: &str,
        ack: AckMode,
    ) -> Result<Subscription, ConnError> {
        self.subscribe_with_headers(destination, [("ack", ack.as_str())])
            .await
    }

    /// Subscribe to `destination`, returning a handle on its delivery queue.
    ///
    /// Parameters
    /// - `destination`: destination to listen to.
    /// - `headers`: extra SUBSCRIBE headers. `ack` must be one of `auto`,
    ///   `client` or `client-individual` (defaults to `auto`); `id` is
    ///   generated when absent; `receipt` makes the call wait for the broker's
    ///   confirmation.
    ///
    /// A destination is subscribed at most once per connection: while a handle
    /// on its queue is alive, that queue is returned and nothing is sent. Once
    /// every handle is dropped, messages for the destination go to
    /// `next_frame` and the next call subscribes afresh.
    /// Concurrent calls for the same destination are serialized so the second
    /// one sees the first one's queue.
    pub async fn subscribe_with_headers<I, K, V>(
        &self,
        destination: &str,
        headers: I,
    ) -> Result<Subscription, ConnError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        if destination.is_empty() {
            return Err(ConnError::MissingHeader("destination"));
        }
        self.ensure_open()?;

        let gate = self.shared.subscriptions.gate(destination);
        let _guard = gate.lock().await;

        if let Some(existing) = self.shared.subscriptions.get(destination).await {
            tracing::debug!(destination, id = existing.id(), "already subscribed");
            return Ok(existing);
        }

        let mut frame = Frame::new(Command::Subscribe);
        for (k, v) in headers {
            frame.set_header(k, v);
        }
        frame.set_header("destination", destination);

        let ack = match frame.get_header("ack") {
            Some(value) => value.parse::<AckMode>()?,
            None => AckMode::Auto,
        };
        frame.set_header("ack", ack.as_str());

        let id = match frame.get_header("id") {
            Some(id) => id.to_string(),
            None => {
                let id = self.config.id_generator.generate_id();
                frame.set_header("id", id.clone());
                id
            }
        };
        frame.validate()?;

        // Registered before the frame leaves so the first MESSAGE cannot
        // outrun it.
        let (tx, rx) = mpsc::channel(self.config.delivery_capacity);
        let handle = Subscription::new(id, destination.to_string(), ack, rx);
        self.shared.subscriptions.insert(tx, &handle).await;

        let sent = match frame.get_header("receipt").map(str::to_string) {
            Some(receipt) => self.confirm(frame, receipt).await,
            None => self.submit(frame).await,
        };
        if let Err(e) = sent {
            self.shared.subscriptions.remove(destination).await;
            return Err(e);
        }

        tracing::debug!(destination, id = handle.id(), ack = %ack, "subscribed");
        Ok(handle)
    }

    /// Acknowledge a message delivered under `subscription_id`.
    ///
    /// The message is identified with `id` on STOMP 1.2 sessions and
    /// `message-id` otherwise.
    pub async fn ack(&self, subscription_id: &str, message_id: &str) -> Result<(), ConnError> {
        let frame = self
            .ack_frame(Command::Ack, subscription_id, message_id)
            .await;
        self.submit(frame).await
    }

    /// Negative-acknowledge a message. See `ack`.
    pub async fn nack(&self, subscription_id: &str, message_id: &str) -> Result<(), ConnError> {
        let frame = self
            .ack_frame(Command::Nack, subscription_id, message_id)
            .await;
        self.submit(frame).await
    }

    async fn ack_frame(&self, command: Command, subscription_id: &str, message_id: &str) -> Frame {
        let v12 = self
            .shared
            .session
            .lock()
            .await
            .as_ref()
            .and_then(|s| s.version.as_deref())
            == Some("1.2");
        let id_header = if v12 { "id" } else { "message-id" };
        Frame::new(command)
            .header(id_header, message_id)
            .header("subscription", subscription_id)
    }

    /// Begin a transaction. SEND, ACK and NACK frames carrying the same
    /// `transaction` header belong to it until `commit` or `abort`.
    pub async fn begin(&self, transaction_id: &str) -> Result<(), ConnError> {
        self.transaction_frame(Command::Begin, transaction_id).await
    }

    pub async fn commit(&self, transaction_id: &str) -> Result<(), ConnError> {
        self.transaction_frame(Command::Commit, transaction_id)
            .await
    }

    pub async fn abort(&self, transaction_id: &str) -> Result<(), ConnError> {
        self.transaction_frame(Command::Abort, transaction_id).await
    }

    async fn transaction_frame(&self, command: Command, transaction_id: &str) -> Result<(), ConnError> {
        self.submit(Frame::new(command).header("transaction", transaction_id))
            .await
    }

    /// Next inbound frame that was neither a subscription delivery nor a
    /// reply to a pending request. `None` once the reader has stopped and the
    /// queue is drained.
    pub async fn next_frame(&self) -> Option<Frame> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await
    }

    /// Next error raised by the background loops.
    pub async fn next_error(&self) -> Option<ConnectionError> {
        let mut rx = self.error_rx.lock().await;
        rx.recv().await
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Session details recorded from CONNECTED; `None` before `connect` and
    /// after the connection closes.
    pub async fn session(&self) -> Option<SessionInfo> {
        self.shared.session.lock().await.clone()
    }

    pub fn response_timeout(&self) -> Duration {
        self.config.response_timeout
    }

    fn ensure_open(&self) -> Result<(), ConnError> {
        if self.state().is_closed() {
            Err(ConnError::Closed)
        } else {
            Ok(())
        }
    }

    async fn submit(&self, frame: Frame) -> Result<(), ConnError> {
        self.ensure_open()?;
        tracing::trace!(connection = %self.shared.label, command = %frame.command, "frame queued");
        self.outbound_tx
            .send(frame)
            .await
            .map_err(|_| ConnError::Closed)
    }

    /// Register a reply slot for `key`, queue `frame` and wait for the reply.
    async fn request(
        &self,
        frame: Frame,
        key: ReplyKey,
        command: Command,
    ) -> Result<Frame, ConnError> {
        let slot = self.shared.correlator.register(key.clone()).await;
        if let Err(e) = self.submit(frame).await {
            self.shared.correlator.cancel(&key).await;
            return Err(e);
        }

        let timeout = self.config.response_timeout;
        match await_reply(slot, timeout).await {
            Reply::Frame(reply) => Ok(reply),
            Reply::TimedOut => {
                self.shared.correlator.cancel(&key).await;
                tracing::debug!(connection = %self.shared.label, %command, ?timeout, "no reply");
                Err(ConnError::ResponseTimeout { command, timeout })
            }
            Reply::Dropped => Err(match key {
                ReplyKey::Receipt(id) => ConnError::ReceiptNotReceived(id),
                ReplyKey::Connected => ConnError::Closed,
            }),
        }
    }

    /// Send `frame` and wait for the RECEIPT answering `receipt`.
    async fn confirm(&self, frame: Frame, receipt: String) -> Result<(), ConnError> {
        let command = frame.command;
        let reply = self
            .request(frame, ReplyKey::Receipt(receipt.clone()), command)
            .await?;
        match reply.command {
            Command::Receipt => Ok(()),
            Command::Error => Err(ConnError::Protocol(ServerError::from_frame(reply))),
            _ => Err(ConnError::ReceiptNotReceived(receipt)),
        }
    }
}
