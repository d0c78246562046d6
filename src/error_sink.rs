use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::{ConnError, ConnectionError};
use crate::frame::Frame;

/// Collects errors raised by the read and write loops.
///
/// Reporting never waits: when the queue is full the event is logged and
/// dropped.
#[derive(Clone)]
pub(crate) struct ErrorSink {
    connection: Arc<str>,
    tx: mpsc::Sender<ConnectionError>,
}

impl ErrorSink {
    pub(crate) fn new(
        connection: &str,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<ConnectionError>) {
        let (tx, rx) = mpsc::channel(capacity);
        let sink = Self {
            connection: Arc::from(connection),
            tx,
        };
        (sink, rx)
    }

    pub(crate) fn report(&self, frame: Option<Frame>, cause: ConnError) {
        tracing::warn!(
            connection = %self.connection,
            command = ?frame.as_ref().map(|f| f.command),
            error = %cause,
            "connection error"
        );
        let event = ConnectionError::new(self.connection.as_ref(), frame, cause);
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                tracing::debug!(connection = %self.connection, "error queue full, dropping: {}", dropped);
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
