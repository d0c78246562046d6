use bytes::BytesMut;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::codec::Decoder;

use crate::codec::StompCodec;
use crate::connection::{ConnectionState, Shared};
use crate::error::{ConnError, TransportError};
use crate::frame::{Command, Frame};
use crate::transport::read_with_deadline;

const READ_CHUNK: usize = 8 * 1024;

/// Read side of the connection.
///
/// Runs until the connection state becomes `Closed` or the peer closes the
/// stream. Deadline expiries are silent; other read errors and malformed
/// frames go to the error sink and the loop keeps reading.
pub(crate) async fn reader_loop<R>(
    mut reader: R,
    mut codec: StompCodec,
    shared: Arc<Shared>,
    read_timeout: Duration,
) where
    R: AsyncRead + Unpin,
{
    let mut state = shared.state.subscribe();
    let mut buf = BytesMut::with_capacity(READ_CHUNK);

    'read: loop {
        if state.borrow_and_update().is_closed() {
            break;
        }
        buf.reserve(READ_CHUNK);

        let read = tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            read = read_with_deadline(&mut reader, &mut buf, read_timeout) => read,
        };

        match read {
            Ok(_) => {}
            Err(TransportError::Timeout) => continue,
            Err(e) if e.is_fatal() => {
                if !state.borrow().is_closed() {
                    shared.errors.report(None, ConnError::Transport(e));
                    shared.close().await;
                }
                break;
            }
            Err(e) => {
                shared.errors.report(None, ConnError::Transport(e));
                continue;
            }
        }

        loop {
            match codec.decode(&mut buf) {
                Ok(Some(frame)) => {
                    if !dispatch(&shared, &mut state, frame).await {
                        break 'read;
                    }
                }
                Ok(None) => break,
                Err(e) => shared.errors.report(None, ConnError::Frame(e)),
            }
        }
    }
    tracing::debug!(connection = %shared.label, "reader stopped");
}

/// Route one inbound frame. Returns `false` when the connection shut down
/// while the frame was waiting for a subscriber.
async fn dispatch(
    shared: &Shared,
    state: &mut tokio::sync::watch::Receiver<ConnectionState>,
    frame: Frame,
) -> bool {
    tracing::trace!(connection = %shared.label, command = %frame.command, "frame received");

    let frame = if frame.command == Command::Message {
        match deliver_message(shared, state, frame).await {
            Delivery::Done => return true,
            Delivery::Shutdown => return false,
            Delivery::Unrouted(frame) => frame,
        }
    } else {
        frame
    };

    let Some(frame) = shared.correlator.route(frame).await else {
        return true;
    };

    match shared.inbound_tx.try_send(frame) {
        Ok(()) => {}
        Err(TrySendError::Full(frame)) => {
            tracing::warn!(
                connection = %shared.label,
                command = %frame.command,
                "inbound queue full, dropping unsolicited frame"
            );
        }
        Err(TrySendError::Closed(_)) => {}
    }
    true
}

enum Delivery {
    Done,
    Shutdown,
    Unrouted(Frame),
}

/// Hand a MESSAGE to its destination's subscription queue.
///
/// Waits while the queue is full, so a slow subscriber holds back the
/// whole connection.
async fn deliver_message(
    shared: &Shared,
    state: &mut tokio::sync::watch::Receiver<ConnectionState>,
    frame: Frame,
) -> Delivery {
    let Some(destination) = frame.get_header("destination").map(str::to_string) else {
        return Delivery::Unrouted(frame);
    };
    let Some(sender) = shared.subscriptions.sender(&destination).await else {
        return Delivery::Unrouted(frame);
    };

    loop {
        tokio::select! {
            permit = sender.reserve() => {
                return match permit {
                    Ok(permit) => {
                        permit.send(frame);
                        Delivery::Done
                    }
                    Err(_) => {
                        tracing::debug!(connection = %shared.label, destination = %destination, "subscription handles dropped");
                        shared.subscriptions.remove_closed(&destination).await;
                        Delivery::Unrouted(frame)
                    }
                };
            }
            changed = state.changed() => {
                if changed.is_err() || state.borrow().is_closed() {
                    return Delivery::Shutdown;
                }
            }
        }
    }
}
