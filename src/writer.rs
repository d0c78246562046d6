use bytes::BytesMut;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::codec::Encoder;

use crate::codec::StompCodec;
use crate::connection::Shared;
use crate::error::ConnError;
use crate::frame::Frame;

/// Write side of the connection.
///
/// Frames leave in queue order, one at a time. A frame that fails to encode
/// or write is reported with the frame attached and the loop moves on. When
/// the connection closes or every sender is dropped the connection is marked
/// closed and the write half is shut down.
pub(crate) async fn writer_loop<W>(
    mut writer: W,
    mut codec: StompCodec,
    mut outbound: mpsc::Receiver<Frame>,
    shared: Arc<Shared>,
) where
    W: AsyncWrite + Unpin,
{
    let mut state = shared.state.subscribe();
    let mut buf = BytesMut::new();

    loop {
        if state.borrow_and_update().is_closed() {
            break;
        }

        let frame = tokio::select! {
            biased;
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            frame = outbound.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        buf.clear();
        if let Err(e) = Encoder::<&Frame>::encode(&mut codec, &frame, &mut buf) {
            shared.errors.report(Some(frame), ConnError::Frame(e));
            continue;
        }

        let written = async {
            writer.write_all(&buf).await?;
            writer.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                tracing::trace!(connection = %shared.label, command = %frame.command, "frame written");
            }
            Err(e) => shared.errors.report(Some(frame), ConnError::from(e)),
        }
    }

    // Also reached when every handle is dropped without a disconnect.
    shared.close().await;
    if let Err(e) = writer.shutdown().await {
        tracing::debug!(connection = %shared.label, error = %e, "transport shutdown failed");
    }
    tracing::debug!(connection = %shared.label, "writer stopped");
}
