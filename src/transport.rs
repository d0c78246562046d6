//! Transport adapter: any byte stream the loops can read from and write to.

use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::TcpStream;

use crate::config::ConnectionConfig;
use crate::error::TransportError;

/// A bidirectional byte stream usable as a connection transport.
///
/// Implemented for every `AsyncRead + AsyncWrite` stream that can move to a
/// background task: `TcpStream`, TLS streams, `tokio::io::DuplexStream`, ...
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Dial the broker named by `config`.
pub async fn open_tcp(config: &ConnectionConfig) -> Result<TcpStream, TransportError> {
    let addr = config.addr();
    let stream = TcpStream::connect(&addr).await?;
    stream.set_nodelay(true)?;
    tracing::debug!(connection = %addr, "tcp connection opened");
    Ok(stream)
}

/// Read whatever is available into `buf`, waiting at most `deadline`.
///
/// Returns the number of bytes read; `TransportError::Closed` on end of
/// stream and `TransportError::Timeout` when the deadline passes first.
pub async fn read_with_deadline<R>(
    reader: &mut R,
    buf: &mut BytesMut,
    deadline: Duration,
) -> Result<usize, TransportError>
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(deadline, reader.read_buf(buf)).await {
        Err(_) => Err(TransportError::Timeout),
        Ok(Ok(0)) => Err(TransportError::Closed),
        Ok(Ok(n)) => Ok(n),
        Ok(Err(e)) => Err(e.into()),
    }
}
