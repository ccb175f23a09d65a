//! # Transport
//!
//! One short-lived TCP connection per request. A [`Connector`] opens the stream, the caller
//! writes a request with [`send_request`] and collects the answer with [`read_reply`]. Dropping
//! the stream closes the connection.
//!
//! No retrying happens here. Every failure is reported once as a [`NetworkError`] and the login
//! state machine decides what to do about it.

use crate::error_handling::types::NetworkError;
use log::{debug, trace};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;

/// Upper bound for every connect, write and read step.
pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Replies are truncated after this many bytes.
pub const MAX_REPLY_SIZE: usize = 8192;

/// Opens connections to the login server.
///
/// The production implementation is [`TcpConnector`]. Tests provide scripted in-memory streams
/// instead.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Stream: AsyncRead + AsyncWrite + Unpin;

    /// Opens a connection to `host:port`.
    ///
    /// # Errors
    ///
    /// * `NetworkError::DnsFailure` if `host` does not resolve
    /// * `NetworkError::ConnectFailure` if the connection is refused or otherwise fails
    /// * `NetworkError::ConnectTimeout` if no connection is made within [`IO_TIMEOUT`]
    async fn connect(&self, host: &str, port: u16) -> Result<Self::Stream, NetworkError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> Result<TcpStream, NetworkError> {
        let addr = lookup_host((host, port))
            .await
            .map_err(|e| NetworkError::DnsFailure {
                host: host.to_string(),
                source: Some(e),
            })?
            .next()
            .ok_or_else(|| NetworkError::DnsFailure {
                host: host.to_string(),
                source: None,
            })?;

        debug!("Connecting to {} ({})", host, addr);
        match timeout(IO_TIMEOUT, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(NetworkError::ConnectFailure {
                host: host.to_string(),
                source: e,
            }),
            Err(_) => Err(NetworkError::ConnectTimeout(host.to_string())),
        }
    }
}

/// Writes the whole request and flushes it.
///
/// # Errors
///
/// * `NetworkError::SendFailed` on a write error
/// * `NetworkError::WriteTimeout` if the peer does not accept the data within [`IO_TIMEOUT`]
pub async fn send_request<S>(stream: &mut S, request: &[u8]) -> Result<(), NetworkError>
where
    S: AsyncWrite + Unpin,
{
    trace!("Sending:\n{}", String::from_utf8_lossy(request));

    let write = async {
        stream.write_all(request).await?;
        stream.flush().await
    };
    match timeout(IO_TIMEOUT, write).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(NetworkError::SendFailed(e)),
        Err(_) => Err(NetworkError::WriteTimeout),
    }
}

/// Reads the server's reply.
///
/// Reading stops at end of stream, at [`MAX_REPLY_SIZE`] bytes, or when the server goes quiet
/// for [`IO_TIMEOUT`] after having sent something. The gateways do not always close the
/// connection after answering.
///
/// # Errors
///
/// * `NetworkError::ReceiveFailed` on a read error
/// * `NetworkError::ReadTimeout` if nothing at all arrives within [`IO_TIMEOUT`]
pub async fn read_reply<S>(stream: &mut S) -> Result<Vec<u8>, NetworkError>
where
    S: AsyncRead + Unpin,
{
    let mut reply = Vec::new();
    let mut chunk = [0u8; 1024];

    while reply.len() < MAX_REPLY_SIZE {
        match timeout(IO_TIMEOUT, stream.read(&mut chunk)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                let room = MAX_REPLY_SIZE - reply.len();
                reply.extend_from_slice(&chunk[..n.min(room)]);
            }
            Ok(Err(e)) => return Err(NetworkError::ReceiveFailed(e)),
            Err(_) if reply.is_empty() => return Err(NetworkError::ReadTimeout),
            Err(_) => break,
        }
    }

    trace!("Received:\n{}", String::from_utf8_lossy(&reply));
    Ok(reply)
}
