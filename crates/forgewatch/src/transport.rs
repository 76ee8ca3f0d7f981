//! Single-command round trips to the printer.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use crate::codec::TERMINATOR;
use crate::endpoint::PrinterEndpoint;
use crate::error::{Result, TransportError};

/// Largest reply accepted before the read is abandoned.
pub const MAX_RESPONSE_BYTES: usize = 16 * 1024;

/// Sends one request and returns the printer's reply.
///
/// Implementations open a fresh connection per call and must close it before
/// returning, whatever the outcome. They never retry.
pub trait Transport: Send + Sync + 'static {
    /// Write `request` and read until the reply terminator or `timeout`.
    fn send(
        &self,
        endpoint: &PrinterEndpoint,
        request: &[u8],
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn send(
        &self,
        endpoint: &PrinterEndpoint,
        request: &[u8],
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send {
        (**self).send(endpoint, request, timeout)
    }
}

/// TCP transport for the FlashForge command port.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport;

impl TcpTransport {
    /// Create a transport.
    pub fn new() -> Self {
        Self
    }
}

impl Transport for TcpTransport {
    async fn send(
        &self,
        endpoint: &PrinterEndpoint,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        // The stream is owned by the inner future, so it is closed on drop
        // whether the exchange finishes, fails or is cut off by the timeout.
        match tokio::time::timeout(timeout, exchange(endpoint, request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout.as_millis() as u64)),
        }
    }
}

async fn exchange(endpoint: &PrinterEndpoint, request: &[u8]) -> Result<Vec<u8>> {
    let mut stream = TcpStream::connect((endpoint.host(), endpoint.port()))
        .await
        .map_err(|e| TransportError::ConnectionRefused(format!("{endpoint}: {e}")))?;

    stream
        .write_all(request)
        .await
        .map_err(|e| TransportError::ReadError(format!("write failed: {e}")))?;

    let response = read_reply(&mut stream).await;
    let _ = stream.shutdown().await;
    response
}

async fn read_reply(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(512);
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| TransportError::ReadError(e.to_string()))?;
        if n == 0 {
            return Err(TransportError::ReadError(
                "connection closed before terminator".into(),
            ));
        }
        if buf.len() + n > MAX_RESPONSE_BYTES {
            return Err(TransportError::ReadError(format!(
                "response exceeds {MAX_RESPONSE_BYTES} bytes"
            )));
        }
        buf.extend_from_slice(&chunk[..n]);
        trace!(len = buf.len(), "read chunk");

        if ends_with_terminator_line(&buf) {
            return Ok(buf);
        }
    }
}

/// The terminator only counts as a whole line, not as the tail of one
/// (`CurrentFile: notebook`).
fn ends_with_terminator_line(buf: &[u8]) -> bool {
    match buf.strip_suffix(TERMINATOR) {
        Some(head) => head.is_empty() || head.ends_with(b"\n"),
        None => false,
    }
}
