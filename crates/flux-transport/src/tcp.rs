//! Raw TCP transport for game clients.
//!
//! Game clients write delimited records (`/key=value/...$`) straight onto
//! the socket. TCP has no message boundaries, so [`TcpConnection::recv`]
//! reassembles the byte stream into one record per call, splitting after
//! every `$`.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Record terminator on the game-client wire.
const TERMINATOR: u8 = b'$';

/// Upper bound on buffered bytes without a terminator.
const MAX_FRAME_LEN: usize = 64 * 1024;

const READ_CHUNK: usize = 1024;

/// A TCP [`Transport`] for game clients.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self { listener })
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%addr, error = %e, "failed to set TCP_NODELAY");
        }

        let id = ConnectionId::next();
        tracing::debug!(%id, %addr, "accepted TCP connection");

        let (reader, writer) = stream.into_split();
        Ok(TcpConnection {
            id,
            reader: Mutex::new(FrameReader {
                half: reader,
                buffer: Vec::with_capacity(READ_CHUNK),
                eof: false,
            }),
            writer: Mutex::new(writer),
        })
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Read half plus the bytes received but not yet handed out.
struct FrameReader {
    half: OwnedReadHalf,
    buffer: Vec<u8>,
    eof: bool,
}

impl FrameReader {
    /// Removes the next complete record from the buffer, if any.
    ///
    /// Whitespace between records (some clients send `$\n`) is dropped.
    fn take_frame(&mut self) -> Option<Vec<u8>> {
        let start = self
            .buffer
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(self.buffer.len());
        self.buffer.drain(..start);

        let end = self.buffer.iter().position(|b| *b == TERMINATOR)?;
        Some(self.buffer.drain(..=end).collect())
    }

    async fn next_frame(
        &mut self,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            if let Some(frame) = self.take_frame() {
                return Ok(Some(frame));
            }
            if self.eof {
                // Hand out a trailing unterminated record once.
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(std::mem::take(&mut self.buffer)));
            }
            if self.buffer.len() >= MAX_FRAME_LEN {
                return Err(TransportError::FrameTooLarge {
                    limit: MAX_FRAME_LEN,
                });
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self
                .half
                .read(&mut chunk)
                .await
                .map_err(TransportError::ReceiveFailed)?;
            if n == 0 {
                self.eof = true;
            } else {
                self.buffer.extend_from_slice(&chunk[..n]);
            }
        }
    }
}

/// A single game-client TCP connection.
pub struct TcpConnection {
    id: ConnectionId,
    reader: Mutex<FrameReader>,
    writer: Mutex<OwnedWriteHalf>,
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(data)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        self.reader.lock().await.next_frame().await
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
