//! Client handles: the write side of one connection.
//!
//! A [`ClientHandle`] is what the rest of the relay holds for a client.
//! It never touches the socket. Writes go into a bounded queue that the
//! connection's writer task drains through the matching [`Outbox`], so a
//! slow client can never stall a broadcast.

use std::fmt;
use std::sync::Arc;

use flux_protocol::{ProtocolError, WireEncode, WireFormat};
use flux_transport::ConnectionId;
use tokio::sync::{mpsc, watch};

use crate::HubError;

/// Cloneable capability to enqueue bytes for one client and to close it.
///
/// Identity is the [`ConnectionId`]: two handles are equal when they
/// refer to the same connection.
#[derive(Clone)]
pub struct ClientHandle {
    id: ConnectionId,
    format: WireFormat,
    outbox: mpsc::Sender<Vec<u8>>,
    closed: Arc<watch::Sender<bool>>,
}

/// The receiving end of a client's output queue.
///
/// Owned by the connection's writer task.
pub struct Outbox {
    id: ConnectionId,
    receiver: mpsc::Receiver<Vec<u8>>,
    closed: watch::Receiver<bool>,
}

impl ClientHandle {
    /// Creates a handle and its outbox with room for `capacity` queued
    /// messages.
    pub fn new(
        id: ConnectionId,
        format: WireFormat,
        capacity: usize,
    ) -> (Self, Outbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (closed_tx, closed_rx) = watch::channel(false);
        let handle = Self {
            id,
            format,
            outbox: tx,
            closed: Arc::new(closed_tx),
        };
        let outbox = Outbox {
            id,
            receiver: rx,
            closed: closed_rx,
        };
        (handle, outbox)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The format this client's population speaks.
    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Enqueues already-encoded bytes without waiting.
    ///
    /// # Errors
    /// - [`HubError::Full`]: the queue is at capacity
    /// - [`HubError::Closed`]: the client was closed
    pub fn try_write(&self, bytes: Vec<u8>) -> Result<(), HubError> {
        if self.is_closed() {
            return Err(HubError::Closed(self.id));
        }
        self.outbox.try_send(bytes).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => HubError::Full(self.id),
            mpsc::error::TrySendError::Closed(_) => HubError::Closed(self.id),
        })
    }

    /// Encodes `value` in this client's format and enqueues it.
    pub fn send<T: WireEncode + ?Sized>(
        &self,
        value: &T,
    ) -> Result<(), SendError> {
        let bytes = self.format.encode(value)?;
        self.try_write(bytes)?;
        Ok(())
    }

    /// Closes the client. Queued messages are still delivered, then the
    /// outbox ends. Idempotent.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once [`close`](Self::close) has been called on any clone.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        // The sender lives in `self`, so `wait_for` cannot fail here.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl PartialEq for ClientHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClientHandle {}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("format", &self.format)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Outbox {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Waits for the next message to write.
    ///
    /// Returns `None` once the client is closed and the queue is drained,
    /// or when every handle has been dropped.
    pub async fn next(&mut self) -> Option<Vec<u8>> {
        if *self.closed.borrow() {
            return self.receiver.try_recv().ok();
        }
        tokio::select! {
            biased;
            msg = self.receiver.recv() => return msg,
            _ = self.closed.wait_for(|closed| *closed) => {}
        }
        self.receiver.try_recv().ok()
    }
}

/// Failure of [`ClientHandle::send`]: either encoding or enqueueing.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Hub(#[from] HubError),
}
