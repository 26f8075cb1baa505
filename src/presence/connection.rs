//! Handle to one live connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::presence::protocol::ServerFrame;

/// Unique connection identifier.
pub type ConnectionId = Uuid;

/// Default per-connection outbound queue depth.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 32;

/// A handle to a single live connection.
///
/// Outbound frames go through a bounded queue drained by the connection's
/// writer, so per-connection order is preserved and a slow client never
/// blocks a broadcast. Closing cancels the connection's token, which its
/// reader and writer both watch.
#[derive(Debug)]
pub struct PresenceConnection {
    id: ConnectionId,
    sender: mpsc::Sender<ServerFrame>,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

impl PresenceConnection {
    /// Creates a connection handle and the receiver its writer drains.
    pub fn channel(buffer: usize) -> (Arc<Self>, mpsc::Receiver<ServerFrame>) {
        let (sender, receiver) = mpsc::channel(buffer);
        let connection = Arc::new(Self {
            id: Uuid::new_v4(),
            sender,
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        });
        (connection, receiver)
    }

    /// The connection's identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues a frame. Returns `false` if the connection is closed or its
    /// queue is full.
    pub fn send(&self, frame: ServerFrame) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(conn_id = %self.id, "Outbound queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.close();
                false
            }
        }
    }

    /// Closes the connection. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::SeqCst);
        if first {
            self.shutdown.cancel();
            tracing::debug!(conn_id = %self.id, "Live connection closed");
        }
        first
    }

    /// Whether the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        self.shutdown.cancelled().await
    }
}
