//! Open connections and their outbound event queues.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use stakeroom_protocol::ServerEvent;
use stakeroom_room::EventSink;
use stakeroom_transport::ConnectionId;
use tokio::sync::mpsc;

/// Channel sender for delivering events to one connection's task.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Maps each open connection to the queue its handler task drains.
///
/// This is the gateway's fan-out: the lifecycle manager delivers into it,
/// each connection task writes its own queue to the socket.
#[derive(Debug, Default)]
pub struct Directory {
    senders: Mutex<HashMap<ConnectionId, EventSender>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a queue for `conn` and returns its receiving end.
    pub fn register(&self, conn: ConnectionId) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders().insert(conn, tx);
        rx
    }

    pub fn unregister(&self, conn: ConnectionId) {
        self.senders().remove(&conn);
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.senders().len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders().is_empty()
    }

    fn senders(&self) -> MutexGuard<'_, HashMap<ConnectionId, EventSender>> {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for Directory {
    fn deliver(&self, to: ConnectionId, event: ServerEvent) {
        let senders = self.senders();
        match senders.get(&to) {
            Some(tx) => {
                let _ = tx.send(event);
            }
            None => tracing::debug!(conn = %to, "dropping event for closed connection"),
        }
    }
}
