//! Outbound event delivery.

use stakeroom_protocol::ServerEvent;
use stakeroom_transport::ConnectionId;
use tokio::sync::mpsc;

/// Where the lifecycle manager pushes events for participants.
///
/// Delivery is fire-and-forget: an event for a connection that has gone
/// away is dropped. Implementations must not block.
pub trait EventSink: Send + Sync + 'static {
    fn deliver(&self, to: ConnectionId, event: ServerEvent);
}

/// Funnels every event into one channel. Handy for tests and for
/// routing through a single task.
impl EventSink for mpsc::UnboundedSender<(ConnectionId, ServerEvent)> {
    fn deliver(&self, to: ConnectionId, event: ServerEvent) {
        let _ = self.send((to, event));
    }
}
