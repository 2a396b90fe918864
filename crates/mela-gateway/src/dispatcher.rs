use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;

use mela_types::events::{GatewayEvent, Room};

/// A gateway event together with its delivery scope. `room: None` means the
/// event goes to every connected client.
#[derive(Debug, Clone)]
pub struct RoomMessage {
    pub room: Option<Room>,
    pub event: GatewayEvent,
}

/// Fans gateway events out to all connections. Each connection filters by
/// its own room memberships; delivery is at-most-once and lagging receivers
/// are skipped past, so message loss on a slow or dropped connection is
/// accepted.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<RoomMessage>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to the event stream. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomMessage> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to every connected client.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(RoomMessage { room: None, event });
    }

    /// Broadcast an event to clients that joined `room`.
    pub fn broadcast_to(&self, room: Room, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(RoomMessage {
            room: Some(room),
            event,
        });
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection-side delivery check: room-scoped messages reach only members,
/// unscoped messages reach everyone.
pub fn should_deliver(rooms: &HashSet<Room>, msg: &RoomMessage) -> bool {
    match msg.room {
        Some(room) => rooms.contains(&room),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ride_started() -> GatewayEvent {
        GatewayEvent::RideStarted {
            ride_request_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn room_scoped_messages_only_reach_members() {
        let event_id = Uuid::new_v4();
        let mut member = HashSet::new();
        member.insert(Room::Event(event_id));
        let outsider: HashSet<Room> = HashSet::new();

        let scoped = RoomMessage {
            room: Some(Room::Event(event_id)),
            event: ride_started(),
        };
        assert!(should_deliver(&member, &scoped));
        assert!(!should_deliver(&outsider, &scoped));

        let global = RoomMessage {
            room: None,
            event: ride_started(),
        };
        assert!(should_deliver(&member, &global));
        assert!(should_deliver(&outsider, &global));
    }

    #[tokio::test]
    async fn every_subscriber_sees_a_broadcast() {
        let dispatcher = Dispatcher::new();
        let mut rx_a = dispatcher.subscribe();
        let mut rx_b = dispatcher.subscribe();

        dispatcher.broadcast_to(Room::RidesFeed, ride_started());

        for rx in [&mut rx_a, &mut rx_b] {
            let msg = rx.recv().await.unwrap();
            assert_eq!(msg.room, Some(Room::RidesFeed));
        }
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_is_dropped() {
        let dispatcher = Dispatcher::new();
        // No receivers: the send is a no-op rather than an error.
        dispatcher.broadcast(ride_started());
    }
}
