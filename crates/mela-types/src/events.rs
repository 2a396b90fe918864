use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    CancelActor, CheckIn, Event, EventStatus, GeoPoint, SenderType, VehicleType,
};

/// A broadcast room. Connections opt in via gateway commands; events
/// broadcast without a room go to every connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    /// Per-event room, joined with `join:event`.
    Event(Uuid),
    /// The live event feed, joined with `subscribe:events`.
    EventsFeed,
    /// The ride-request feed for online riders, joined with `subscribe:rides`.
    RidesFeed,
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication.
    #[serde(rename = "ready")]
    Ready { user_id: Uuid, email: String },

    #[serde(rename = "user:joined")]
    UserJoined {
        event_id: Uuid,
        user_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "user:left")]
    UserLeft { event_id: Uuid, user_id: Uuid },

    #[serde(rename = "message:new")]
    MessageNew {
        id: Uuid,
        user_id: Option<Uuid>,
        event_id: Uuid,
        message: String,
        sender_type: SenderType,
        user_name: String,
        created_at: DateTime<Utc>,
    },

    #[serde(rename = "event:new")]
    EventNew { event: Event },

    #[serde(rename = "event:updated")]
    EventUpdated { event: Event },

    #[serde(rename = "event:status-changed")]
    EventStatusChanged {
        event_id: Uuid,
        status: EventStatus,
        current_attendance: i64,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "event:liked")]
    EventLiked {
        event_id: Uuid,
        user_id: Uuid,
        liked: bool,
    },

    #[serde(rename = "checkin:created")]
    CheckInCreated { checkin: CheckIn },

    #[serde(rename = "ride:new")]
    RideNew {
        ride_request_id: Uuid,
        pickup_location: GeoPoint,
        dropoff_location: GeoPoint,
        pickup_address: String,
        dropoff_address: String,
        distance_km: f64,
        estimated_price: f64,
        vehicle_type: VehicleType,
    },

    #[serde(rename = "ride:accepted")]
    RideAccepted {
        ride_request_id: Uuid,
        rider_id: Uuid,
        rider_phone: String,
    },

    #[serde(rename = "ride:offer")]
    RideOffer {
        ride_request_id: Uuid,
        offer_id: Uuid,
        rider_id: Uuid,
        offered_price: f64,
    },

    #[serde(rename = "ride:started")]
    RideStarted { ride_request_id: Uuid },

    #[serde(rename = "ride:cancelled")]
    RideCancelled {
        ride_request_id: Uuid,
        by: CancelActor,
    },

    #[serde(rename = "ride:completed")]
    RideCompleted { ride_request_id: Uuid, fare: f64 },

    /// Sent directly to a connection whose command failed.
    #[serde(rename = "error")]
    Error { message: String },
}

/// Commands sent FROM client TO server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the connection. Must be the first frame.
    #[serde(rename = "identify")]
    Identify { token: String },

    #[serde(rename = "join:event")]
    JoinEvent { event_id: Uuid },

    #[serde(rename = "leave:event")]
    LeaveEvent { event_id: Uuid },

    #[serde(rename = "subscribe:events")]
    SubscribeEvents,

    #[serde(rename = "unsubscribe:events")]
    UnsubscribeEvents,

    #[serde(rename = "subscribe:rides")]
    SubscribeRides,

    /// Persist a chat message and fan it out to the event room, same as the
    /// REST send path.
    #[serde(rename = "message:send")]
    SendMessage { event_id: Uuid, message: String },

    /// Organizer pushes a live status/attendance change to the event room.
    #[serde(rename = "event:update-status")]
    UpdateEventStatus {
        event_id: Uuid,
        status: EventStatus,
        current_attendance: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_event_serializes_with_wire_names() {
        let ev = GatewayEvent::RideStarted {
            ride_request_id: Uuid::nil(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains(r#""type":"ride:started""#));
    }

    #[test]
    fn unit_commands_parse_without_data() {
        let cmd: GatewayCommand =
            serde_json::from_str(r#"{"type":"subscribe:events"}"#).unwrap();
        assert!(matches!(cmd, GatewayCommand::SubscribeEvents));
    }

    #[test]
    fn identify_round_trips() {
        let cmd = GatewayCommand::Identify {
            token: "abc".into(),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        let back: GatewayCommand = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, GatewayCommand::Identify { token } if token == "abc"));
    }
}
