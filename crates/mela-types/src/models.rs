use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A WGS84 point. Stored as plain lat/lng columns; all distance math goes
/// through `mela_geo::haversine_km`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    User,
    Organizer,
    Admin,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Organizer => "organizer",
            Self::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "organizer" => Self::Organizer,
            "admin" => Self::Admin,
            _ => Self::User,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub user_type: UserType,
    pub is_verified: bool,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Upcoming,
    Ongoing,
    Completed,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "ongoing" => Self::Ongoing,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            _ => Self::Upcoming,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub price: Option<f64>,
    pub location_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub capacity: Option<i64>,
    pub current_attendance: i64,
    pub image_url: Option<String>,
    pub is_active: bool,
    /// Events are created unapproved; only `is_active && is_approved`
    /// events appear in public listings.
    pub is_approved: bool,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn location(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// An event plus its engagement counts, as returned by the public listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventWithStats {
    #[serde(flatten)]
    pub event: Event,
    pub like_count: i64,
    pub checkin_count: i64,
}

/// Admin moderation view: the event joined with its organizer's contact
/// fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventWithOrganizer {
    #[serde(flatten)]
    pub event: Event,
    pub organizer_name: String,
    pub organizer_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub checked_in_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    User,
    Organizer,
    Bot,
}

impl SenderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Organizer => "organizer",
            Self::Bot => "bot",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "organizer" => Self::Organizer,
            "bot" => Self::Bot,
            _ => Self::User,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    /// NULL for bot messages.
    pub user_id: Option<Uuid>,
    pub event_id: Uuid,
    pub message: String,
    pub sender_type: SenderType,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
}

// -- Ride hailing --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Motorcycle,
    Sedan,
    Hatchback,
    Suv,
    Van,
    Other,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Motorcycle => "motorcycle",
            Self::Sedan => "sedan",
            Self::Hatchback => "hatchback",
            Self::Suv => "suv",
            Self::Van => "van",
            Self::Other => "other",
        }
    }

    /// Unknown strings fall back to `Other`, which prices at the sedan rate.
    pub fn parse(s: &str) -> Self {
        match s {
            "motorcycle" => Self::Motorcycle,
            "sedan" => Self::Sedan,
            "hatchback" => Self::Hatchback,
            "suv" => Self::Suv,
            "van" => Self::Van,
            _ => Self::Other,
        }
    }
}

impl Default for VehicleType {
    fn default() -> Self {
        Self::Sedan
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    /// The owning user's id (riders are a 1:1 extension of users).
    pub rider_id: Uuid,
    pub make: String,
    pub model: String,
    pub year: i64,
    pub color: Option<String>,
    pub license_plate: String,
    pub vehicle_type: VehicleType,
    pub seats_available: i64,
    pub registration_document_url: Option<String>,
    pub billbook_photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverLicense {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub license_number: String,
    pub license_photo_url: String,
    pub expiry_date: String,
    pub issued_date: Option<String>,
    pub issuing_authority: Option<String>,
    pub license_holder_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub verification_status: RegistrationStatus,
    pub rejection_reason: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Admin moderation view: a license joined with its holder's contact fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseView {
    #[serde(flatten)]
    pub license: DriverLicense,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rider {
    pub id: Uuid,
    pub user_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub license_id: Option<Uuid>,
    pub profile_photo_url: Option<String>,
    pub emergency_contact: Option<String>,
    pub nid_number: Option<String>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_holder_name: Option<String>,
    pub terms_accepted: bool,
    pub registration_status: RegistrationStatus,
    pub rejection_reason: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub is_online: bool,
    pub is_active: bool,
    pub current_latitude: Option<f64>,
    pub current_longitude: Option<f64>,
    pub total_rides: i64,
    pub total_earnings: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A rider row joined with its vehicle, license, and user contact fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiderProfile {
    #[serde(flatten)]
    pub rider: Rider,
    pub vehicle: Option<Vehicle>,
    pub license: Option<DriverLicense>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    PassengerCancelled,
    RiderCancelled,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::PassengerCancelled => "passenger_cancelled",
            Self::RiderCancelled => "rider_cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "accepted" => Self::Accepted,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "passenger_cancelled" => Self::PassengerCancelled,
            "rider_cancelled" => Self::RiderCancelled,
            _ => Self::Pending,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::PassengerCancelled | Self::RiderCancelled)
    }

    /// Terminal states admit no further transitions, including cancellation.
    pub fn is_terminal(&self) -> bool {
        *self == Self::Completed || self.is_cancelled()
    }
}

/// Who cancelled a ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelActor {
    Passenger,
    Rider,
}

impl CancelActor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passenger => "passenger",
            Self::Rider => "rider",
        }
    }

    pub fn cancelled_status(&self) -> RideStatus {
        match self {
            Self::Passenger => RideStatus::PassengerCancelled,
            Self::Rider => RideStatus::RiderCancelled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub rider_id: Option<Uuid>,
    pub pickup: GeoPoint,
    pub pickup_address: String,
    pub dropoff: GeoPoint,
    pub dropoff_address: String,
    pub distance_km: f64,
    pub estimated_price: f64,
    /// Set when the passenger accepts a rider's custom offer.
    pub requested_price: Option<f64>,
    pub user_phone: String,
    pub rider_phone: Option<String>,
    pub notes: Option<String>,
    pub vehicle_type: VehicleType,
    pub status: RideStatus,
    pub cancellation_reason: Option<String>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RideRequest {
    /// The fare charged on completion: the renegotiated price when an offer
    /// was accepted, otherwise the estimate computed at creation.
    pub fn fare(&self) -> f64 {
        self.requested_price.unwrap_or(self.estimated_price)
    }
}

/// A ride request joined with the counterparty's display fields. Which side
/// is populated depends on who is asking (passenger views carry rider and
/// vehicle details, rider views carry passenger details).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideView {
    #[serde(flatten)]
    pub ride: RideRequest,
    pub rider_name: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_color: Option<String>,
    pub license_plate: Option<String>,
    pub passenger_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "accepted" => Self::Accepted,
            "rejected" => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideOffer {
    pub id: Uuid,
    pub ride_request_id: Uuid,
    pub rider_id: Uuid,
    pub offered_price: f64,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ride_status_round_trips_through_storage_strings() {
        for status in [
            RideStatus::Pending,
            RideStatus::Accepted,
            RideStatus::InProgress,
            RideStatus::Completed,
            RideStatus::PassengerCancelled,
            RideStatus::RiderCancelled,
        ] {
            assert_eq!(RideStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn cancelled_statuses_are_terminal() {
        assert!(RideStatus::Completed.is_terminal());
        assert!(RideStatus::PassengerCancelled.is_terminal());
        assert!(RideStatus::RiderCancelled.is_terminal());
        assert!(!RideStatus::Pending.is_terminal());
        assert!(!RideStatus::Accepted.is_terminal());
        assert!(!RideStatus::InProgress.is_terminal());
    }

    #[test]
    fn unknown_vehicle_type_falls_back_to_other() {
        assert_eq!(VehicleType::parse("rickshaw"), VehicleType::Other);
        assert_eq!(VehicleType::parse("suv"), VehicleType::Suv);
    }

    #[test]
    fn cancel_actor_maps_to_tagged_status() {
        assert_eq!(
            CancelActor::Passenger.cancelled_status(),
            RideStatus::PassengerCancelled
        );
        assert_eq!(
            CancelActor::Rider.cancelled_status(),
            RideStatus::RiderCancelled
        );
    }
}
