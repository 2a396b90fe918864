use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{GeoPoint, User, UserType};

// -- JWT Claims --

/// JWT claims shared across mela-api (REST middleware) and mela-gateway
/// (WebSocket Identify handshake). Canonical definition lives here in
/// mela-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub user_type: Option<UserType>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// -- Users --

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
}

// -- Events --

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: chrono::DateTime<chrono::Utc>,
    pub price: Option<f64>,
    pub location_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub capacity: Option<i64>,
    pub image_url: Option<String>,
}

/// Partial update; absent fields keep their current value (COALESCE).
#[derive(Debug, Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<crate::models::EventStatus>,
    pub current_attendance: Option<i64>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct EventListQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Radius in km; only meaningful together with lat/lon.
    pub radius: Option<f64>,
    pub category: Option<String>,
    pub status: Option<crate::models::EventStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// -- Check-ins --

#[derive(Debug, Default, Deserialize)]
pub struct CheckInRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

// -- Chat --

#[derive(Debug, Deserialize)]
pub struct SendChatRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatHistoryQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// -- Rider registration --

#[derive(Debug, Deserialize)]
pub struct RiderPersonalRequest {
    pub profile_photo_url: Option<String>,
    pub emergency_contact: Option<String>,
    pub nid_number: Option<String>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_holder_name: Option<String>,
    pub terms_accepted: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RiderVehicleRequest {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i64>,
    pub color: Option<String>,
    pub license_plate: Option<String>,
    pub vehicle_type: Option<crate::models::VehicleType>,
    pub seats_available: Option<i64>,
    pub registration_document_url: Option<String>,
    pub billbook_photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RiderLicenseRequest {
    pub license_number: Option<String>,
    pub license_photo_url: Option<String>,
    pub expiry_date: Option<String>,
    pub issued_date: Option<String>,
    pub issuing_authority: Option<String>,
    pub license_holder_name: Option<String>,
    pub date_of_birth: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RiderStatusRequest {
    pub is_online: Option<bool>,
    pub current_location: Option<GeoPoint>,
}

// -- Rides --

#[derive(Debug, Deserialize)]
pub struct CreateRideRequest {
    pub pickup_location: Option<GeoPoint>,
    pub pickup_address: Option<String>,
    pub dropoff_location: Option<GeoPoint>,
    pub dropoff_address: Option<String>,
    pub notes: Option<String>,
    pub vehicle_type: Option<crate::models::VehicleType>,
}

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_km: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct RideListQuery {
    pub status: Option<crate::models::RideStatus>,
}

#[derive(Debug, Deserialize)]
pub struct MakeOfferRequest {
    pub offered_price: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRideRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EarningsSummary {
    pub today: f64,
    pub this_week: f64,
    pub total: f64,
    pub completed_count: i64,
}

// -- Organizer dashboard --

#[derive(Debug, Serialize)]
pub struct EventAnalytics {
    pub id: Uuid,
    pub title: String,
    pub current_attendance: i64,
    pub like_count: i64,
    pub checkin_count: i64,
    pub unique_chat_users: i64,
    pub total_messages: i64,
}

// -- Admin --

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusFilterQuery {
    pub status: Option<crate::models::RegistrationStatus>,
}
