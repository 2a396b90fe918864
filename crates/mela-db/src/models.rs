//! Canonical SELECT column lists and row mappers. Each query that returns a
//! domain model selects the matching column list (optionally followed by
//! joined extras) so the mappers can index columns positionally.

use rusqlite::Row;

use mela_types::models::{
    CheckIn, DriverLicense, Event, EventStatus, GeoPoint, RegistrationStatus, RideOffer,
    RideRequest, RideStatus, Rider, SenderType, User, UserType, Vehicle, VehicleType,
};

use crate::convert::{get_opt_ts, get_opt_uuid, get_ts, get_uuid};

pub const USER_COLS: &str =
    "u.id, u.email, u.name, u.phone, u.user_type, u.is_verified, u.avatar_url, u.bio, u.created_at";

pub fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: get_uuid(row, 0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        phone: row.get(3)?,
        user_type: UserType::parse(&row.get::<_, String>(4)?),
        is_verified: row.get(5)?,
        avatar_url: row.get(6)?,
        bio: row.get(7)?,
        created_at: get_ts(row, 8)?,
    })
}

pub const EVENT_COLS: &str = "e.id, e.organizer_id, e.title, e.description, e.category, \
     e.start_time, e.end_time, e.price, e.location_name, e.latitude, e.longitude, \
     e.capacity, e.current_attendance, e.image_url, e.is_active, e.is_approved, \
     e.status, e.created_at, e.updated_at";

/// Number of columns consumed by [`event_from_row`].
pub const EVENT_COL_COUNT: usize = 19;

pub fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    event_from_row_at(row, 0)
}

pub fn event_from_row_at(row: &Row<'_>, base: usize) -> rusqlite::Result<Event> {
    Ok(Event {
        id: get_uuid(row, base)?,
        organizer_id: get_uuid(row, base + 1)?,
        title: row.get(base + 2)?,
        description: row.get(base + 3)?,
        category: row.get(base + 4)?,
        start_time: get_ts(row, base + 5)?,
        end_time: get_ts(row, base + 6)?,
        price: row.get(base + 7)?,
        location_name: row.get(base + 8)?,
        latitude: row.get(base + 9)?,
        longitude: row.get(base + 10)?,
        capacity: row.get(base + 11)?,
        current_attendance: row.get(base + 12)?,
        image_url: row.get(base + 13)?,
        is_active: row.get(base + 14)?,
        is_approved: row.get(base + 15)?,
        status: EventStatus::parse(&row.get::<_, String>(base + 16)?),
        created_at: get_ts(row, base + 17)?,
        updated_at: get_ts(row, base + 18)?,
    })
}

pub const CHECKIN_COLS: &str =
    "ci.id, ci.user_id, ci.event_id, ci.latitude, ci.longitude, ci.checked_in_at";

pub fn checkin_from_row(row: &Row<'_>) -> rusqlite::Result<CheckIn> {
    Ok(CheckIn {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        event_id: get_uuid(row, 2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
        checked_in_at: get_ts(row, 5)?,
    })
}

pub const RIDER_COLS: &str = "r.id, r.user_id, r.vehicle_id, r.license_id, r.profile_photo_url, \
     r.emergency_contact, r.nid_number, r.bank_name, r.account_number, r.account_holder_name, \
     r.terms_accepted, r.registration_status, r.rejection_reason, r.approved_at, r.is_online, \
     r.is_active, r.current_latitude, r.current_longitude, r.total_rides, r.total_earnings, \
     r.created_at, r.updated_at";

pub const RIDER_COL_COUNT: usize = 22;

pub fn rider_from_row(row: &Row<'_>) -> rusqlite::Result<Rider> {
    Ok(Rider {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        vehicle_id: get_opt_uuid(row, 2)?,
        license_id: get_opt_uuid(row, 3)?,
        profile_photo_url: row.get(4)?,
        emergency_contact: row.get(5)?,
        nid_number: row.get(6)?,
        bank_name: row.get(7)?,
        account_number: row.get(8)?,
        account_holder_name: row.get(9)?,
        terms_accepted: row.get(10)?,
        registration_status: RegistrationStatus::parse(&row.get::<_, String>(11)?),
        rejection_reason: row.get(12)?,
        approved_at: get_opt_ts(row, 13)?,
        is_online: row.get(14)?,
        is_active: row.get(15)?,
        current_latitude: row.get(16)?,
        current_longitude: row.get(17)?,
        total_rides: row.get(18)?,
        total_earnings: row.get(19)?,
        created_at: get_ts(row, 20)?,
        updated_at: get_ts(row, 21)?,
    })
}

pub const VEHICLE_COLS: &str = "v.id, v.rider_id, v.make, v.model, v.year, v.color, \
     v.license_plate, v.vehicle_type, v.seats_available, v.registration_document_url, \
     v.billbook_photo_url, v.created_at";

pub const VEHICLE_COL_COUNT: usize = 12;

pub fn vehicle_from_row_at(row: &Row<'_>, base: usize) -> rusqlite::Result<Vehicle> {
    Ok(Vehicle {
        id: get_uuid(row, base)?,
        rider_id: get_uuid(row, base + 1)?,
        make: row.get(base + 2)?,
        model: row.get(base + 3)?,
        year: row.get(base + 4)?,
        color: row.get(base + 5)?,
        license_plate: row.get(base + 6)?,
        vehicle_type: VehicleType::parse(&row.get::<_, String>(base + 7)?),
        seats_available: row.get(base + 8)?,
        registration_document_url: row.get(base + 9)?,
        billbook_photo_url: row.get(base + 10)?,
        created_at: get_ts(row, base + 11)?,
    })
}

/// LEFT-JOINed vehicle: a NULL id means no row matched.
pub fn vehicle_opt_from_row_at(row: &Row<'_>, base: usize) -> rusqlite::Result<Option<Vehicle>> {
    match row.get::<_, Option<String>>(base)? {
        Some(_) => Ok(Some(vehicle_from_row_at(row, base)?)),
        None => Ok(None),
    }
}

pub const LICENSE_COLS: &str = "dl.id, dl.rider_id, dl.license_number, dl.license_photo_url, \
     dl.expiry_date, dl.issued_date, dl.issuing_authority, dl.license_holder_name, \
     dl.date_of_birth, dl.verification_status, dl.rejection_reason, dl.verified_at, dl.created_at";

pub const LICENSE_COL_COUNT: usize = 13;

pub fn license_from_row_at(row: &Row<'_>, base: usize) -> rusqlite::Result<DriverLicense> {
    Ok(DriverLicense {
        id: get_uuid(row, base)?,
        rider_id: get_uuid(row, base + 1)?,
        license_number: row.get(base + 2)?,
        license_photo_url: row.get(base + 3)?,
        expiry_date: row.get(base + 4)?,
        issued_date: row.get(base + 5)?,
        issuing_authority: row.get(base + 6)?,
        license_holder_name: row.get(base + 7)?,
        date_of_birth: row.get(base + 8)?,
        verification_status: RegistrationStatus::parse(&row.get::<_, String>(base + 9)?),
        rejection_reason: row.get(base + 10)?,
        verified_at: get_opt_ts(row, base + 11)?,
        created_at: get_ts(row, base + 12)?,
    })
}

pub fn license_opt_from_row_at(
    row: &Row<'_>,
    base: usize,
) -> rusqlite::Result<Option<DriverLicense>> {
    match row.get::<_, Option<String>>(base)? {
        Some(_) => Ok(Some(license_from_row_at(row, base)?)),
        None => Ok(None),
    }
}

pub const RIDE_COLS: &str = "rr.id, rr.user_id, rr.rider_id, rr.pickup_latitude, \
     rr.pickup_longitude, rr.pickup_address, rr.dropoff_latitude, rr.dropoff_longitude, \
     rr.dropoff_address, rr.distance_km, rr.estimated_price, rr.requested_price, \
     rr.user_phone, rr.rider_phone, rr.notes, rr.vehicle_type, rr.status, \
     rr.cancellation_reason, rr.accepted_at, rr.started_at, rr.completed_at, \
     rr.cancelled_at, rr.created_at, rr.updated_at";

pub const RIDE_COL_COUNT: usize = 24;

pub fn ride_from_row(row: &Row<'_>) -> rusqlite::Result<RideRequest> {
    Ok(RideRequest {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        rider_id: get_opt_uuid(row, 2)?,
        pickup: GeoPoint {
            latitude: row.get(3)?,
            longitude: row.get(4)?,
        },
        pickup_address: row.get(5)?,
        dropoff: GeoPoint {
            latitude: row.get(6)?,
            longitude: row.get(7)?,
        },
        dropoff_address: row.get(8)?,
        distance_km: row.get(9)?,
        estimated_price: row.get(10)?,
        requested_price: row.get(11)?,
        user_phone: row.get(12)?,
        rider_phone: row.get(13)?,
        notes: row.get(14)?,
        vehicle_type: VehicleType::parse(&row.get::<_, String>(15)?),
        status: RideStatus::parse(&row.get::<_, String>(16)?),
        cancellation_reason: row.get(17)?,
        accepted_at: get_opt_ts(row, 18)?,
        started_at: get_opt_ts(row, 19)?,
        completed_at: get_opt_ts(row, 20)?,
        cancelled_at: get_opt_ts(row, 21)?,
        created_at: get_ts(row, 22)?,
        updated_at: get_ts(row, 23)?,
    })
}

pub const OFFER_COLS: &str =
    "ro.id, ro.ride_request_id, ro.rider_id, ro.offered_price, ro.status, ro.created_at";

pub fn offer_from_row(row: &Row<'_>) -> rusqlite::Result<RideOffer> {
    Ok(RideOffer {
        id: get_uuid(row, 0)?,
        ride_request_id: get_uuid(row, 1)?,
        rider_id: get_uuid(row, 2)?,
        offered_price: row.get(3)?,
        status: mela_types::models::OfferStatus::parse(&row.get::<_, String>(4)?),
        created_at: get_ts(row, 5)?,
    })
}

pub fn chat_message_from_row(row: &Row<'_>) -> rusqlite::Result<mela_types::models::ChatMessage> {
    Ok(mela_types::models::ChatMessage {
        id: get_uuid(row, 0)?,
        user_id: get_opt_uuid(row, 1)?,
        event_id: get_uuid(row, 2)?,
        message: row.get(3)?,
        sender_type: SenderType::parse(&row.get::<_, String>(4)?),
        user_name: row.get(5)?,
        created_at: get_ts(row, 6)?,
    })
}
