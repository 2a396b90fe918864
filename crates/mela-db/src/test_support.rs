//! Shared fixtures for the storage tests.

use chrono::{Duration, Utc};
use uuid::Uuid;

use mela_types::api::{CreateEventRequest, RiderLicenseRequest, RiderPersonalRequest};
use mela_types::models::{UserType, VehicleType};

use crate::Database;

pub fn db() -> Database {
    Database::open_in_memory().expect("in-memory database")
}

pub fn seed_user(db: &Database, user_type: UserType, verified: bool) -> Uuid {
    let id = Uuid::new_v4();
    db.create_user(
        id,
        &format!("{id}@example.com"),
        "$argon2id$stub",
        "Test User",
        user_type,
        verified,
    )
    .unwrap();
    id
}

pub fn seed_user_with_phone(db: &Database, user_type: UserType) -> Uuid {
    let id = seed_user(db, user_type, true);
    db.update_user_profile(id, None, Some("9800000000"), None)
        .unwrap();
    id
}

pub fn event_request(latitude: f64, longitude: f64) -> CreateEventRequest {
    CreateEventRequest {
        title: "Night Market".into(),
        description: Some("food stalls and music".into()),
        category: Some("market".into()),
        start_time: Utc::now() + Duration::hours(24),
        end_time: Utc::now() + Duration::hours(30),
        price: Some(0.0),
        location_name: Some("Patan Durbar Square".into()),
        latitude,
        longitude,
        capacity: Some(500),
        image_url: None,
    }
}

pub fn seed_event(db: &Database, organizer: Uuid, approved: bool) -> Uuid {
    let event = db
        .create_event(Uuid::new_v4(), organizer, &event_request(27.67, 85.32))
        .unwrap();
    if approved {
        db.approve_event(event.id).unwrap();
    }
    event.id
}

/// Walks the whole registration flow and approves the rider. Returns the
/// rider row id.
pub fn seed_approved_rider(db: &Database, user_id: Uuid) -> Uuid {
    db.upsert_rider_personal(
        Uuid::new_v4(),
        user_id,
        &RiderPersonalRequest {
            profile_photo_url: Some("https://cdn.example.com/p.jpg".into()),
            emergency_contact: Some("9811111111".into()),
            nid_number: None,
            bank_name: None,
            account_number: None,
            account_holder_name: None,
            terms_accepted: Some(true),
        },
    )
    .unwrap();
    let vehicle = db
        .upsert_vehicle(
            Uuid::new_v4(),
            user_id,
            "Toyota",
            "Corolla",
            2019,
            Some("white"),
            &format!("BA-{}", &user_id.to_string()[..8]),
            VehicleType::Sedan,
            4,
            None,
            None,
        )
        .unwrap();
    let license = db
        .insert_license(
            Uuid::new_v4(),
            user_id,
            &RiderLicenseRequest {
                license_number: Some(format!("LIC-{}", &user_id.to_string()[..8])),
                license_photo_url: Some("https://cdn.example.com/l.jpg".into()),
                expiry_date: Some("2030-01-01".into()),
                issued_date: None,
                issuing_authority: None,
                license_holder_name: None,
                date_of_birth: None,
            },
        )
        .unwrap();
    let rider = db
        .complete_rider_registration(Uuid::new_v4(), user_id, vehicle.id, license.id)
        .unwrap();
    assert!(db.approve_rider(rider.id).unwrap());
    rider.id
}
