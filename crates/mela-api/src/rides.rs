use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::Utc;
use uuid::Uuid;

use mela_geo::{estimate_duration_min, haversine_km, ride_price};
use mela_types::api::{
    CancelRideRequest, Claims, CreateRideRequest, MakeOfferRequest, NearbyQuery, RideListQuery,
    RiderLicenseRequest, RiderPersonalRequest, RiderStatusRequest, RiderVehicleRequest,
};
use mela_types::events::{GatewayEvent, Room};
use mela_types::models::{CancelActor, GeoPoint, RideStatus, Rider, User};

use crate::AppState;
use crate::error::{ApiError, ApiResult};

const DEFAULT_NEARBY_RADIUS_KM: f64 = 10.0;
const NEARBY_LIMIT: usize = 20;

// -- Rider registration --

pub async fn register_personal(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RiderPersonalRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.profile_photo_url.is_none() || req.emergency_contact.is_none() {
        return Err(ApiError::bad_request(
            "Profile photo and emergency contact are required",
        ));
    }

    let rider = state
        .db
        .upsert_rider_personal(Uuid::new_v4(), claims.sub, &req)?;
    Ok(Json(serde_json::json!({ "success": true, "rider": rider })))
}

pub async fn register_vehicle(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RiderVehicleRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(make), Some(model), Some(year), Some(license_plate)) =
        (&req.make, &req.model, req.year, &req.license_plate)
    else {
        return Err(ApiError::bad_request(
            "Make, model, year, and license plate are required",
        ));
    };

    let vehicle = state.db.upsert_vehicle(
        Uuid::new_v4(),
        claims.sub,
        make,
        model,
        year,
        req.color.as_deref(),
        license_plate,
        req.vehicle_type.unwrap_or_default(),
        req.seats_available.unwrap_or(4),
        req.registration_document_url.as_deref(),
        req.billbook_photo_url.as_deref(),
    )?;
    Ok(Json(serde_json::json!({ "success": true, "vehicle": vehicle })))
}

pub async fn register_license(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RiderLicenseRequest>,
) -> ApiResult<impl IntoResponse> {
    let Some(license_number) = &req.license_number else {
        return Err(ApiError::bad_request(
            "License number, photo, and expiry date are required",
        ));
    };
    if req.license_photo_url.is_none() || req.expiry_date.is_none() {
        return Err(ApiError::bad_request(
            "License number, photo, and expiry date are required",
        ));
    }

    if state.db.license_number_taken(license_number)? {
        return Err(ApiError::conflict("License number already registered"));
    }

    let license = state.db.insert_license(Uuid::new_v4(), claims.sub, &req)?;
    Ok(Json(serde_json::json!({ "success": true, "license": license })))
}

pub async fn register_complete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let vehicle = state.db.vehicle_for_user(claims.sub)?;
    let license = state.db.license_for_user(claims.sub)?;
    let (Some(vehicle), Some(license)) = (vehicle, license) else {
        return Err(ApiError::bad_request(
            "Please complete vehicle and license registration first",
        ));
    };

    let rider =
        state
            .db
            .complete_rider_registration(Uuid::new_v4(), claims.sub, vehicle.id, license.id)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Registration submitted for verification",
        "rider": rider,
    })))
}

pub async fn rider_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let profile = state
        .db
        .rider_profile(claims.sub)?
        .ok_or_else(|| ApiError::not_found("Rider profile not found"))?;
    Ok(Json(profile))
}

pub async fn update_rider_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RiderStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let rider = state
        .db
        .rider_by_user(claims.sub)?
        .ok_or_else(|| ApiError::not_found("Rider not found"))?;

    if rider.registration_status != mela_types::models::RegistrationStatus::Approved {
        return Err(ApiError::forbidden(
            "Your rider account is pending verification. Please wait for admin approval.",
        ));
    }

    let updated = state
        .db
        .set_rider_presence(
            claims.sub,
            req.is_online.unwrap_or(false),
            req.current_location,
        )?
        .ok_or_else(|| ApiError::not_found("Rider not found"))?;

    Ok(Json(serde_json::json!({ "success": true, "rider": updated })))
}

// -- Ride requests --

pub async fn create_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateRideRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(pickup), Some(dropoff), Some(pickup_address), Some(dropoff_address)) = (
        req.pickup_location,
        req.dropoff_location,
        &req.pickup_address,
        &req.dropoff_address,
    ) else {
        return Err(ApiError::bad_request(
            "Pickup and dropoff locations are required",
        ));
    };

    let user_phone = passenger_phone(&state, claims.sub)?;

    let distance_km = haversine_km(pickup, dropoff);
    let vehicle_type = req.vehicle_type.unwrap_or_default();
    let estimated_price = ride_price(distance_km, vehicle_type);

    let ride = state.db.insert_ride_request(
        Uuid::new_v4(),
        claims.sub,
        pickup,
        pickup_address,
        dropoff,
        dropoff_address,
        distance_km,
        estimated_price,
        &user_phone,
        req.notes.as_deref(),
        vehicle_type,
    )?;

    // Fan out to riders subscribed to the ride feed.
    state.dispatcher.broadcast_to(
        Room::RidesFeed,
        GatewayEvent::RideNew {
            ride_request_id: ride.id,
            pickup_location: pickup,
            dropoff_location: dropoff,
            pickup_address: pickup_address.clone(),
            dropoff_address: dropoff_address.clone(),
            distance_km,
            estimated_price,
            vehicle_type,
        },
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "ride_request": ride,
        "estimated_duration_min": estimate_duration_min(distance_km),
    })))
}

pub async fn nearby_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<NearbyQuery>,
) -> ApiResult<impl IntoResponse> {
    let (Some(latitude), Some(longitude)) = (query.latitude, query.longitude) else {
        return Err(ApiError::bad_request("Current location is required"));
    };

    if state.db.approved_rider_by_user(claims.sub)?.is_none() {
        return Err(ApiError::forbidden(
            "You must be an approved rider to view ride requests",
        ));
    }

    let requests = state.db.nearby_pending_requests(
        GeoPoint {
            latitude,
            longitude,
        },
        query.radius_km.unwrap_or(DEFAULT_NEARBY_RADIUS_KM),
        NEARBY_LIMIT,
    )?;

    Ok(Json(serde_json::json!({ "requests": requests })))
}

pub async fn accept_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (rider, rider_phone) = approved_rider_with_phone(&state, claims.sub)?;

    let ride = state
        .db
        .accept_ride(id, rider.id, &rider_phone)?
        .ok_or_else(|| ApiError::not_found("Ride request not found or already accepted"))?;

    state.dispatcher.broadcast(GatewayEvent::RideAccepted {
        ride_request_id: ride.id,
        rider_id: rider.id,
        rider_phone,
    });

    Ok(Json(serde_json::json!({ "success": true, "ride_request": ride })))
}

pub async fn make_offer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<MakeOfferRequest>,
) -> ApiResult<impl IntoResponse> {
    let offered_price = match req.offered_price {
        Some(price) if price > 0.0 => price,
        _ => return Err(ApiError::bad_request("Valid offered price is required")),
    };

    let rider = state
        .db
        .approved_rider_by_user(claims.sub)?
        .ok_or_else(|| ApiError::forbidden("You must be an approved rider"))?;

    let ride = state
        .db
        .ride_by_id(id)?
        .filter(|r| r.status == RideStatus::Pending)
        .ok_or_else(|| ApiError::not_found("Ride request not found"))?;

    let offer = state
        .db
        .insert_offer(Uuid::new_v4(), ride.id, rider.id, offered_price)?;

    state.dispatcher.broadcast(GatewayEvent::RideOffer {
        ride_request_id: ride.id,
        offer_id: offer.id,
        rider_id: rider.id,
        offered_price,
    });

    Ok(Json(serde_json::json!({ "success": true, "offer": offer })))
}

pub async fn accept_offer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (offer, request_owner) = state
        .db
        .pending_offer(id)?
        .ok_or_else(|| ApiError::not_found("Offer not found"))?;

    if request_owner != claims.sub {
        return Err(ApiError::forbidden(
            "You can only accept offers for your own ride requests",
        ));
    }

    let rider = state
        .db
        .rider_by_id(offer.rider_id)?
        .ok_or_else(|| ApiError::not_found("Rider not found"))?;
    let rider_phone = state
        .db
        .user_by_id(rider.user_id)?
        .and_then(|u| u.phone)
        .ok_or_else(|| {
            ApiError::bad_request("Rider phone number not found. Please contact support.")
        })?;

    if !state.db.accept_offer(&offer, &rider_phone)? {
        return Err(ApiError::conflict("Ride request is no longer pending"));
    }

    state.dispatcher.broadcast(GatewayEvent::RideAccepted {
        ride_request_id: offer.ride_request_id,
        rider_id: offer.rider_id,
        rider_phone,
    });

    Ok(Json(serde_json::json!({ "success": true, "message": "Offer accepted" })))
}

pub async fn my_rides(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<RideListQuery>,
) -> ApiResult<impl IntoResponse> {
    let rides = state.db.rides_for_passenger(claims.sub, query.status)?;
    Ok(Json(serde_json::json!({ "rides": rides })))
}

pub async fn request_detail(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let ride = state
        .db
        .ride_view_for_participant(id, claims.sub)?
        .ok_or_else(|| ApiError::not_found("Ride request not found or access denied"))?;
    Ok(Json(ride))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    req: Option<Json<CancelRideRequest>>,
) -> ApiResult<impl IntoResponse> {
    let req = req.map(|Json(req)| req).unwrap_or_default();

    let (ride, rider_user) = state
        .db
        .ride_with_rider_user(id)?
        .ok_or_else(|| ApiError::not_found("Ride request not found"))?;

    let by = if ride.user_id == claims.sub {
        CancelActor::Passenger
    } else if rider_user == Some(claims.sub) {
        CancelActor::Rider
    } else {
        return Err(ApiError::forbidden("Unauthorized to cancel this ride"));
    };

    if ride.status.is_terminal() {
        return Err(ApiError::bad_request(format!(
            "Cannot cancel ride in {} status",
            ride.status.as_str()
        )));
    }

    if !state.db.cancel_ride(id, by, req.reason.as_deref())? {
        return Err(ApiError::bad_request("Ride can no longer be cancelled"));
    }

    state.dispatcher.broadcast(GatewayEvent::RideCancelled {
        ride_request_id: id,
        by,
    });

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("Ride cancelled by {}", by.as_str()),
    })))
}

pub async fn start_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (ride, rider_id) = assigned_ride(&state, id, claims.sub)?;
    if ride.status != RideStatus::Accepted {
        return Err(ApiError::bad_request("Ride must be accepted before starting"));
    }

    let ride = state
        .db
        .start_ride(id, rider_id)?
        .ok_or_else(|| ApiError::bad_request("Ride must be accepted before starting"))?;

    state.dispatcher.broadcast(GatewayEvent::RideStarted {
        ride_request_id: ride.id,
    });

    Ok(Json(serde_json::json!({ "success": true, "ride": ride })))
}

pub async fn complete_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (ride, rider_id) = assigned_ride(&state, id, claims.sub)?;
    if ride.status != RideStatus::InProgress {
        return Err(ApiError::bad_request("Only in-progress rides can be completed"));
    }

    let fare = state
        .db
        .complete_ride(id, rider_id)?
        .ok_or_else(|| ApiError::bad_request("Only in-progress rides can be completed"))?;

    state.dispatcher.broadcast(GatewayEvent::RideCompleted {
        ride_request_id: id,
        fare,
    });

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Ride completed successfully",
    })))
}

// -- Rider-side listings --

pub async fn rider_active_rides(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let Some(rider) = state.db.rider_by_user(claims.sub)? else {
        return Ok(Json(serde_json::json!({ "rides": [] })));
    };
    let rides = state.db.active_rides_for_rider(rider.id)?;
    Ok(Json(serde_json::json!({ "rides": rides })))
}

pub async fn rider_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let rides = state.db.rides_for_rider_user(claims.sub)?;
    Ok(Json(serde_json::json!({ "rides": rides })))
}

pub async fn rider_earnings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let summary = state.db.rider_earnings(claims.sub, Utc::now())?;
    Ok(Json(summary))
}

// -- Helpers --

fn passenger_phone(state: &AppState, user_id: Uuid) -> Result<String, ApiError> {
    state
        .db
        .user_by_id(user_id)?
        .and_then(|u: User| u.phone)
        .ok_or_else(|| {
            ApiError::bad_request(
                "Please update your profile with a phone number to request rides",
            )
        })
}

fn approved_rider_with_phone(
    state: &AppState,
    user_id: Uuid,
) -> Result<(Rider, String), ApiError> {
    let rider = state
        .db
        .approved_rider_by_user(user_id)?
        .ok_or_else(|| ApiError::forbidden("You must be an approved rider"))?;
    let phone = state
        .db
        .user_by_id(user_id)?
        .and_then(|u| u.phone)
        .ok_or_else(|| ApiError::bad_request("Rider phone number not found"))?;
    Ok((rider, phone))
}

/// The ride and its rider row id, provided the caller is the assigned
/// rider. "Not found" and "not yours" fold into one 403.
fn assigned_ride(
    state: &AppState,
    id: Uuid,
    user_id: Uuid,
) -> Result<(mela_types::models::RideRequest, Uuid), ApiError> {
    let (ride, rider_user) = state
        .db
        .ride_with_rider_user(id)?
        .ok_or_else(|| ApiError::forbidden("Access denied or ride not found"))?;
    let (Some(rider_id), true) = (ride.rider_id, rider_user == Some(user_id)) else {
        return Err(ApiError::forbidden("Access denied or ride not found"));
    };
    Ok((ride, rider_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mela_types::models::UserType;

    use crate::test_support::{authed, register_user, state};

    #[tokio::test]
    async fn pending_riders_are_gated_out_of_ride_work() {
        let state = state();
        let user = register_user(&state, "driver@example.com", UserType::User).await;

        // Step 0 of registration leaves the rider pending.
        register_personal(
            State(state.clone()),
            authed(user),
            Json(RiderPersonalRequest {
                profile_photo_url: Some("https://cdn.example.com/me.jpg".into()),
                emergency_contact: Some("9811111111".into()),
                nid_number: None,
                bank_name: None,
                account_number: None,
                account_holder_name: None,
                terms_accepted: Some(true),
            }),
        )
        .await
        .expect("personal info registers");

        let err = update_rider_status(
            State(state.clone()),
            authed(user),
            Json(RiderStatusRequest {
                is_online: Some(true),
                current_location: None,
            }),
        )
        .await
        .err()
        .expect("pending rider cannot go online");
        assert!(matches!(err, ApiError::Forbidden(_)));

        let err = nearby_requests(
            State(state.clone()),
            authed(user),
            Query(NearbyQuery {
                latitude: Some(27.7),
                longitude: Some(85.3),
                radius_km: None,
            }),
        )
        .await
        .err()
        .expect("pending rider cannot browse requests");
        assert!(matches!(err, ApiError::Forbidden(_)));

        let err = accept_request(State(state.clone()), authed(user), Path(Uuid::new_v4()))
            .await
            .err()
            .expect("pending rider cannot accept");
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn ride_requests_need_a_phone_on_file() {
        let state = state();
        let user = register_user(&state, "rider-less@example.com", UserType::User).await;

        let err = create_request(
            State(state.clone()),
            authed(user),
            Json(CreateRideRequest {
                pickup_location: Some(GeoPoint { latitude: 27.71, longitude: 85.31 }),
                pickup_address: Some("Thamel".into()),
                dropoff_location: Some(GeoPoint { latitude: 27.69, longitude: 85.35 }),
                dropoff_address: Some("Airport".into()),
                notes: None,
                vehicle_type: None,
            }),
        )
        .await
        .err()
        .expect("no phone, no ride");
        assert!(matches!(err, ApiError::BadRequest(_)));

        // With a phone the quote comes back priced off the tier table.
        state
            .db
            .update_user_profile(user, None, Some("9800000000"), None)
            .unwrap();
        create_request(
            State(state.clone()),
            authed(user),
            Json(CreateRideRequest {
                pickup_location: Some(GeoPoint { latitude: 27.71, longitude: 85.31 }),
                pickup_address: Some("Thamel".into()),
                dropoff_location: Some(GeoPoint { latitude: 27.69, longitude: 85.35 }),
                dropoff_address: Some("Airport".into()),
                notes: None,
                vehicle_type: None,
            }),
        )
        .await
        .expect("ride request goes through");

        let rides = state.db.rides_for_passenger(user, None).unwrap();
        assert_eq!(rides.len(), 1);
        let ride = &rides[0].ride;
        assert_eq!(ride.status, RideStatus::Pending);
        assert_eq!(
            ride.estimated_price,
            mela_geo::ride_price(ride.distance_km, ride.vehicle_type)
        );
    }
}
