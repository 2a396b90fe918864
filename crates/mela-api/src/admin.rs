//! Admin portal handlers. Every route here sits behind the `x-admin-token`
//! shared-secret middleware; there is no per-user identity on this surface.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use mela_types::api::{RejectRequest, StatusFilterQuery};
use mela_types::events::{GatewayEvent, Room};
use mela_types::models::RegistrationStatus;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

// -- Organizers --

pub async fn pending_organizers(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let organizers = state.db.pending_organizers()?;
    Ok(Json(serde_json::json!({ "organizers": organizers })))
}

pub async fn approve_organizer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let organizer = state
        .db
        .organizer_by_id(id)?
        .ok_or_else(|| ApiError::not_found("Organizer not found"))?;
    if organizer.is_verified {
        return Err(ApiError::conflict("Organizer is already verified"));
    }

    state.db.verify_organizer(id)?;
    Ok(Json(serde_json::json!({ "success": true, "message": "Organizer approved" })))
}

pub async fn reject_organizer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if !state.db.demote_organizer(id)? {
        return Err(ApiError::not_found("Organizer not found"));
    }
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Organizer registration rejected",
    })))
}

// -- Events --

pub async fn pending_events(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let events = state.db.pending_events()?;
    Ok(Json(serde_json::json!({ "events": events })))
}

pub async fn approved_events(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let events = state.db.approved_events()?;
    Ok(Json(serde_json::json!({ "events": events })))
}

pub async fn approve_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if !state.db.approve_event(id)? {
        return Err(ApiError::not_found("Event not found"));
    }

    // Approval is the moment an event becomes publicly visible, so this is
    // where the live feed first hears about it.
    if let Some(event) = state.db.event_by_id(id)? {
        state
            .dispatcher
            .broadcast_to(Room::EventsFeed, GatewayEvent::EventNew { event });
    }

    Ok(Json(serde_json::json!({ "success": true, "message": "Event approved" })))
}

pub async fn reject_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if !state.db.reject_event(id)? {
        return Err(ApiError::not_found("Event not found"));
    }
    Ok(Json(serde_json::json!({ "success": true, "message": "Event rejected" })))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if !state.db.admin_delete_event(id)? {
        return Err(ApiError::not_found("Event not found"));
    }
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Event permanently deleted",
    })))
}

// -- Riders --

pub async fn pending_riders(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let riders = state.db.riders_admin(Some(RegistrationStatus::Pending))?;
    Ok(Json(serde_json::json!({ "riders": riders })))
}

pub async fn all_riders(
    State(state): State<AppState>,
    Query(query): Query<StatusFilterQuery>,
) -> ApiResult<impl IntoResponse> {
    let riders = state.db.riders_admin(query.status)?;
    Ok(Json(serde_json::json!({ "riders": riders })))
}

pub async fn approve_rider(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if state.db.rider_by_id(id)?.is_none() {
        return Err(ApiError::not_found("Rider not found"));
    }
    if !state.db.approve_rider(id)? {
        return Err(ApiError::conflict("Rider is not pending approval"));
    }
    Ok(Json(serde_json::json!({ "success": true, "message": "Rider approved" })))
}

pub async fn reject_rider(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> ApiResult<impl IntoResponse> {
    let Some(reason) = req.rejection_reason.filter(|r| !r.trim().is_empty()) else {
        return Err(ApiError::bad_request("Rejection reason is required"));
    };
    if !state.db.reject_rider(id, &reason)? {
        return Err(ApiError::not_found("Rider not found"));
    }
    Ok(Json(serde_json::json!({ "success": true, "message": "Rider rejected" })))
}

// -- Licenses --

pub async fn pending_licenses(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let licenses = state.db.pending_licenses()?;
    Ok(Json(serde_json::json!({ "licenses": licenses })))
}

pub async fn approve_license(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if !state.db.approve_license(id)? {
        return Err(ApiError::not_found("License not found"));
    }
    Ok(Json(serde_json::json!({ "success": true, "message": "License approved" })))
}

pub async fn reject_license(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> ApiResult<impl IntoResponse> {
    let Some(reason) = req.rejection_reason.filter(|r| !r.trim().is_empty()) else {
        return Err(ApiError::bad_request("Rejection reason is required"));
    };
    if !state.db.reject_license(id, &reason)? {
        return Err(ApiError::not_found("License not found"));
    }
    Ok(Json(serde_json::json!({ "success": true, "message": "License rejected" })))
}
