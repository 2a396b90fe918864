use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use mela_types::api::{Claims, CreateEventRequest, EventListQuery, UpdateEventRequest};
use mela_types::events::{GatewayEvent, Room};
use mela_types::models::{Event, GeoPoint, UserType};

use crate::AppState;
use crate::error::{ApiError, ApiResult};

const DEFAULT_RADIUS_KM: f64 = 5.0;
const DEFAULT_PAGE_SIZE: u32 = 20;

pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventListQuery>,
) -> ApiResult<impl IntoResponse> {
    let near = match (query.lat, query.lon) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint {
            latitude,
            longitude,
        }),
        _ => None,
    };

    let events = state.db.list_public_events(
        near,
        query.radius.unwrap_or(DEFAULT_RADIUS_KM),
        query.category.as_deref(),
        query.status,
        query.limit.unwrap_or(DEFAULT_PAGE_SIZE) as usize,
        query.offset.unwrap_or(0) as usize,
    )?;

    Ok(Json(events))
}

pub async fn trending_events(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let events = state.db.trending_events(Utc::now())?;
    Ok(Json(events))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let event = state
        .db
        .event_with_stats(id)?
        .ok_or_else(|| ApiError::not_found("Event not found"))?;
    Ok(Json(event))
}

#[derive(Serialize)]
struct CreatedEvent {
    #[serde(flatten)]
    event: Event,
    message: &'static str,
}

pub async fn create_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateEventRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .db
        .user_by_id(claims.sub)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if user.user_type == UserType::Organizer && !user.is_verified {
        return Err(ApiError::forbidden(
            "Your organizer account is pending admin approval. \
             Please wait for verification before creating events.",
        ));
    }

    let event = state.db.create_event(Uuid::new_v4(), claims.sub, &req)?;

    // Not broadcast here: the event only reaches the live feed once an admin
    // approves it.

    Ok((
        StatusCode::CREATED,
        Json(CreatedEvent {
            event,
            message: "Event created successfully. It will be visible to users after admin approval.",
        }),
    ))
}

pub async fn update_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEventRequest>,
) -> ApiResult<impl IntoResponse> {
    let event = state
        .db
        .update_event(id, claims.sub, &req)?
        .ok_or_else(|| ApiError::not_found("Event not found or access denied"))?;

    // Live map updates: both the feed and anyone inside the event room.
    state.dispatcher.broadcast_to(
        Room::EventsFeed,
        GatewayEvent::EventUpdated {
            event: event.clone(),
        },
    );
    state.dispatcher.broadcast_to(
        Room::Event(event.id),
        GatewayEvent::EventUpdated {
            event: event.clone(),
        },
    );

    Ok(Json(event))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if !state.db.delete_event(id, claims.sub)? {
        return Err(ApiError::not_found("Event not found or access denied"));
    }
    Ok(Json(serde_json::json!({ "message": "Event deleted" })))
}

// -- Organizer dashboard --

pub async fn my_events(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let events = state.db.organizer_events(claims.sub)?;
    Ok(Json(events))
}

pub async fn event_analytics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let analytics = state
        .db
        .event_analytics(event_id, claims.sub)?
        .ok_or_else(|| ApiError::not_found("Event not found or access denied"))?;
    Ok(Json(analytics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::test_support::{authed, register_user, state};

    fn request() -> CreateEventRequest {
        CreateEventRequest {
            title: "Indie Film Night".into(),
            description: None,
            category: Some("film".into()),
            start_time: Utc::now() + Duration::days(3),
            end_time: Utc::now() + Duration::days(3) + Duration::hours(2),
            price: Some(250.0),
            location_name: Some("City Hall".into()),
            latitude: 27.7,
            longitude: 85.32,
            capacity: Some(120),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn unverified_organizers_cannot_create_events() {
        let state = state();
        let organizer = register_user(&state, "org@example.com", UserType::Organizer).await;

        let err = create_event(State(state.clone()), authed(organizer), Json(request()))
            .await
            .err()
            .expect("should be rejected");
        assert!(matches!(err, ApiError::Forbidden(_)));

        // Once an admin verifies the account, creation goes through, but the
        // event still starts unapproved.
        state.db.verify_organizer(organizer).unwrap();
        create_event(State(state.clone()), authed(organizer), Json(request()))
            .await
            .expect("verified organizer can create");

        let events = state.db.organizer_events(organizer).unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].is_approved);
    }

    #[tokio::test]
    async fn plain_users_can_create_without_verification() {
        let state = state();
        let user = register_user(&state, "user@example.com", UserType::User).await;

        create_event(State(state.clone()), authed(user), Json(request()))
            .await
            .expect("plain users are verified at registration");
    }
}
