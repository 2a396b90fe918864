use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Serialize;
use uuid::Uuid;

use mela_types::api::{CheckInRequest, Claims};
use mela_types::events::GatewayEvent;
use mela_types::models::{CheckIn, Event};

use crate::AppState;
use crate::error::ApiResult;

pub async fn check_in(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<CheckInRequest>,
) -> ApiResult<impl IntoResponse> {
    let checkin = state.db.insert_checkin(
        Uuid::new_v4(),
        claims.sub,
        event_id,
        req.latitude,
        req.longitude,
    )?;
    state.db.increment_attendance(event_id)?;

    state.dispatcher.broadcast(GatewayEvent::CheckInCreated {
        checkin: checkin.clone(),
    });

    Ok((StatusCode::CREATED, Json(checkin)))
}

#[derive(Serialize)]
struct CheckInHistoryEntry {
    #[serde(flatten)]
    event: Event,
    checked_in_at: chrono::DateTime<chrono::Utc>,
}

pub async fn my_checkins(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let entries: Vec<CheckInHistoryEntry> = state
        .db
        .user_checkins(claims.sub)?
        .into_iter()
        .map(|(checkin, event)| CheckInHistoryEntry {
            event,
            checked_in_at: checkin.checked_in_at,
        })
        .collect();
    Ok(Json(entries))
}

pub async fn event_checkins(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CheckIn>>> {
    let checkins = state.db.event_checkins(event_id)?;
    Ok(Json(checkins))
}
