use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use uuid::Uuid;

use mela_types::api::Claims;
use mela_types::events::GatewayEvent;

use crate::AppState;
use crate::error::ApiResult;

pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let liked = state.db.toggle_like(Uuid::new_v4(), claims.sub, event_id)?;

    state.dispatcher.broadcast(GatewayEvent::EventLiked {
        event_id,
        user_id: claims.sub,
        liked,
    });

    let message = if liked { "Liked" } else { "Unliked" };
    Ok(Json(serde_json::json!({ "liked": liked, "message": message })))
}

/// Ids of the caller's liked events, for client-side heart toggles.
pub async fn liked_event_ids(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let ids = state.db.liked_event_ids(claims.sub)?;
    Ok(Json(ids))
}

pub async fn my_likes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let events = state.db.liked_events(claims.sub)?;
    Ok(Json(events))
}
