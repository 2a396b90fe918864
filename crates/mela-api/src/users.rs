use axum::{Extension, Json, extract::State, response::IntoResponse};

use mela_types::api::{Claims, UpdateProfileRequest};

use crate::AppState;
use crate::error::{ApiError, ApiResult};

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .db
        .user_by_id(claims.sub)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    if let Some(phone) = &req.phone
        && phone.len() < 10
    {
        return Err(ApiError::bad_request("Please provide a valid phone number"));
    }

    let user = state
        .db
        .update_user_profile(
            claims.sub,
            req.name.as_deref(),
            req.phone.as_deref(),
            req.bio.as_deref(),
        )?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(serde_json::json!({ "success": true, "user": user })))
}
