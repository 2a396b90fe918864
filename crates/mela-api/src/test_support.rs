//! Shared fixtures for handler tests: an app state over an in-memory
//! database, with the AI service disabled.

use std::sync::Arc;

use axum::{Extension, Json, extract::State};
use uuid::Uuid;

use mela_db::Database;
use mela_gateway::dispatcher::Dispatcher;
use mela_types::api::{Claims, RegisterRequest};
use mela_types::models::UserType;

use crate::{AppState, AppStateInner, auth};

pub fn state() -> AppState {
    Arc::new(AppStateInner {
        db: Arc::new(Database::open_in_memory().expect("in-memory database")),
        dispatcher: Dispatcher::new(),
        jwt_secret: "test-secret".into(),
        admin_token: "test-admin-token".into(),
        ai_service_url: None,
        http: reqwest::Client::new(),
    })
}

pub fn claims_for(user_id: Uuid) -> Claims {
    Claims {
        sub: user_id,
        email: format!("{user_id}@example.com"),
        exp: usize::MAX,
    }
}

/// Register through the real handler and return the new user's id.
pub async fn register_user(state: &AppState, email: &str, user_type: UserType) -> Uuid {
    auth::register(
        State(state.clone()),
        Json(RegisterRequest {
            email: email.into(),
            password: "correct horse battery staple".into(),
            name: "Test User".into(),
            user_type: Some(user_type),
        }),
    )
    .await
    .expect("registration succeeds");

    state
        .db
        .user_auth_by_email(email)
        .unwrap()
        .expect("user exists")
        .0
        .id
}

/// Shorthand for handler extensions.
pub fn authed(user_id: Uuid) -> Extension<Claims> {
    Extension(claims_for(user_id))
}
