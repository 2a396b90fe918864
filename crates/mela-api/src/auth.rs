use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use mela_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};
use mela_types::models::UserType;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.email.trim().is_empty() || req.password.is_empty() || req.name.trim().is_empty() {
        return Err(ApiError::bad_request("Missing required fields"));
    }

    if state.db.email_taken(&req.email)? {
        return Err(ApiError::conflict("User already exists"));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    // Organizers start unverified and need admin approval before they can
    // create events.
    let user_type = req.user_type.unwrap_or(UserType::User);
    let is_verified = user_type != UserType::Organizer;

    let user_id = Uuid::new_v4();
    state.db.create_user(
        user_id,
        req.email.trim(),
        &password_hash,
        req.name.trim(),
        user_type,
        is_verified,
    )?;
    let user = state
        .db
        .user_by_id(user_id)?
        .ok_or_else(|| anyhow::anyhow!("user row missing after insert"))?;

    let token = create_token(&state.jwt_secret, user_id, &user.email)?;

    let message = (user_type == UserType::Organizer).then(|| {
        "Registration successful. Please wait for admin approval before creating events."
            .to_string()
    });

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user,
            token,
            message,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Email and password required"));
    }

    let (user, password_hash) = state
        .db
        .user_auth_by_email(&req.email)?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    let parsed_hash = PasswordHash::new(&password_hash)
        .map_err(|e| anyhow::anyhow!("stored hash unreadable: {}", e))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::unauthorized("Invalid credentials"))?;

    let token = create_token(&state.jwt_secret, user.id, &user.email)?;

    Ok(Json(AuthResponse {
        user,
        token,
        message: None,
    }))
}

fn create_token(secret: &str, user_id: Uuid, email: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_support::{register_user, state};

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let state = state();
        register_user(&state, "alice@example.com", UserType::User).await;

        let ok = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "alice@example.com".into(),
                password: "correct horse battery staple".into(),
            }),
        )
        .await;
        assert!(ok.is_ok());

        let err = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "alice@example.com".into(),
                password: "wrong".into(),
            }),
        )
        .await
        .err()
        .expect("bad password is rejected");
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let err = login(
            State(state),
            Json(LoginRequest {
                email: "nobody@example.com".into(),
                password: "whatever".into(),
            }),
        )
        .await
        .err()
        .expect("unknown email is rejected");
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let state = state();
        register_user(&state, "bob@example.com", UserType::User).await;

        let err = register(
            State(state),
            Json(RegisterRequest {
                email: "bob@example.com".into(),
                password: "another password".into(),
                name: "Bob".into(),
                user_type: None,
            }),
        )
        .await
        .err()
        .expect("second registration is rejected");
        assert!(matches!(err, ApiError::Conflict(_)));
    }
}
