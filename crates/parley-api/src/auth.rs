use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;
use uuid::Uuid;

use parley_types::api::{
    Claims, LoginRequest, MeResponse, RegisterRequest, SuccessResponse, UpdateUserRequest,
    UserResponse,
};

use crate::error::{ApiError, run_blocking};
use crate::session;
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "username, email and password are required".into(),
        ));
    }

    let db = state.clone();
    let email = req.email.clone();
    let existing = run_blocking(move || db.db.get_user_by_email(&email)).await?;
    if existing.is_some() {
        return Err(ApiError::DuplicateEmail);
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4().to_string();

    let db = state.clone();
    let row = run_blocking(move || {
        db.db
            .create_user(&user_id, &req.username, &req.email, &password_hash)?;
        db.db
            .get_user_by_id(&user_id)?
            .ok_or_else(|| anyhow!("user {} vanished after insert", user_id))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(UserResponse { user: row.into_user()? })))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let email = req.email.clone();
    let row = run_blocking(move || db.db.get_user_by_email(&email)).await?;

    // Unknown email and wrong password fail identically — no existence oracle
    let row = row.ok_or(ApiError::InvalidCredentials)?;
    if !verify_password(&req.password, &row.password)? {
        return Err(ApiError::InvalidCredentials);
    }

    let user = row.into_user()?;
    let cookie = session::issue(&state.session_secret, user.id, state.cookie_secure)?;

    Ok((jar.add(cookie), Json(UserResponse { user })))
}

/// Never fails: an absent or invalid session just yields `{"user": null}`.
pub async fn me(State(state): State<AppState>, jar: CookieJar) -> Json<MeResponse> {
    let Ok(claims) = session::resolve(&state.session_secret, &jar) else {
        return Json(MeResponse { user: None });
    };

    let db = state.clone();
    let uid = claims.sub.to_string();
    let user = match run_blocking(move || db.db.get_user_by_id(&uid)).await {
        Ok(row) => row.and_then(|r| r.into_user().ok()),
        Err(err) => {
            warn!("session user lookup failed: {err}");
            None
        }
    };

    Json(MeResponse { user })
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<SuccessResponse>) {
    (
        jar.add(session::removal()),
        Json(SuccessResponse { success: true }),
    )
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    if req.username.trim().is_empty() || req.email.trim().is_empty() {
        return Err(ApiError::Validation("username and email are required".into()));
    }

    let password_hash = match req.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let db = state.clone();
    let uid = claims.sub.to_string();
    run_blocking(move || {
        db.db
            .update_user(&uid, &req.username, &req.email, password_hash.as_deref())
    })
    .await?;

    Ok(Json(SuccessResponse { success: true }))
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow!("password hashing failed: {e}")))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| ApiError::Internal(anyhow!("corrupt password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
