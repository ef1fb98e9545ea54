use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::handlers::require_user;
use crate::models::User;
use crate::services::auth::{ProfileUpdate, SignupRequest};
use crate::session::{SessionAction, SessionSnapshot};
use crate::state::AppState;

#[derive(Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub session: SessionSnapshot,
}

// POST /api/auth/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignupRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    state.session.dispatch(SessionAction::BeginSignup);

    match state.auth.signup(&body).await {
        Ok(user) => {
            let session = state.session.dispatch(SessionAction::Succeeded(user.clone()));
            Ok(Json(AuthResponse { user, session }))
        }
        Err(e) => {
            state.session.dispatch(SessionAction::Failed);
            Err(e.into())
        }
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    state.session.dispatch(SessionAction::BeginLogin);

    match state.auth.login(&body.email, &body.password).await {
        Ok(user) => {
            tracing::info!(uid = %user.id, "login succeeded");
            let session = state.session.dispatch(SessionAction::Succeeded(user.clone()));
            Ok(Json(AuthResponse { user, session }))
        }
        Err(e) => {
            tracing::info!(error = %e, "login failed");
            state.session.dispatch(SessionAction::Failed);
            Err(e.into())
        }
    }
}

// POST /api/auth/logout
pub async fn logout(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    state.auth.logout().await;
    Json(state.session.dispatch(SessionAction::Logout))
}

// POST /api/auth/verification/resend
pub async fn resend_verification(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    state.auth.resend_verification().await?;
    Ok(Json(json!({ "ok": true })))
}

// POST /api/auth/verification/check
pub async fn check_verification(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let user = require_user(&state)?;
    let verified = state.auth.check_verification_status(&user.id).await?;

    let session = if verified {
        let refreshed = state.auth.profile(&user.id)?;
        state.session.dispatch(SessionAction::ExternalChange(refreshed))
    } else {
        state.session.snapshot()
    };

    Ok(Json(json!({ "verified": verified, "session": session })))
}

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

// POST /api/auth/password-reset
pub async fn password_reset(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PasswordResetRequest>,
) -> Result<Json<Value>, AppError> {
    state.auth.send_password_reset(&body.email).await?;
    Ok(Json(json!({ "ok": true })))
}

// POST /api/auth/demo-admin
pub async fn create_demo_admin(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    state.auth.create_demo_admin().await?;
    Ok(Json(json!({
        "ok": true,
        "message": "Demo admin account ready. Sign in with admin@example.com / admin123",
    })))
}

// PUT /api/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<AuthResponse>, AppError> {
    let current = require_user(&state)?;
    let user = state.auth.update_profile(&current.id, &body).await?;
    let session = state
        .session
        .dispatch(SessionAction::ExternalChange(Some(user.clone())));
    Ok(Json(AuthResponse { user, session }))
}
