pub mod admin;
pub mod auth;
pub mod booking;
pub mod health;
pub mod session;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::models::User;
use crate::state::AppState;

/// The signed-in user, or `Unauthenticated`.
pub(crate) fn require_user(state: &AppState) -> Result<User, AppError> {
    state
        .session
        .current_user()
        .ok_or_else(|| AppError::Unauthenticated("Please log in".to_string()))
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/session", get(session::get_session))
        .route("/api/session/events", get(session::events_stream))
        .route("/api/view", get(session::get_view))
        .route("/api/nav", post(session::update_nav))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route(
            "/api/auth/verification/resend",
            post(auth::resend_verification),
        )
        .route(
            "/api/auth/verification/check",
            post(auth::check_verification),
        )
        .route("/api/auth/password-reset", post(auth::password_reset))
        .route("/api/auth/demo-admin", post(auth::create_demo_admin))
        .route("/api/profile", put(auth::update_profile))
        .route("/api/consultants", get(booking::list_consultants))
        .route("/api/booking", get(booking::get_selection))
        .route("/api/booking/consultant", post(booking::select_consultant))
        .route("/api/booking/date", post(booking::select_date))
        .route("/api/booking/time", post(booking::select_time))
        .route("/api/booking/slots", get(booking::get_slots))
        .route("/api/booking/quick-dates", get(booking::get_quick_dates))
        .route("/api/booking/submit", post(booking::submit))
        .route("/api/appointments", get(booking::list_appointments))
        .route("/api/admin/dashboard", get(admin::get_dashboard))
        .route(
            "/api/admin/users/:id",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route("/api/admin/users/:id/verify", post(admin::verify_user))
        .route(
            "/api/admin/consultants/:id",
            put(admin::update_consultant).delete(admin::delete_consultant),
        )
        .route("/api/admin/accounts", get(admin::list_accounts))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
