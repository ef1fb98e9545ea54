use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Consultant, Role, User, ADMIN_EMAIL};
use crate::services::admin::{self, Dashboard, DashboardStats};
use crate::services::functions::DeleteUserResult;
use crate::services::identity::AccountRecord;
use crate::services::validation;
use crate::session::SessionAction;
use crate::state::AppState;

fn require_admin(state: &AppState) -> Result<User, AppError> {
    admin::require_admin(state.session.current_user())
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub stats: DashboardStats,
    #[serde(flatten)]
    pub dashboard: Dashboard,
}

// GET /api/admin/dashboard
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardResponse>, AppError> {
    require_admin(&state)?;

    let dashboard = {
        let db = state.db.lock().unwrap();
        Dashboard::load(&db)?
    };
    *state.dashboard.lock().unwrap() = dashboard.clone();

    Ok(Json(DashboardResponse {
        stats: dashboard.stats(),
        dashboard,
    }))
}

#[derive(Deserialize)]
pub struct UserEdit {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub role: Role,
}

// PUT /api/admin/users/:id
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UserEdit>,
) -> Result<Json<User>, AppError> {
    let admin = require_admin(&state)?;

    let updated = {
        let db = state.db.lock().unwrap();
        let existing = queries::get_user(&db, &id)?
            .ok_or_else(|| AppError::NotFound(format!("user {id}")))?;
        if body.email != existing.email {
            validation::validate_email(&body.email).map_err(AppError::InvalidInput)?;
            if body.email == ADMIN_EMAIL {
                return Err(AppError::InvalidInput(
                    "the admin address cannot be assigned to another account".to_string(),
                ));
            }
            if queries::find_user_by_email(&db, &body.email)?.is_some() {
                return Err(AppError::InvalidInput(
                    "email is already used by another account".to_string(),
                ));
            }
        }
        let updated = User {
            id: existing.id,
            email: body.email,
            name: body.name,
            phone: body.phone.filter(|p| !p.trim().is_empty()),
            created_at: existing.created_at,
            email_verified: body.email_verified,
            role: body.role,
        };
        state
            .dashboard
            .lock()
            .unwrap()
            .update_user(&db, updated.clone())?;
        updated
    };

    if admin.id == updated.id {
        state
            .session
            .dispatch(SessionAction::ExternalChange(Some(updated.clone())));
    }
    Ok(Json(updated))
}

// DELETE /api/admin/users/:id
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteUserResult>, AppError> {
    require_admin(&state)?;
    let result = admin::delete_user(&state.dashboard, state.functions.as_ref(), &id).await?;
    Ok(Json(result))
}

// POST /api/admin/users/:id/verify
pub async fn verify_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_admin(&state)?;
    {
        let db = state.db.lock().unwrap();
        state.dashboard.lock().unwrap().verify_user_email(&db, &id)?;
    }
    Ok(Json(json!({ "ok": true, "message": "User email verified successfully!" })))
}

#[derive(Deserialize)]
pub struct ConsultantEdit {
    pub name: String,
    pub specialty: String,
    pub experience: String,
    pub rating: f64,
    #[serde(default)]
    pub image: String,
    pub available_hours: Vec<String>,
}

// PUT /api/admin/consultants/:id
pub async fn update_consultant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ConsultantEdit>,
) -> Result<Json<Consultant>, AppError> {
    require_admin(&state)?;
    if !(0.0..=5.0).contains(&body.rating) {
        return Err(AppError::InvalidInput("rating must be between 0 and 5".to_string()));
    }

    let consultant = Consultant {
        id,
        name: body.name,
        specialty: body.specialty,
        experience: body.experience,
        rating: body.rating,
        image: body.image,
        available_hours: body.available_hours,
    };
    {
        let db = state.db.lock().unwrap();
        state
            .dashboard
            .lock()
            .unwrap()
            .update_consultant(&db, consultant.clone())?;
    }
    Ok(Json(consultant))
}

// DELETE /api/admin/consultants/:id
pub async fn delete_consultant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_admin(&state)?;
    {
        let db = state.db.lock().unwrap();
        state.dashboard.lock().unwrap().delete_consultant(&db, &id)?;
    }
    Ok(Json(json!({ "ok": true })))
}

// GET /api/admin/accounts
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AccountRecord>>, AppError> {
    require_admin(&state)?;
    Ok(Json(state.functions.list_users().await?))
}
