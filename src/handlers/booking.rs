use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::handlers::require_user;
use crate::models::{find_reference_consultant, reference_consultants, Appointment, Consultant};
use crate::services::booking::{self, BookingError, ContactForm, QuickDate, Selection, SlotView};
use crate::state::AppState;

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn booking_error(e: BookingError) -> Response {
    let message = e.to_string();
    match e {
        BookingError::InvalidContact(fields) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": message,
                "kind": "invalid_input",
                "fields": fields,
            })),
        )
            .into_response(),
        _ => AppError::InvalidInput(message).into_response(),
    }
}

#[derive(Serialize)]
pub struct SelectionResponse {
    pub selection: Selection,
    pub slots: Vec<SlotView>,
}

fn selection_response(selection: &Selection) -> SelectionResponse {
    SelectionResponse {
        selection: selection.clone(),
        slots: booking::time_slots(selection.consultant.as_ref(), selection.time.as_deref()),
    }
}

// GET /api/consultants
pub async fn list_consultants() -> Json<Vec<Consultant>> {
    Json(reference_consultants())
}

// GET /api/booking
pub async fn get_selection(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SelectionResponse>, AppError> {
    require_user(&state)?;
    let selection = state.selection.lock().unwrap();
    Ok(Json(selection_response(&selection)))
}

#[derive(Deserialize)]
pub struct ConsultantChoice {
    pub consultant_id: String,
}

// POST /api/booking/consultant
pub async fn select_consultant(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ConsultantChoice>,
) -> Result<Json<SelectionResponse>, AppError> {
    require_user(&state)?;
    let consultant = find_reference_consultant(&body.consultant_id)
        .ok_or_else(|| AppError::NotFound(format!("consultant {}", body.consultant_id)))?;

    let mut selection = state.selection.lock().unwrap();
    selection.select_consultant(consultant);
    Ok(Json(selection_response(&selection)))
}

#[derive(Deserialize)]
pub struct DateChoice {
    pub date: NaiveDate,
}

// POST /api/booking/date
pub async fn select_date(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DateChoice>,
) -> Result<Json<SelectionResponse>, Response> {
    require_user(&state).map_err(IntoResponse::into_response)?;

    let mut selection = state.selection.lock().unwrap();
    selection.select_date(body.date, today()).map_err(booking_error)?;
    Ok(Json(selection_response(&selection)))
}

#[derive(Deserialize)]
pub struct TimeChoice {
    pub time: String,
}

// POST /api/booking/time
pub async fn select_time(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TimeChoice>,
) -> Result<Json<SelectionResponse>, Response> {
    require_user(&state).map_err(IntoResponse::into_response)?;

    let mut selection = state.selection.lock().unwrap();
    selection.select_time(&body.time).map_err(booking_error)?;
    Ok(Json(selection_response(&selection)))
}

// GET /api/booking/slots
pub async fn get_slots(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SlotView>>, AppError> {
    require_user(&state)?;
    let selection = state.selection.lock().unwrap();
    Ok(Json(booking::time_slots(
        selection.consultant.as_ref(),
        selection.time.as_deref(),
    )))
}

// GET /api/booking/quick-dates
pub async fn get_quick_dates() -> Json<Vec<QuickDate>> {
    Json(booking::quick_dates(today()))
}

// POST /api/booking/submit
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(form): Json<ContactForm>,
) -> Result<Json<Appointment>, Response> {
    require_user(&state).map_err(IntoResponse::into_response)?;

    let mut selection = state.selection.lock().unwrap();
    let appointment = booking::submit(&selection, &form, |request| {
        let appointment = request.with_id(uuid::Uuid::new_v4().to_string());
        state.appointments.lock().unwrap().push(appointment.clone());
        appointment
    })
    .map_err(booking_error)?;
    selection.clear_slot();

    tracing::info!(
        id = %appointment.id,
        consultant = %appointment.consultant_name,
        date = %appointment.date,
        time = %appointment.time,
        "appointment booked"
    );
    Ok(Json(appointment))
}

// GET /api/appointments
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    require_user(&state)?;
    Ok(Json(state.appointments.lock().unwrap().clone()))
}
