use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, SchedulingError};
use crate::models::{Appointment, AppointmentRequest, AppointmentRole, AppointmentStatus};
use crate::services::booking::BookingOutcome;
use crate::services::temporal::DisplaySchedule;
use crate::state::AppState;

// POST /api/appointments
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AppointmentRequest>,
) -> Result<Json<BookingOutcome>, AppError> {
    let outcome = state.orchestrator.submit(&request).await?;

    let identity = state.config.identity();
    if !identity.is_anonymous() {
        if let Err(e) = state.store.record_booking(identity.key(), &outcome) {
            tracing::error!(error = %e, "failed to record booking attempt");
        }
    }

    match &outcome {
        BookingOutcome::Confirmed(booking) => {
            tracing::info!(appointment = %booking.appointment_id, "appointment booked from form");
            let mut sessions = state.sessions.lock().await;
            if let Some(session) = sessions.get_mut(identity.key()) {
                let message = booking.confirmation_message();
                session.push_unique(message.clone());
                state.publish(&session.session_id, &message);
            }
        }
        BookingOutcome::Failed { reason } => {
            return Err(SchedulingError::BookingFailure(reason.clone()).into());
        }
        BookingOutcome::Suppressed => {}
    }

    Ok(Json(outcome))
}

// GET /api/appointments?role=student|expert
#[derive(Deserialize)]
pub struct AppointmentsQuery {
    #[serde(default)]
    pub role: AppointmentRole,
}

#[derive(Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    appointment: Appointment,
    schedule: DisplaySchedule,
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<Vec<AppointmentView>>, AppError> {
    let appointments = state.lifecycle.list(query.role).await?;
    let views = appointments
        .into_iter()
        .map(|appointment| AppointmentView {
            schedule: appointment.schedule(),
            appointment,
        })
        .collect();
    Ok(Json(views))
}

#[derive(Serialize)]
pub struct StatusChange {
    id: String,
    status: AppointmentStatus,
}

// POST /api/appointments/:id/confirm
pub async fn confirm_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusChange>, AppError> {
    let status = state.lifecycle.confirm(&id).await?;
    Ok(Json(StatusChange { id, status }))
}

// POST /api/appointments/:id/cancel
#[derive(Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub role: AppointmentRole,
}

pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<StatusChange>, AppError> {
    let status = state.lifecycle.cancel(&id, &body.reason, body.role).await?;
    Ok(Json(StatusChange { id, status }))
}
