use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::errors::SchedulingError;
use crate::models::{
    Appointment, AppointmentRequest, AppointmentStatus, AutoBookingRequest, AutoBookingResponse,
    BookingIntent, ChatMessage, ConsultationType, MessageKind, Role,
};
use crate::services::platform::ConsultationApi;
use crate::services::temporal::{self, DisplaySchedule};

const GENERIC_FAILURE: &str = "The booking could not be completed. Please try booking manually.";

#[derive(Debug, Clone, Default, Serialize)]
pub struct BookingOptions {
    pub consultation_type: ConsultationType,
    pub notes: Option<String>,
    pub meeting_location: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedBooking {
    pub appointment_id: String,
    pub expert_name: String,
    pub schedule: DisplaySchedule,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    pub consultation_type: ConsultationType,
    pub notes: Option<String>,
}

impl ConfirmedBooking {
    /// The message id is derived from the appointment, so re-posting the same
    /// confirmation replaces the earlier one.
    pub fn confirmation_message(&self) -> ChatMessage {
        let when = match self.schedule.time_label.as_str() {
            "" => self.schedule.date_label.clone(),
            time => format!("{} at {}", self.schedule.date_label, time),
        };
        let mut message = ChatMessage::with_kind(
            Role::Assistant,
            &format!(
                "Your appointment with {} on {} ({} minutes) is booked. Status: {}.",
                self.expert_name,
                when,
                self.duration_minutes,
                self.status.as_str()
            ),
            MessageKind::BookingConfirmed {
                appointment_id: self.appointment_id.clone(),
            },
        );
        message.id = format!("booking-confirmed-{}", self.appointment_id);
        message
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum BookingOutcome {
    Confirmed(ConfirmedBooking),
    /// Recoverable; the caller must offer manual booking alongside `reason`.
    Failed { reason: String },
    /// An identical submission was already in flight.
    Suppressed,
}

impl BookingOutcome {
    pub fn failure_message(reason: &str) -> ChatMessage {
        ChatMessage::with_kind(
            Role::Assistant,
            &format!("I couldn't complete that booking: {reason} You can book manually instead."),
            MessageKind::BookingFailed {
                reason: reason.to_string(),
            },
        )
    }
}

/// Turns a resolved intent or an explicit modal selection into exactly one
/// submitted booking.
pub struct AutoBookingOrchestrator {
    api: Arc<dyn ConsultationApi>,
    in_flight: Mutex<HashSet<String>>,
}

struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.key);
        }
    }
}

impl AutoBookingOrchestrator {
    pub fn new(api: Arc<dyn ConsultationApi>) -> Self {
        Self {
            api,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn claim(&self, key: String) -> Option<InFlightGuard<'_>> {
        let mut set = self.in_flight.lock().ok()?;
        if !set.insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            set: &self.in_flight,
            key,
        })
    }

    pub fn build_request(
        intent: &BookingIntent,
        options: &BookingOptions,
        today: NaiveDate,
    ) -> Result<AutoBookingRequest, SchedulingError> {
        let (Some(expert), Some(date), Some(time)) = (&intent.expert, &intent.date, &intent.time)
        else {
            return Err(SchedulingError::Validation(
                "an expert, a date and a time are needed to book automatically".to_string(),
            ));
        };
        check_location(options.consultation_type, options.meeting_location.as_deref())?;

        Ok(AutoBookingRequest {
            expert_name: expert.clone(),
            date: date.resolve(today).format("%Y-%m-%d").to_string(),
            time: time.clone(),
            duration_minutes: intent.duration(),
            consultation_type: options.consultation_type,
            notes: options.notes.clone(),
            meeting_location: options.meeting_location.clone(),
        })
    }

    pub async fn attempt_auto_book(
        &self,
        intent: &BookingIntent,
        options: &BookingOptions,
        today: NaiveDate,
    ) -> Result<BookingOutcome, SchedulingError> {
        let request = Self::build_request(intent, options, today)?;
        let key = format!(
            "auto|{}|{}|{}|{}",
            request.expert_name.to_lowercase(),
            request.date,
            request.time,
            request.duration_minutes
        );
        let Some(_guard) = self.claim(key.clone()) else {
            tracing::info!(key = %key, "duplicate auto-booking suppressed");
            return Ok(BookingOutcome::Suppressed);
        };

        tracing::info!(
            expert = %request.expert_name,
            date = %request.date,
            time = %request.time,
            "submitting auto-booking"
        );

        let outcome = match self.api.auto_book(&request).await {
            Ok(resp) if resp.success => {
                BookingOutcome::Confirmed(confirmed_from_auto(&request, resp, &key))
            }
            Ok(resp) => BookingOutcome::Failed {
                reason: resp
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            },
            Err(e) => {
                tracing::warn!(error = %e, "auto-booking request failed");
                BookingOutcome::Failed {
                    reason: e.user_message(),
                }
            }
        };
        Ok(outcome)
    }

    /// The booking modal path: the user already picked expert and slot.
    pub async fn submit(
        &self,
        request: &AppointmentRequest,
    ) -> Result<BookingOutcome, SchedulingError> {
        if request.expert_id.trim().is_empty() {
            return Err(SchedulingError::Validation("choose an expert first".to_string()));
        }
        if request.duration_minutes <= 0 {
            return Err(SchedulingError::Validation(
                "duration must be positive".to_string(),
            ));
        }
        check_location(request.consultation_type, request.meeting_location.as_deref())?;

        let key = format!(
            "manual|{}|{}|{}",
            request.expert_id, request.start, request.duration_minutes
        );
        let Some(_guard) = self.claim(key.clone()) else {
            tracing::info!(key = %key, "duplicate booking suppressed");
            return Ok(BookingOutcome::Suppressed);
        };

        let outcome = match self.api.create_appointment(request).await {
            Ok(appointment) => {
                BookingOutcome::Confirmed(confirmed_from_appointment(request, appointment))
            }
            Err(e) => {
                tracing::warn!(error = %e, "booking request failed");
                BookingOutcome::Failed {
                    reason: e.user_message(),
                }
            }
        };
        Ok(outcome)
    }
}

fn check_location(
    consultation_type: ConsultationType,
    location: Option<&str>,
) -> Result<(), SchedulingError> {
    let has_location = location.is_some_and(|l| !l.trim().is_empty());
    if consultation_type == ConsultationType::InPerson && !has_location {
        return Err(SchedulingError::Validation(
            "in-person consultations need a meeting location".to_string(),
        ));
    }
    Ok(())
}

fn confirmed_from_auto(
    request: &AutoBookingRequest,
    resp: AutoBookingResponse,
    fallback_id: &str,
) -> ConfirmedBooking {
    let requested_date = Value::String(request.date.clone());
    let date = resp.appointment_date.as_ref().filter(|v| !v.is_null());
    let time = resp
        .appointment_time
        .as_deref()
        .or(Some(request.time.as_str()));

    ConfirmedBooking {
        appointment_id: resp.appointment_id.unwrap_or_else(|| fallback_id.to_string()),
        expert_name: resp
            .expert_name
            .unwrap_or_else(|| request.expert_name.clone()),
        schedule: temporal::display_schedule(Some(date.unwrap_or(&requested_date)), time),
        duration_minutes: request.duration_minutes,
        status: resp.status.unwrap_or_default(),
        consultation_type: resp.consultation_type.unwrap_or(request.consultation_type),
        notes: resp.notes.or_else(|| request.notes.clone()),
    }
}

fn confirmed_from_appointment(
    request: &AppointmentRequest,
    appointment: Appointment,
) -> ConfirmedBooking {
    let has_date = appointment
        .appointment_date
        .as_ref()
        .is_some_and(|v| !v.is_null());
    let schedule = if has_date {
        appointment.schedule()
    } else {
        let requested = Value::String(request.start.format("%Y-%m-%dT%H:%M:%S").to_string());
        temporal::display_schedule(Some(&requested), appointment.appointment_time.as_deref())
    };

    ConfirmedBooking {
        appointment_id: appointment.id,
        expert_name: appointment.expert_name.unwrap_or_default(),
        schedule,
        duration_minutes: appointment.duration_minutes,
        status: appointment.status,
        consultation_type: appointment.consultation_type,
        notes: appointment.notes,
    }
}
