use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::services::temporal::{self, DisplaySchedule};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsultationType {
    #[default]
    Online,
    Phone,
    InPerson,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "PENDING",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::NoShow => "NO_SHOW",
        }
    }

    pub fn can_transition_to(&self, target: &AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, target),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
                | (Confirmed, NoShow)
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelledBy {
    Student,
    Expert,
}

impl CancelledBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelledBy::Student => "STUDENT",
            CancelledBy::Expert => "EXPERT",
        }
    }
}

/// Which side of the appointment list to fetch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentRole {
    #[default]
    Student,
    Expert,
}

impl AppointmentRole {
    pub fn path_segment(&self) -> &'static str {
        match self {
            AppointmentRole::Student => "student",
            AppointmentRole::Expert => "expert",
        }
    }

    pub fn cancelled_by(&self) -> CancelledBy {
        match self {
            AppointmentRole::Student => CancelledBy::Student,
            AppointmentRole::Expert => CancelledBy::Expert,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Expert {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub specialization: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRequest {
    pub expert_id: String,
    #[serde(rename = "appointmentDate")]
    pub start: NaiveDateTime,
    pub duration_minutes: i64,
    pub consultation_type: ConsultationType,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_location: Option<String>,
}

/// Appointment as returned by the platform. The date may arrive as an ISO
/// string, a bare date, an epoch number or a structured array, so it is kept
/// raw and normalised on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub expert_name: Option<String>,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub appointment_date: Option<Value>,
    #[serde(default)]
    pub appointment_time: Option<String>,
    #[serde(default = "default_duration")]
    pub duration_minutes: i64,
    #[serde(default)]
    pub consultation_type: ConsultationType,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub meeting_location: Option<String>,
}

impl Appointment {
    pub fn schedule(&self) -> DisplaySchedule {
        temporal::display_schedule(
            self.appointment_date.as_ref(),
            self.appointment_time.as_deref(),
        )
    }
}

fn default_duration() -> i64 {
    60
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotQuery {
    pub expert_id: String,
    pub start_date: String,
    pub end_date: String,
    pub duration_minutes: i64,
    pub consultation_type: ConsultationType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotQueryResponse {
    #[serde(default)]
    pub available_slots: Vec<AvailableSlotEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSlotEntry {
    pub start_time: Value,
    #[serde(default)]
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AutoBookingRequest {
    pub expert_name: String,
    pub date: String,
    pub time: String,
    pub duration_minutes: i64,
    pub consultation_type: ConsultationType,
    pub notes: Option<String>,
    pub meeting_location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoBookingResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub appointment_id: Option<String>,
    #[serde(default)]
    pub expert_name: Option<String>,
    #[serde(default)]
    pub appointment_date: Option<Value>,
    #[serde(default)]
    pub appointment_time: Option<String>,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    #[serde(default)]
    pub consultation_type: Option<ConsultationType>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

fn de_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid id: {other}"))),
    }
}

fn de_opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!("invalid id: {other}"))),
    }
}
