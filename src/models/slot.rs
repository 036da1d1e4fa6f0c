use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityState {
    Unknown,
    Available,
    Unavailable,
    Error,
}

impl AvailabilityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityState::Unknown => "unknown",
            AvailabilityState::Available => "available",
            AvailabilityState::Unavailable => "unavailable",
            AvailabilityState::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveDateTime,
    pub duration_minutes: i64,
    pub label: String,
    pub state: AvailabilityState,
}

impl TimeSlot {
    pub fn new(start: NaiveDateTime, duration_minutes: i64) -> Self {
        Self {
            start,
            duration_minutes,
            label: start.format("%H:%M").to_string(),
            state: AvailabilityState::Unknown,
        }
    }

    /// Records a validation result. A slot leaves `Unknown` once and never
    /// moves again; returns whether the state changed.
    pub fn resolve(&mut self, state: AvailabilityState) -> bool {
        if self.state != AvailabilityState::Unknown || state == AvailabilityState::Unknown {
            return false;
        }
        self.state = state;
        true
    }

    pub fn is_selectable(&self) -> bool {
        matches!(
            self.state,
            AvailabilityState::Unknown | AvailabilityState::Available
        )
    }

    pub fn display_label(&self) -> String {
        match self.state {
            AvailabilityState::Unavailable => format!("{} (booked)", self.label),
            AvailabilityState::Error => format!("{} (could not check)", self.label),
            _ => self.label.clone(),
        }
    }
}
