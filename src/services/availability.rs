use std::sync::Mutex;

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use crate::errors::SchedulingError;
use crate::models::{
    AvailabilityState, AvailableSlotEntry, ConsultationType, SlotQuery, TimeSlot, WorkingHours,
};
use crate::services::platform::ConsultationApi;
use crate::services::slots;
use crate::services::temporal::{self, RawTemporalValue};

/// Asks the platform whether `slot` can be booked. Failures never escape:
/// they become `AvailabilityState::Error`.
pub async fn validate(
    api: &dyn ConsultationApi,
    slot: &TimeSlot,
    expert_id: &str,
    duration_minutes: i64,
    consultation_type: ConsultationType,
) -> AvailabilityState {
    match check(api, slot, expert_id, duration_minutes, consultation_type).await {
        Ok(state) => {
            tracing::info!(
                slot = %slot.start,
                expert = expert_id,
                state = state.as_str(),
                "slot checked"
            );
            state
        }
        Err(e) => {
            tracing::warn!(slot = %slot.start, expert = expert_id, error = %e, "slot check failed");
            AvailabilityState::Error
        }
    }
}

async fn check(
    api: &dyn ConsultationApi,
    slot: &TimeSlot,
    expert_id: &str,
    duration_minutes: i64,
    consultation_type: ConsultationType,
) -> Result<AvailabilityState, SchedulingError> {
    let day = slot.start.date().format("%Y-%m-%d").to_string();
    let query = SlotQuery {
        expert_id: expert_id.to_string(),
        start_date: day.clone(),
        end_date: day,
        duration_minutes,
        consultation_type,
    };

    let response = api
        .available_slots(&query)
        .await
        .map_err(|e| SchedulingError::Availability(e.to_string()))?;

    match_entries(&response.available_slots, slot.start)
}

/// Finds the entry starting at `start`. No entry at all means the platform
/// does not offer that hour, which counts as unavailable.
pub fn match_entries(
    entries: &[AvailableSlotEntry],
    start: NaiveDateTime,
) -> Result<AvailabilityState, SchedulingError> {
    let wanted = to_minute(start);
    let mut unreadable = 0;
    let mut found = None;

    for entry in entries {
        let parsed = RawTemporalValue::classify(&entry.start_time)
            .as_ref()
            .and_then(temporal::normalize)
            .map(to_minute);
        match parsed {
            Some(at) if at == wanted => {
                found = Some(found.unwrap_or(false) || entry.is_available);
            }
            Some(_) => {}
            None => unreadable += 1,
        }
    }

    match found {
        Some(true) => Ok(AvailabilityState::Available),
        Some(false) => Ok(AvailabilityState::Unavailable),
        None if unreadable > 0 => Err(SchedulingError::Availability(format!(
            "{unreadable} slot entries had unreadable start times"
        ))),
        None => Ok(AvailabilityState::Unavailable),
    }
}

fn to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

/// One day of candidate slots plus the user's current selection. Validation
/// results are keyed by start time and only land if that slot is still the
/// one selected.
#[derive(Debug, Clone)]
pub struct SlotBoard {
    pub date: NaiveDate,
    pub slots: Vec<TimeSlot>,
    selected: Option<NaiveDateTime>,
}

impl SlotBoard {
    pub fn new(date: NaiveDate, hours: &WorkingHours, now: NaiveDateTime) -> Self {
        Self {
            date,
            slots: slots::slots_for_date(date, hours, now),
            selected: None,
        }
    }

    pub fn selected(&self) -> Option<&TimeSlot> {
        let start = self.selected?;
        self.slots.iter().find(|s| s.start == start)
    }

    pub fn select(&mut self, start: NaiveDateTime) -> Result<TimeSlot, SchedulingError> {
        let slot = self
            .slots
            .iter()
            .find(|s| s.start == start)
            .ok_or_else(|| SchedulingError::Validation(format!("no slot at {start}")))?;
        if !slot.is_selectable() {
            return Err(SchedulingError::Validation(format!(
                "slot {} cannot be selected",
                slot.display_label()
            )));
        }
        let slot = slot.clone();
        self.selected = Some(start);
        Ok(slot)
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    /// Returns false when the result is stale or the slot was already resolved.
    pub fn apply(&mut self, start: NaiveDateTime, state: AvailabilityState) -> bool {
        if self.selected != Some(start) {
            tracing::debug!(slot = %start, "dropping stale availability result");
            return false;
        }
        self.slots
            .iter_mut()
            .find(|s| s.start == start)
            .map(|s| s.resolve(state))
            .unwrap_or(false)
    }
}

/// Selects `start` on the board, validates it without holding the lock, then
/// records the result if it is still relevant.
pub async fn select_and_validate(
    api: &dyn ConsultationApi,
    board: &Mutex<SlotBoard>,
    start: NaiveDateTime,
    expert_id: &str,
    duration_minutes: i64,
    consultation_type: ConsultationType,
) -> Result<AvailabilityState, SchedulingError> {
    let slot = {
        let mut board = board
            .lock()
            .map_err(|_| SchedulingError::Availability("slot board poisoned".to_string()))?;
        board.select(start)?
    };

    if slot.state != AvailabilityState::Unknown {
        return Ok(slot.state);
    }

    let state = validate(api, &slot, expert_id, duration_minutes, consultation_type).await;

    let mut board = board
        .lock()
        .map_err(|_| SchedulingError::Availability("slot board poisoned".to_string()))?;
    board.apply(start, state);
    Ok(state)
}
