use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, SchedulingError};
use crate::models::{AvailabilityState, ConsultationType, TimeSlot};
use crate::services::availability::{self, SlotBoard};
use crate::services::slots::DEFAULT_SLOT_MINUTES;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    start: NaiveDateTime,
    label: String,
    duration_minutes: i64,
    state: AvailabilityState,
    selectable: bool,
}

impl From<&TimeSlot> for SlotView {
    fn from(slot: &TimeSlot) -> Self {
        Self {
            start: slot.start,
            label: slot.display_label(),
            duration_minutes: slot.duration_minutes,
            state: slot.state,
            selectable: slot.is_selectable(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotsResponse {
    date: NaiveDate,
    working_hours: String,
    slots: Vec<SlotView>,
    selected: Option<NaiveDateTime>,
}

fn board_view(state: &AppState, board: &SlotBoard) -> SlotsResponse {
    SlotsResponse {
        date: board.date,
        working_hours: state.config.working_hours.to_human_readable(),
        slots: board.slots.iter().map(SlotView::from).collect(),
        selected: board.selected().map(|s| s.start),
    }
}

fn poisoned() -> AppError {
    AppError::Internal(anyhow::anyhow!("slot board lock poisoned"))
}

// GET /api/slots?date=YYYY-MM-DD
#[derive(Deserialize)]
pub struct SlotsQuery {
    pub date: Option<String>,
}

pub async fn get_slots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, AppError> {
    let now = Local::now().naive_local();
    let date = match query.date.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| SchedulingError::Validation(format!("invalid date: {raw}")))?,
        _ => now.date(),
    };

    let board = SlotBoard::new(date, &state.config.working_hours, now);
    tracing::info!(date = %date, count = board.slots.len(), "slots generated");

    let mut current = state.slot_board.lock().map_err(|_| poisoned())?;
    *current = board;
    Ok(Json(board_view(&state, &current)))
}

// POST /api/slots/select
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectSlotRequest {
    pub start: NaiveDateTime,
    pub expert_id: String,
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub consultation_type: ConsultationType,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectSlotResponse {
    start: NaiveDateTime,
    state: AvailabilityState,
    selectable: bool,
}

pub async fn select_slot(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SelectSlotRequest>,
) -> Result<Json<SelectSlotResponse>, AppError> {
    let expert_id = body.expert_id.trim();
    if expert_id.is_empty() {
        return Err(SchedulingError::Validation("choose an expert first".to_string()).into());
    }

    let result = availability::select_and_validate(
        state.api.as_ref(),
        &state.slot_board,
        body.start,
        expert_id,
        body.duration_minutes.unwrap_or(DEFAULT_SLOT_MINUTES),
        body.consultation_type,
    )
    .await?;

    Ok(Json(SelectSlotResponse {
        start: body.start,
        state: result,
        selectable: !matches!(result, AvailabilityState::Unavailable | AvailabilityState::Error),
    }))
}

// POST /api/slots/deselect
pub async fn deselect_slot(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SlotsResponse>, AppError> {
    let mut board = state.slot_board.lock().map_err(|_| poisoned())?;
    board.deselect();
    Ok(Json(board_view(&state, &board)))
}
