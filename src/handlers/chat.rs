use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::db::queries::BookingLogEntry;
use crate::errors::AppError;
use crate::models::{ChatMessage, ChatSession, Expert, SessionState};
use crate::services::conversation::ChatTurn;
use crate::state::AppState;

#[derive(Serialize)]
pub struct SessionView {
    session_id: String,
    user: String,
    anonymous: bool,
    state: SessionState,
    messages: Vec<ChatMessage>,
    experts: Vec<Expert>,
    remaining_messages: Option<u32>,
    working_hours: String,
}

impl SessionView {
    fn of(state: &AppState, session: &ChatSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            user: session.user.key().to_string(),
            anonymous: session.user.is_anonymous(),
            state: session.state,
            messages: session.messages.clone(),
            experts: session.experts.clone(),
            remaining_messages: state.coordinator.remaining_messages(session),
            working_hours: state.config.working_hours.to_human_readable(),
        }
    }
}

// POST /api/chat/open
pub async fn open_chat(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    let identity = state.config.identity();
    let today = Local::now().date_naive();

    let mut sessions = state.sessions.lock().await;
    if let Some(previous) = sessions.remove(identity.key()) {
        state.coordinator.close_session(&previous);
    }

    let mut session = state.coordinator.open_session(identity, today);
    let experts_arrived = state.coordinator.load_experts(&mut session).await;
    let view = SessionView::of(&state, &session);

    let key = session.user.key().to_string();
    let session_id = session.session_id.clone();
    sessions.insert(key.clone(), session);
    drop(sessions);

    if experts_arrived {
        schedule_expert_suggestion(Arc::clone(&state), key, session_id);
    }

    Json(view)
}

/// Offers expert availability after the configured delay, unless the session
/// was closed or replaced in the meantime.
fn schedule_expert_suggestion(state: Arc<AppState>, key: String, session_id: String) {
    let delay = Duration::from_millis(state.config.expert_suggestion_delay_ms);
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        let mut sessions = state.sessions.lock().await;
        let Some(session) = sessions.get_mut(&key) else {
            return;
        };
        if session.session_id != session_id {
            return;
        }
        if let Some(message) = state.coordinator.offer_expert_availability(session) {
            tracing::info!(session = %session_id, "expert availability suggested");
            state.publish(&session_id, &message);
        }
    });
}

// POST /api/chat/close
pub async fn close_chat(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let identity = state.config.identity();
    let closed = state.sessions.lock().await.remove(identity.key());

    if let Some(session) = &closed {
        state.coordinator.close_session(session);
    }

    Json(serde_json::json!({"ok": true, "closed": closed.is_some()}))
}

// POST /api/chat/message
#[derive(Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MessageRequest>,
) -> Result<Json<ChatTurn>, AppError> {
    let identity = state.config.identity();
    let today = Local::now().date_naive();

    let mut sessions = state.sessions.lock().await;
    let session = sessions
        .get_mut(identity.key())
        .ok_or_else(|| AppError::NotFound("no open chat session".to_string()))?;

    let turn = state
        .coordinator
        .handle_user_message(session, &body.message, today)
        .await?;

    for message in &turn.new_messages {
        state.publish(&session.session_id, message);
    }

    Ok(Json(turn))
}

// GET /api/chat/bookings
#[derive(Deserialize)]
pub struct BookingLogQuery {
    pub limit: Option<i64>,
}

pub async fn booking_log(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BookingLogQuery>,
) -> Result<Json<Vec<BookingLogEntry>>, AppError> {
    let identity = state.config.identity();
    if identity.is_anonymous() {
        return Ok(Json(vec![]));
    }
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let entries = state.store.booking_log(identity.key(), limit)?;
    Ok(Json(entries))
}

// GET /api/chat/events (SSE)
pub async fn events_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events_tx.subscribe();

    let live_stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data).event("chat_event")))
        }
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "event stream subscriber lagged");
            None
        }
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    Sse::new(StreamExt::merge(live_stream, keepalive_stream))
}
