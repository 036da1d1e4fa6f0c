pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/chat/open", post(handlers::chat::open_chat))
        .route("/api/chat/close", post(handlers::chat::close_chat))
        .route("/api/chat/message", post(handlers::chat::send_message))
        .route("/api/chat/events", get(handlers::chat::events_stream))
        .route("/api/chat/bookings", get(handlers::chat::booking_log))
        .route("/api/slots", get(handlers::slots::get_slots))
        .route("/api/slots/select", post(handlers::slots::select_slot))
        .route("/api/slots/deselect", post(handlers::slots::deselect_slot))
        .route(
            "/api/appointments",
            get(handlers::appointments::list_appointments)
                .post(handlers::appointments::create_appointment),
        )
        .route(
            "/api/appointments/:id/confirm",
            post(handlers::appointments::confirm_appointment),
        )
        .route(
            "/api/appointments/:id/cancel",
            post(handlers::appointments::cancel_appointment),
        )
        .with_state(state)
}
