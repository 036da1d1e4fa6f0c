use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let database = state
        .db
        .lock()
        .ok()
        .and_then(|db| db.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).ok())
        .is_some();

    Json(json!({
        "status": "ok",
        "database": database,
        "signed_in": !state.config.identity().is_anonymous(),
    }))
}
