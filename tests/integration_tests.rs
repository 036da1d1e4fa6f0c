use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower::ServiceExt;

use carebook::config::AppConfig;
use carebook::db;
use carebook::errors::ApiError;
use carebook::models::{
    AccountTier, Appointment, AppointmentRequest, AppointmentRole, AutoBookingRequest,
    AutoBookingResponse, CancelledBy, Expert, SlotQuery, SlotQueryResponse, WorkingHours,
};
use carebook::services::ai::{AssistantProvider, AssistantReply};
use carebook::services::platform::ConsultationApi;
use carebook::state::AppState;

// ── Mock Providers ──

#[derive(Default)]
struct MockPlatform {
    calls: AtomicUsize,
    auto_bookings: AtomicUsize,
}

impl MockPlatform {
    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConsultationApi for MockPlatform {
    async fn available_experts(&self) -> Result<Vec<Expert>, ApiError> {
        self.hit();
        Ok(serde_json::from_value(json!([
            {"id": 7, "firstName": "Minh", "lastName": "Lee", "specialization": "anxiety"}
        ]))
        .unwrap())
    }

    async fn available_slots(&self, query: &SlotQuery) -> Result<SlotQueryResponse, ApiError> {
        self.hit();
        let day = &query.start_date;
        Ok(serde_json::from_value(json!({"availableSlots": [
            {"startTime": format!("{day}T09:00:00"), "isAvailable": false},
            {"startTime": format!("{day}T10:00:00"), "isAvailable": true}
        ]}))
        .unwrap())
    }

    async fn create_appointment(
        &self,
        request: &AppointmentRequest,
    ) -> Result<Appointment, ApiError> {
        self.hit();
        if request.expert_id == "404" {
            return Err(ApiError::Status {
                status: StatusCode::NOT_FOUND,
                message: "Expert not found".to_string(),
            });
        }
        Ok(serde_json::from_value(json!({
            "id": 501,
            "expertName": "Minh Lee",
            "appointmentDate": request.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "durationMinutes": request.duration_minutes,
            "status": "PENDING"
        }))
        .unwrap())
    }

    async fn auto_book(
        &self,
        request: &AutoBookingRequest,
    ) -> Result<AutoBookingResponse, ApiError> {
        self.hit();
        self.auto_bookings.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::from_value(json!({
            "success": true,
            "appointmentId": 42,
            "expertName": request.expert_name,
            "appointmentDate": "sometime next week",
            "appointmentTime": request.time,
            "status": "PENDING"
        }))
        .unwrap())
    }

    async fn confirm_appointment(&self, _id: &str) -> Result<(), ApiError> {
        self.hit();
        Ok(())
    }

    async fn cancel_appointment(
        &self,
        _id: &str,
        _reason: &str,
        _by: CancelledBy,
    ) -> Result<(), ApiError> {
        self.hit();
        Ok(())
    }

    async fn list_appointments(
        &self,
        _role: AppointmentRole,
    ) -> Result<Vec<Appointment>, ApiError> {
        self.hit();
        Ok(serde_json::from_value(json!([
            {"id": 42, "expertName": "Minh Lee", "appointmentDate": [2025, 3, 10],
             "appointmentTime": "14:00:00", "status": "PENDING"},
            {"id": 43, "expertName": "Minh Lee", "appointmentDate": "2025-03-12",
             "status": "CANCELLED"}
        ]))
        .unwrap())
    }
}

#[derive(Default)]
struct MockAssistant {
    calls: AtomicUsize,
}

#[async_trait]
impl AssistantProvider for MockAssistant {
    async fn reply(
        &self,
        _message: &str,
        conversation_id: Option<&str>,
        _session_id: &str,
    ) -> anyhow::Result<AssistantReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AssistantReply {
            reply: "Thanks for sharing. How long have you felt this way?".to_string(),
            conversation_id: Some(conversation_id.unwrap_or("conv-1").to_string()),
        })
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        api_base_url: "http://platform.invalid".to_string(),
        api_token: "test-token".to_string(),
        user_id: "student-1".to_string(),
        account_tier: AccountTier::Free,
        daily_message_limit: 20,
        long_conversation_threshold: 5,
        expert_suggestion_delay_ms: 60_000,
        working_hours: WorkingHours::default(),
    }
}

fn test_state_with_assistant(
    config: AppConfig,
) -> (Arc<AppState>, Arc<MockPlatform>, Arc<MockAssistant>) {
    let platform = Arc::new(MockPlatform::default());
    let assistant = Arc::new(MockAssistant::default());
    let conn = db::init_db(":memory:").unwrap();
    let (events_tx, _) = broadcast::channel(64);
    let state = AppState::new(
        config,
        conn,
        platform.clone(),
        assistant.clone(),
        events_tx,
    )
    .unwrap();
    (Arc::new(state), platform, assistant)
}

fn test_state_with(config: AppConfig) -> (Arc<AppState>, Arc<MockPlatform>) {
    let (state, platform, _) = test_state_with_assistant(config);
    (state, platform)
}

fn test_state() -> (Arc<AppState>, Arc<MockPlatform>) {
    test_state_with(test_config())
}

fn app(state: &Arc<AppState>) -> Router {
    carebook::router(Arc::clone(state))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
    let res = app(state).oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let (state, _) = test_state();
    let (status, body) = send(&state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
    assert_eq!(body["signed_in"], true);
}

// ── Slots ──

#[tokio::test]
async fn test_slots_for_a_monday() {
    let (state, _) = test_state();
    // 2030-03-11 is a Monday
    let (status, body) = send(&state, get("/api/slots?date=2030-03-11")).await;
    assert_eq!(status, StatusCode::OK);

    let labels: Vec<&str> = body["slots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["label"].as_str().unwrap())
        .collect();
    assert_eq!(
        labels,
        vec!["09:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00"]
    );
    assert!(body["slots"].as_array().unwrap().iter().all(|s| s["state"] == "unknown"));
}

#[tokio::test]
async fn test_slots_in_the_past_are_empty() {
    let (state, _) = test_state();
    let (status, body) = send(&state, get("/api/slots?date=2025-03-10")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["slots"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_slots_invalid_date() {
    let (state, _) = test_state();
    let (status, body) = send(&state, get("/api/slots?date=10/03/2030")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid date"));
}

#[tokio::test]
async fn test_selecting_booked_slot_disables_it() {
    let (state, _) = test_state();
    send(&state, get("/api/slots?date=2030-03-11")).await;

    let (status, body) = send(
        &state,
        post_json(
            "/api/slots/select",
            json!({"start": "2030-03-11T09:00:00", "expertId": "7"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "unavailable");
    assert_eq!(body["selectable"], false);

    let (status, _) = send(
        &state,
        post_json(
            "/api/slots/select",
            json!({"start": "2030-03-11T09:00:00", "expertId": "7"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(
        &state,
        post_json(
            "/api/slots/select",
            json!({"start": "2030-03-11T10:00:00", "expertId": "7"}),
        ),
    )
    .await;
    assert_eq!(body["state"], "available");
}

#[tokio::test]
async fn test_deselect_keeps_checked_states() {
    let (state, _) = test_state();
    send(&state, get("/api/slots?date=2030-03-11")).await;
    send(
        &state,
        post_json(
            "/api/slots/select",
            json!({"start": "2030-03-11T10:00:00", "expertId": "7"}),
        ),
    )
    .await;

    let (status, body) = send(&state, post_json("/api/slots/deselect", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["selected"].is_null());
    assert_eq!(body["slots"][1]["label"], "10:00");
    assert_eq!(body["slots"][1]["state"], "available");
}

#[tokio::test]
async fn test_select_requires_expert() {
    let (state, platform) = test_state();
    send(&state, get("/api/slots?date=2030-03-11")).await;
    let (status, _) = send(
        &state,
        post_json("/api/slots/select", json!({"start": "2030-03-11T09:00:00", "expertId": " "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(platform.calls.load(Ordering::SeqCst), 0);
}

// ── Appointments ──

#[tokio::test]
async fn test_cancel_with_blank_reason_is_rejected_locally() {
    let (state, platform) = test_state();
    let (status, body) = send(
        &state,
        post_json("/api/appointments/42/cancel", json!({"reason": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("reason"));
    assert_eq!(platform.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancel_with_reason() {
    let (state, platform) = test_state();
    let (status, body) = send(
        &state,
        post_json(
            "/api/appointments/42/cancel",
            json!({"reason": "feeling better", "role": "student"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");
    assert_eq!(platform.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_list_then_confirm_cancelled_is_rejected() {
    let (state, platform) = test_state();
    let (status, body) = send(&state, get("/api/appointments?role=student")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], "42");
    assert_eq!(body[0]["schedule"]["date_label"], "10/03/2025");
    assert_eq!(body[0]["schedule"]["time_label"], "14:00");

    let calls = platform.calls.load(Ordering::SeqCst);
    let (status, _) = send(&state, post_json("/api/appointments/43/confirm", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(platform.calls.load(Ordering::SeqCst), calls);

    let (status, body) = send(&state, post_json("/api/appointments/42/confirm", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CONFIRMED");
}

#[tokio::test]
async fn test_create_appointment_from_form() {
    let (state, _) = test_state();
    let (status, body) = send(
        &state,
        post_json(
            "/api/appointments",
            json!({
                "expertId": "7",
                "appointmentDate": "2030-03-11T10:00:00",
                "durationMinutes": 60,
                "consultationType": "ONLINE"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "confirmed");
    assert_eq!(body["appointment_id"], "501");
    assert_eq!(body["schedule"]["date_label"], "11/03/2030");

    let (_, log) = send(&state, get("/api/chat/bookings")).await;
    assert_eq!(log[0]["outcome"], "confirmed");
}

#[tokio::test]
async fn test_rejected_form_booking_reports_reason() {
    let (state, _) = test_state();
    let (status, body) = send(
        &state,
        post_json(
            "/api/appointments",
            json!({
                "expertId": "404",
                "appointmentDate": "2030-03-11T10:00:00",
                "durationMinutes": 60,
                "consultationType": "ONLINE"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "booking failed: Expert not found");

    let (_, log) = send(&state, get("/api/chat/bookings")).await;
    assert_eq!(log[0]["outcome"], "failed");
    assert_eq!(log[0]["detail"], "Expert not found");
}

#[tokio::test]
async fn test_in_person_without_location_rejected() {
    let (state, platform) = test_state();
    let (status, _) = send(
        &state,
        post_json(
            "/api/appointments",
            json!({
                "expertId": "7",
                "appointmentDate": "2030-03-11T10:00:00",
                "durationMinutes": 60,
                "consultationType": "IN_PERSON"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(platform.calls.load(Ordering::SeqCst), 0);
}

// ── Chat ──

#[tokio::test]
async fn test_message_without_open_session() {
    let (state, _) = test_state();
    let (status, _) = send(&state, post_json("/api/chat/message", json!({"message": "hi"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chat_open_and_reply() {
    let (state, _) = test_state();
    let (status, body) = send(&state, post_json("/api/chat/open", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"], "student-1");
    assert_eq!(body["remaining_messages"], 20);
    assert_eq!(body["experts"][0]["firstName"], "Minh");

    let (status, body) = send(
        &state,
        post_json("/api/chat/message", json!({"message": "I have been feeling low"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"]["outcome"], "replied");
    assert_eq!(body["new_messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["remaining_messages"], 19);
}

#[tokio::test]
async fn test_chat_auto_books_complete_request_with_odd_date() {
    let (state, platform) = test_state();
    let mut events = state.events_tx.subscribe();
    send(&state, post_json("/api/chat/open", json!({}))).await;

    let (status, body) = send(
        &state,
        post_json(
            "/api/chat/message",
            json!({"message": "book with Dr. Lee tomorrow at 14:00 for 60 minutes"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"]["outcome"], "booked");
    assert_eq!(body["outcome"]["appointment_id"], "42");
    assert_eq!(platform.auto_bookings.load(Ordering::SeqCst), 1);

    let confirmation = body["new_messages"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(confirmation["id"], "booking-confirmed-42");
    assert!(confirmation["content"]
        .as_str()
        .unwrap()
        .contains("sometime next week at 14:00"));

    // user message then confirmation reach the event stream
    let first = events.recv().await.unwrap();
    let second = events.recv().await.unwrap();
    let second = serde_json::to_value(second).unwrap();
    assert_eq!(serde_json::to_value(first).unwrap()["event"], "message");
    assert_eq!(second["message"]["id"], "booking-confirmed-42");
}

#[tokio::test]
async fn test_chat_quota_blocks_next_message() {
    let mut config = test_config();
    config.daily_message_limit = 2;
    let (state, platform, assistant) = test_state_with_assistant(config);
    send(&state, post_json("/api/chat/open", json!({}))).await;

    for text in ["first", "second"] {
        let (_, body) =
            send(&state, post_json("/api/chat/message", json!({"message": text}))).await;
        assert_eq!(body["outcome"]["outcome"], "replied");
    }
    let platform_calls = platform.calls.load(Ordering::SeqCst);
    let assistant_calls = assistant.calls.load(Ordering::SeqCst);
    assert_eq!(assistant_calls, 2);

    for text in ["third", "fourth"] {
        let (status, body) =
            send(&state, post_json("/api/chat/message", json!({"message": text}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"]["outcome"], "quota_exceeded");
        assert_eq!(body["new_messages"][0]["kind"]["type"], "upgrade_prompt");
    }
    assert_eq!(platform.calls.load(Ordering::SeqCst), platform_calls);
    assert_eq!(assistant.calls.load(Ordering::SeqCst), assistant_calls);

    // reopening does not reset the daily counter
    send(&state, post_json("/api/chat/close", json!({}))).await;
    let (_, body) = send(&state, post_json("/api/chat/open", json!({}))).await;
    assert_eq!(body["remaining_messages"], 0);
    assert_eq!(body["messages"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_admin_tier_unlimited() {
    let mut config = test_config();
    config.daily_message_limit = 1;
    config.account_tier = AccountTier::Admin;
    let (state, _) = test_state_with(config);
    send(&state, post_json("/api/chat/open", json!({}))).await;

    for text in ["one", "two", "three"] {
        let (_, body) =
            send(&state, post_json("/api/chat/message", json!({"message": text}))).await;
        assert_eq!(body["outcome"]["outcome"], "replied");
        assert!(body["remaining_messages"].is_null());
    }
}

#[tokio::test]
async fn test_anonymous_chat_keeps_no_history() {
    let mut config = test_config();
    config.api_token.clear();
    let (state, _) = test_state_with(config);

    send(&state, post_json("/api/chat/open", json!({}))).await;
    send(&state, post_json("/api/chat/message", json!({"message": "hello"}))).await;
    send(&state, post_json("/api/chat/close", json!({}))).await;

    let (_, body) = send(&state, post_json("/api/chat/open", json!({}))).await;
    assert_eq!(body["anonymous"], true);
    assert!(body["messages"].as_array().unwrap().is_empty());
    assert_eq!(body["remaining_messages"], 19);
}
