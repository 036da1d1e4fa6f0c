use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Local;
use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::models::{ChatEvent, ChatMessage, ChatSession};
use crate::services::ai::AssistantProvider;
use crate::services::availability::SlotBoard;
use crate::services::booking::AutoBookingOrchestrator;
use crate::services::conversation::{ChatCoordinator, CoordinatorSettings};
use crate::services::lifecycle::AppointmentLifecycle;
use crate::services::platform::ConsultationApi;
use crate::services::store::{SqliteTranscriptStore, TranscriptStore};

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub api: Arc<dyn ConsultationApi>,
    pub store: Arc<dyn TranscriptStore>,
    pub orchestrator: Arc<AutoBookingOrchestrator>,
    pub coordinator: ChatCoordinator,
    pub lifecycle: AppointmentLifecycle,
    /// Open chat sessions by user key.
    pub sessions: tokio::sync::Mutex<HashMap<String, ChatSession>>,
    pub slot_board: Mutex<SlotBoard>,
    pub events_tx: broadcast::Sender<ChatEvent>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        conn: Connection,
        api: Arc<dyn ConsultationApi>,
        assistant: Arc<dyn AssistantProvider>,
        events_tx: broadcast::Sender<ChatEvent>,
    ) -> anyhow::Result<Self> {
        let db = Arc::new(Mutex::new(conn));
        let store: Arc<dyn TranscriptStore> = Arc::new(SqliteTranscriptStore::new(Arc::clone(&db)));
        let orchestrator = Arc::new(AutoBookingOrchestrator::new(Arc::clone(&api)));
        let settings = CoordinatorSettings {
            daily_message_limit: config.daily_message_limit,
            long_conversation_threshold: config.long_conversation_threshold,
        };
        let coordinator = ChatCoordinator::new(
            settings,
            Arc::clone(&api),
            assistant,
            Arc::clone(&store),
            Arc::clone(&orchestrator),
        )?;
        let now = Local::now().naive_local();
        let slot_board = SlotBoard::new(now.date(), &config.working_hours, now);

        Ok(Self {
            db,
            lifecycle: AppointmentLifecycle::new(Arc::clone(&api)),
            config,
            api,
            store,
            orchestrator,
            coordinator,
            sessions: tokio::sync::Mutex::new(HashMap::new()),
            slot_board: Mutex::new(slot_board),
            events_tx,
        })
    }

    /// Fan a chat message out to event-stream subscribers. Having none is fine.
    pub fn publish(&self, session_id: &str, message: &ChatMessage) {
        let _ = self.events_tx.send(ChatEvent::Message {
            session_id: session_id.to_string(),
            message: message.clone(),
        });
    }
}
