use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use rusqlite::Connection;

use crate::db::queries::{self, BookingLogEntry};
use crate::models::StoredChat;
use crate::services::booking::BookingOutcome;

/// Persistence for chat transcripts, quota counters and booking attempts,
/// keyed by user.
pub trait TranscriptStore: Send + Sync {
    fn load(&self, user_key: &str) -> anyhow::Result<Option<StoredChat>>;

    fn save(&self, user_key: &str, chat: &StoredChat) -> anyhow::Result<()>;

    fn record_booking(&self, user_key: &str, outcome: &BookingOutcome) -> anyhow::Result<()>;

    fn booking_log(&self, user_key: &str, limit: i64) -> anyhow::Result<Vec<BookingLogEntry>>;
}

pub struct SqliteTranscriptStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteTranscriptStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> anyhow::Result<T>) -> anyhow::Result<T> {
        let conn = self.db.lock().map_err(|_| anyhow!("database lock poisoned"))?;
        f(&conn)
    }
}

impl TranscriptStore for SqliteTranscriptStore {
    fn load(&self, user_key: &str) -> anyhow::Result<Option<StoredChat>> {
        self.with_conn(|conn| queries::get_transcript(conn, user_key))
    }

    fn save(&self, user_key: &str, chat: &StoredChat) -> anyhow::Result<()> {
        self.with_conn(|conn| queries::save_transcript(conn, user_key, chat))
    }

    fn record_booking(&self, user_key: &str, outcome: &BookingOutcome) -> anyhow::Result<()> {
        let (appointment_id, label, detail) = match outcome {
            BookingOutcome::Confirmed(booking) => (
                Some(booking.appointment_id.as_str()),
                "confirmed",
                format!("{} {}", booking.expert_name, booking.schedule.date_label),
            ),
            BookingOutcome::Failed { reason } => (None, "failed", reason.clone()),
            BookingOutcome::Suppressed => (None, "suppressed", String::new()),
        };
        self.with_conn(|conn| {
            queries::insert_booking_log(conn, user_key, appointment_id, label, &detail)?;
            Ok(())
        })
    }

    fn booking_log(&self, user_key: &str, limit: i64) -> anyhow::Result<Vec<BookingLogEntry>> {
        self.with_conn(|conn| queries::get_booking_log(conn, user_key, limit))
    }
}

/// Anonymous actors get no history.
pub struct NullTranscriptStore;

impl TranscriptStore for NullTranscriptStore {
    fn load(&self, _user_key: &str) -> anyhow::Result<Option<StoredChat>> {
        Ok(None)
    }

    fn save(&self, _user_key: &str, _chat: &StoredChat) -> anyhow::Result<()> {
        Ok(())
    }

    fn record_booking(&self, _user_key: &str, _outcome: &BookingOutcome) -> anyhow::Result<()> {
        Ok(())
    }

    fn booking_log(&self, _user_key: &str, _limit: i64) -> anyhow::Result<Vec<BookingLogEntry>> {
        Ok(vec![])
    }
}
