use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::models::{ChatMessage, StoredChat};

// ── Transcripts ──

pub fn get_transcript(conn: &Connection, user_key: &str) -> anyhow::Result<Option<StoredChat>> {
    let row = conn
        .query_row(
            "SELECT conversation_id, messages, daily_usage_count, daily_usage_date
             FROM chat_transcripts WHERE user_key = ?1",
            params![user_key],
            |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((conversation_id, messages_json, daily_usage_count, date_str)) = row else {
        return Ok(None);
    };

    let messages: Vec<ChatMessage> = serde_json::from_str(&messages_json).unwrap_or_else(|e| {
        tracing::warn!(user = user_key, error = %e, "discarding unreadable transcript");
        vec![]
    });
    let daily_usage_date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")?;

    Ok(Some(StoredChat {
        conversation_id,
        messages,
        daily_usage_count,
        daily_usage_date,
    }))
}

pub fn save_transcript(conn: &Connection, user_key: &str, chat: &StoredChat) -> anyhow::Result<()> {
    let messages_json = serde_json::to_string(&chat.messages)?;
    let date = chat.daily_usage_date.format("%Y-%m-%d").to_string();

    conn.execute(
        "INSERT INTO chat_transcripts (user_key, conversation_id, messages, daily_usage_count, daily_usage_date, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
         ON CONFLICT(user_key) DO UPDATE SET
           conversation_id = excluded.conversation_id,
           messages = excluded.messages,
           daily_usage_count = excluded.daily_usage_count,
           daily_usage_date = excluded.daily_usage_date,
           updated_at = excluded.updated_at",
        params![user_key, chat.conversation_id, messages_json, chat.daily_usage_count, date],
    )?;
    Ok(())
}

// ── Booking log ──

#[derive(Debug, Clone, Serialize)]
pub struct BookingLogEntry {
    pub id: i64,
    pub appointment_id: Option<String>,
    pub outcome: String,
    pub detail: String,
    pub created_at: String,
}

pub fn insert_booking_log(
    conn: &Connection,
    user_key: &str,
    appointment_id: Option<&str>,
    outcome: &str,
    detail: &str,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO booking_log (user_key, appointment_id, outcome, detail) VALUES (?1, ?2, ?3, ?4)",
        params![user_key, appointment_id, outcome, detail],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_booking_log(
    conn: &Connection,
    user_key: &str,
    limit: i64,
) -> anyhow::Result<Vec<BookingLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, appointment_id, outcome, detail, created_at
         FROM booking_log WHERE user_key = ?1
         ORDER BY id DESC LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![user_key, limit], |row| {
        Ok(BookingLogEntry {
            id: row.get(0)?,
            appointment_id: row.get(1)?,
            outcome: row.get(2)?,
            detail: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;

    let mut entries = vec![];
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}
