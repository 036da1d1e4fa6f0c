use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::appointment::Expert;
use super::intent::IntentCategory;

pub const ANONYMOUS_KEY: &str = "anonymous";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountTier {
    #[default]
    Free,
    Premium,
    Expert,
    Admin,
}

impl AccountTier {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "premium" => AccountTier::Premium,
            "expert" => AccountTier::Expert,
            "admin" => AccountTier::Admin,
            _ => AccountTier::Free,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        !matches!(self, AccountTier::Free)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: Option<String>,
    pub tier: AccountTier,
}

impl UserIdentity {
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            tier: AccountTier::Free,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    /// Key for session, transcript and quota scoping.
    pub fn key(&self) -> &str {
        self.user_id.as_deref().unwrap_or(ANONYMOUS_KEY)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    AwaitingReply,
    Suggesting,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingReply => "awaiting_reply",
            SessionState::Suggesting => "suggesting",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum MessageKind {
    Text,
    /// Buttons offering the listed experts for booking.
    AppointmentButtons { experts: Vec<Expert> },
    BookingConfirmed { appointment_id: String },
    /// Auto-booking failed; the UI offers the manual booking modal.
    BookingFailed { reason: String },
    UpgradePrompt,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub kind: MessageKind,
}

impl ChatMessage {
    pub fn user(content: &str) -> Self {
        Self::with_kind(Role::User, content, MessageKind::Text)
    }

    pub fn assistant(content: &str) -> Self {
        Self::with_kind(Role::Assistant, content, MessageKind::Text)
    }

    pub fn with_kind(role: Role, content: &str, kind: MessageKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.to_string(),
            kind,
        }
    }

    pub fn has_appointment_buttons(&self) -> bool {
        matches!(self.kind, MessageKind::AppointmentButtons { .. })
    }
}

/// Pushed to the UI over the event stream.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum ChatEvent {
    Message {
        session_id: String,
        message: ChatMessage,
    },
    /// The platform rejected the stored credentials.
    SessionExpired,
}

/// What survives between openings of the chat surface for a logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChat {
    pub conversation_id: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub daily_usage_count: u32,
    pub daily_usage_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub user: UserIdentity,
    pub conversation_id: Option<String>,
    pub session_id: String,
    pub state: SessionState,
    pub message_count: u32,
    pub detected_intent: IntentCategory,
    pub booking_intent_detected: bool,
    pub collected_keywords: BTreeSet<String>,
    pub daily_usage_count: u32,
    pub daily_usage_date: NaiveDate,
    pub messages: Vec<ChatMessage>,
    pub experts: Vec<Expert>,
    pub experts_fetch_attempted: bool,
    pub expert_suggestion_shown: bool,
    pub urgent_suggestion_shown: bool,
    pub long_conversation_suggestion_shown: bool,
}

impl ChatSession {
    pub fn new(user: UserIdentity, today: NaiveDate) -> Self {
        Self {
            user,
            conversation_id: None,
            session_id: uuid::Uuid::new_v4().to_string(),
            state: SessionState::Idle,
            message_count: 0,
            detected_intent: IntentCategory::General,
            booking_intent_detected: false,
            collected_keywords: BTreeSet::new(),
            daily_usage_count: 0,
            daily_usage_date: today,
            messages: vec![],
            experts: vec![],
            experts_fetch_attempted: false,
            expert_suggestion_shown: false,
            urgent_suggestion_shown: false,
            long_conversation_suggestion_shown: false,
        }
    }

    pub fn restore(user: UserIdentity, stored: StoredChat) -> Self {
        let mut session = Self::new(user, stored.daily_usage_date);
        session.conversation_id = stored.conversation_id;
        session.daily_usage_count = stored.daily_usage_count;
        session.messages = stored.messages;
        session
    }

    pub fn to_stored(&self) -> StoredChat {
        StoredChat {
            conversation_id: self.conversation_id.clone(),
            messages: self.messages.clone(),
            daily_usage_count: self.daily_usage_count,
            daily_usage_date: self.daily_usage_date,
        }
    }

    /// Starts a new usage day if the calendar date moved on.
    pub fn roll_usage_day(&mut self, today: NaiveDate) {
        if self.daily_usage_date != today {
            self.daily_usage_date = today;
            self.daily_usage_count = 0;
        }
    }

    /// Appends a message, first dropping any message with the same id.
    pub fn push_unique(&mut self, message: ChatMessage) {
        self.messages.retain(|m| m.id != message.id);
        self.messages.push(message);
    }

    pub fn user_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.role == Role::User)
    }

    pub fn user_message_count(&self) -> usize {
        self.user_messages().count()
    }

    pub fn has_appointment_buttons(&self) -> bool {
        self.messages.iter().any(ChatMessage::has_appointment_buttons)
    }

    pub fn merge_keywords<I: IntoIterator<Item = String>>(&mut self, keywords: I) {
        self.collected_keywords.extend(keywords);
    }
}
