use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::Serialize;

use crate::errors::SchedulingError;
use crate::models::{
    BookingIntent, ChatMessage, ChatSession, MessageKind, Role, SessionState, UserIdentity,
};
use crate::services::ai::AssistantProvider;
use crate::services::booking::{AutoBookingOrchestrator, BookingOptions, BookingOutcome};
use crate::services::intent::classifier::RECENT_UTTERANCES;
use crate::services::intent::lexicon::{matches_any, BOOKING_WORDS, URGENT_WORDS};
use crate::services::intent::{classify, matched_keywords, rank_experts, IntentExtractor};
use crate::services::platform::ConsultationApi;
use crate::services::store::{NullTranscriptStore, TranscriptStore};

const ASSISTANT_RETRY_NOTICE: &str =
    "I couldn't reach the assistant just now. Please try sending that again.";

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorSettings {
    pub daily_message_limit: u32,
    pub long_conversation_threshold: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            daily_message_limit: 20,
            long_conversation_threshold: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum TurnOutcome {
    Replied,
    /// Booking words without enough detail; experts were offered instead.
    Suggested,
    Booked { appointment_id: String },
    BookingFailed { reason: String },
    BookingSuppressed,
    AssistantUnavailable,
    QuotaExceeded { limit: u32 },
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub outcome: TurnOutcome,
    pub new_messages: Vec<ChatMessage>,
    /// `None` for unlimited tiers.
    pub remaining_messages: Option<u32>,
}

pub struct ChatCoordinator {
    settings: CoordinatorSettings,
    api: Arc<dyn ConsultationApi>,
    assistant: Arc<dyn AssistantProvider>,
    store: Arc<dyn TranscriptStore>,
    orchestrator: Arc<AutoBookingOrchestrator>,
    extractor: IntentExtractor,
    // the anonymous quota scope outlives individual sessions
    anonymous_usage: Mutex<Option<(NaiveDate, u32)>>,
}

impl ChatCoordinator {
    pub fn new(
        settings: CoordinatorSettings,
        api: Arc<dyn ConsultationApi>,
        assistant: Arc<dyn AssistantProvider>,
        store: Arc<dyn TranscriptStore>,
        orchestrator: Arc<AutoBookingOrchestrator>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            settings,
            api,
            assistant,
            store,
            orchestrator,
            extractor: IntentExtractor::new()?,
            anonymous_usage: Mutex::new(None),
        })
    }

    fn store_for(&self, user: &UserIdentity) -> &dyn TranscriptStore {
        if user.is_anonymous() {
            &NullTranscriptStore
        } else {
            self.store.as_ref()
        }
    }

    /// Fresh session per opening. Logged-in users get their transcript and
    /// quota counter back; anonymous users only their quota.
    pub fn open_session(&self, user: UserIdentity, today: NaiveDate) -> ChatSession {
        let stored = match self.store_for(&user).load(user.key()) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(user = user.key(), error = %e, "failed to load transcript");
                None
            }
        };

        let mut session = match stored {
            Some(stored) => ChatSession::restore(user, stored),
            None => ChatSession::new(user, today),
        };

        if session.user.is_anonymous() {
            if let Some((date, count)) = self.anonymous_usage.lock().ok().and_then(|u| *u) {
                session.daily_usage_date = date;
                session.daily_usage_count = count;
            }
        }
        session.roll_usage_day(today);

        tracing::info!(
            user = session.user.key(),
            session = %session.session_id,
            restored_messages = session.messages.len(),
            "chat session opened"
        );
        session
    }

    pub fn close_session(&self, session: &ChatSession) {
        self.persist(session);
        tracing::info!(
            user = session.user.key(),
            session = %session.session_id,
            "chat session closed"
        );
    }

    fn persist(&self, session: &ChatSession) {
        if session.user.is_anonymous() {
            if let Ok(mut usage) = self.anonymous_usage.lock() {
                *usage = Some((session.daily_usage_date, session.daily_usage_count));
            }
            return;
        }
        if let Err(e) = self.store.save(session.user.key(), &session.to_stored()) {
            tracing::error!(user = session.user.key(), error = %e, "failed to save transcript");
        }
    }

    pub fn remaining_messages(&self, session: &ChatSession) -> Option<u32> {
        if session.user.tier.is_unlimited() {
            return None;
        }
        Some(
            self.settings
                .daily_message_limit
                .saturating_sub(session.daily_usage_count),
        )
    }

    pub fn check_quota(&self, session: &ChatSession) -> Result<(), SchedulingError> {
        match self.remaining_messages(session) {
            Some(0) => Err(SchedulingError::QuotaExceeded {
                limit: self.settings.daily_message_limit,
            }),
            _ => Ok(()),
        }
    }

    /// Fetches the expert list once per open session. Returns true when the
    /// list just became non-empty.
    pub async fn load_experts(&self, session: &mut ChatSession) -> bool {
        if session.experts_fetch_attempted {
            return false;
        }
        session.experts_fetch_attempted = true;

        match self.api.available_experts().await {
            Ok(experts) => {
                tracing::info!(count = experts.len(), "expert list loaded");
                session.experts = experts;
                !session.experts.is_empty()
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load expert list");
                false
            }
        }
    }

    /// The delayed expert-availability suggestion. Only once, and never when
    /// appointment buttons are already on screen.
    pub fn offer_expert_availability(&self, session: &mut ChatSession) -> Option<ChatMessage> {
        if session.expert_suggestion_shown
            || session.has_appointment_buttons()
            || session.experts.is_empty()
        {
            return None;
        }
        session.expert_suggestion_shown = true;

        let message = suggestion_message(
            session,
            "Our experts have open slots this week. Would you like to book a consultation?",
        );
        session.push_unique(message.clone());
        self.persist(session);
        Some(message)
    }

    pub async fn handle_user_message(
        &self,
        session: &mut ChatSession,
        text: &str,
        today: NaiveDate,
    ) -> Result<ChatTurn, SchedulingError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SchedulingError::Validation("message is empty".to_string()));
        }

        session.roll_usage_day(today);
        if let Err(e) = self.check_quota(session) {
            tracing::info!(user = session.user.key(), "daily message limit reached");
            let limit = self.settings.daily_message_limit;
            let mut prompt = ChatMessage::with_kind(
                Role::System,
                &format!("{e}. Upgrade your account to keep chatting today."),
                MessageKind::UpgradePrompt,
            );
            prompt.id = format!("upgrade-prompt-{}", session.daily_usage_date);
            session.push_unique(prompt.clone());
            self.persist(session);
            return Ok(ChatTurn {
                outcome: TurnOutcome::QuotaExceeded { limit },
                new_messages: vec![prompt],
                remaining_messages: Some(0),
            });
        }

        let mut posted = Vec::new();
        transition(session, SessionState::AwaitingReply);
        post(session, &mut posted, ChatMessage::user(text));
        session.message_count += 1;
        session.daily_usage_count += 1;

        session.merge_keywords(matched_keywords(text));
        session.detected_intent = {
            let utterances: Vec<&str> = session
                .user_messages()
                .map(|m| m.content.as_str())
                .collect();
            let recent = &utterances[utterances.len().saturating_sub(RECENT_UTTERANCES)..];
            classify(recent.iter().copied())
        };

        let had_booking_intent = session.booking_intent_detected;
        let intent = self.extractor.extract(text);
        let wants_booking = matches_any(text, BOOKING_WORDS);

        tracing::info!(
            user = session.user.key(),
            category = session.detected_intent.as_str(),
            complete = intent.is_complete(),
            booking_words = wants_booking,
            "processing chat message"
        );

        let outcome = if intent.is_complete() {
            session.booking_intent_detected = true;
            self.auto_book(session, &mut posted, &intent, today).await
        } else if wants_booking {
            session.booking_intent_detected = true;
            self.load_experts(session).await;
            transition(session, SessionState::Suggesting);
            let prompt = incomplete_intent_prompt(&intent);
            let message = suggestion_message(session, &prompt);
            post(session, &mut posted, message);
            TurnOutcome::Suggested
        } else {
            self.assistant_turn(session, &mut posted, text).await
        };

        if !session.urgent_suggestion_shown
            && !had_booking_intent
            && matches_any(text, URGENT_WORDS)
        {
            session.urgent_suggestion_shown = true;
            self.load_experts(session).await;
            transition(session, SessionState::Suggesting);
            tracing::warn!(user = session.user.key(), "urgent language detected");
            let message = suggestion_message(
                session,
                "It sounds like you are going through something really hard. \
                 You don't have to face it alone: one of our experts can talk with you. \
                 If you are in immediate danger, please contact local emergency services.",
            );
            post(session, &mut posted, message);
        }

        if !session.long_conversation_suggestion_shown
            && session.user_message_count() >= self.settings.long_conversation_threshold
            && !session.has_appointment_buttons()
            && !session.booking_intent_detected
        {
            session.long_conversation_suggestion_shown = true;
            self.load_experts(session).await;
            transition(session, SessionState::Suggesting);
            let message = suggestion_message(
                session,
                "We've been talking for a while. \
                 Would it help to speak with one of our experts in a session?",
            );
            post(session, &mut posted, message);
        }

        transition(session, SessionState::Idle);
        self.persist(session);

        Ok(ChatTurn {
            outcome,
            new_messages: posted,
            remaining_messages: self.remaining_messages(session),
        })
    }

    async fn auto_book(
        &self,
        session: &mut ChatSession,
        posted: &mut Vec<ChatMessage>,
        intent: &BookingIntent,
        today: NaiveDate,
    ) -> TurnOutcome {
        let result = self
            .orchestrator
            .attempt_auto_book(intent, &BookingOptions::default(), today)
            .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => BookingOutcome::Failed {
                reason: e.to_string(),
            },
        };

        if let Err(e) = self.store_for(&session.user).record_booking(session.user.key(), &outcome) {
            tracing::error!(error = %e, "failed to record booking attempt");
        }

        match outcome {
            BookingOutcome::Confirmed(booking) => {
                post(session, posted, booking.confirmation_message());
                TurnOutcome::Booked {
                    appointment_id: booking.appointment_id,
                }
            }
            BookingOutcome::Failed { reason } => {
                post(session, posted, BookingOutcome::failure_message(&reason));
                TurnOutcome::BookingFailed { reason }
            }
            BookingOutcome::Suppressed => TurnOutcome::BookingSuppressed,
        }
    }

    async fn assistant_turn(
        &self,
        session: &mut ChatSession,
        posted: &mut Vec<ChatMessage>,
        text: &str,
    ) -> TurnOutcome {
        let reply = self
            .assistant
            .reply(text, session.conversation_id.as_deref(), &session.session_id)
            .await;

        match reply {
            Ok(reply) => {
                if reply.conversation_id.is_some() {
                    session.conversation_id = reply.conversation_id;
                }
                post(session, posted, ChatMessage::assistant(&reply.reply));
                TurnOutcome::Replied
            }
            Err(e) => {
                tracing::warn!(error = %e, "assistant reply failed");
                post(
                    session,
                    posted,
                    ChatMessage::with_kind(Role::System, ASSISTANT_RETRY_NOTICE, MessageKind::Text),
                );
                TurnOutcome::AssistantUnavailable
            }
        }
    }
}

fn transition(session: &mut ChatSession, next: SessionState) {
    if session.state != next {
        tracing::debug!(from = session.state.as_str(), to = next.as_str(), "session state");
        session.state = next;
    }
}

fn post(session: &mut ChatSession, posted: &mut Vec<ChatMessage>, message: ChatMessage) {
    posted.retain(|m| m.id != message.id);
    posted.push(message.clone());
    session.push_unique(message);
}

/// A suggestion carries booking buttons when any experts are known.
fn suggestion_message(session: &ChatSession, text: &str) -> ChatMessage {
    if session.experts.is_empty() {
        return ChatMessage::assistant(&format!(
            "{text} You can open the booking form to pick an expert and a time."
        ));
    }
    ChatMessage::with_kind(
        Role::Assistant,
        text,
        MessageKind::AppointmentButtons {
            experts: rank_experts(&session.experts, session.detected_intent),
        },
    )
}

fn incomplete_intent_prompt(intent: &BookingIntent) -> String {
    let mut missing = Vec::new();
    if intent.expert.is_none() {
        missing.push("which expert");
    }
    if intent.date.is_none() {
        missing.push("which day");
    }
    if intent.time.is_none() {
        missing.push("what time");
    }
    format!(
        "I can book that for you. Tell me {}, or choose an expert below.",
        missing.join(" and ")
    )
}
