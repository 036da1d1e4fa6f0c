use std::env;

use anyhow::Context;

use crate::models::{AccountTier, UserIdentity, WorkingHours};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub api_base_url: String,
    pub api_token: String,
    pub user_id: String,
    pub account_tier: AccountTier,
    pub daily_message_limit: u32,
    pub long_conversation_threshold: usize,
    pub expert_suggestion_delay_ms: u64,
    pub working_hours: WorkingHours,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let working_hours = match env::var("WORKING_HOURS") {
            Ok(raw) if !raw.trim().is_empty() => {
                WorkingHours::from_json(&raw).context("invalid WORKING_HOURS")?
            }
            _ => WorkingHours::default(),
        };

        Ok(Self {
            port: parsed("PORT", 3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "carebook.db".to_string()),
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080/api".to_string()),
            api_token: env::var("API_TOKEN").unwrap_or_default(),
            user_id: env::var("USER_ID").unwrap_or_default(),
            account_tier: AccountTier::parse(&env::var("ACCOUNT_TIER").unwrap_or_default()),
            daily_message_limit: parsed("DAILY_MESSAGE_LIMIT", 20),
            long_conversation_threshold: parsed("LONG_CONVERSATION_THRESHOLD", 5),
            expert_suggestion_delay_ms: parsed("EXPERT_SUGGESTION_DELAY_MS", 1500),
            working_hours,
        })
    }

    /// Signed in only with both a token and a user id.
    pub fn identity(&self) -> UserIdentity {
        if self.api_token.is_empty() || self.user_id.is_empty() {
            return UserIdentity::anonymous();
        }
        UserIdentity {
            user_id: Some(self.user_id.clone()),
            tier: self.account_tier,
        }
    }

    pub fn api_token(&self) -> Option<String> {
        Some(self.api_token.clone()).filter(|t| !t.is_empty())
    }
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
