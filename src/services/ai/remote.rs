use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

use super::{AssistantProvider, AssistantReply};
use crate::services::platform::SessionExpiredHook;

/// The platform's own chat endpoint.
pub struct RemoteAssistant {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
    on_session_expired: Option<SessionExpiredHook>,
}

impl RemoteAssistant {
    pub fn new(base_url: String, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            client: reqwest::Client::new(),
            on_session_expired: None,
        }
    }

    /// Same contract as the platform client: called on every 401.
    pub fn on_session_expired(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_session_expired = Some(Arc::new(hook));
        self
    }
}

#[async_trait]
impl AssistantProvider for RemoteAssistant {
    async fn reply(
        &self,
        message: &str,
        conversation_id: Option<&str>,
        session_id: &str,
    ) -> anyhow::Result<AssistantReply> {
        let body = json!({
            "message": message,
            "conversationId": conversation_id,
            "sessionId": session_id,
        });

        let mut request = self
            .client
            .post(format!("{}/chat", self.base_url))
            .json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .context("failed to call chat API")?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("chat API rejected credentials, session expired");
            if let Some(hook) = &self.on_session_expired {
                hook();
            }
            anyhow::bail!("session expired");
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("chat API error ({status}): {text}");
        }

        let reply: AssistantReply = resp
            .json()
            .await
            .context("failed to parse chat response")?;

        if reply.reply.trim().is_empty() {
            anyhow::bail!("empty reply from chat API");
        }
        Ok(reply)
    }
}
