pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReply {
    pub reply: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Answers ordinary (non-booking) chat turns.
#[async_trait]
pub trait AssistantProvider: Send + Sync {
    async fn reply(
        &self,
        message: &str,
        conversation_id: Option<&str>,
        session_id: &str,
    ) -> anyhow::Result<AssistantReply>;
}
