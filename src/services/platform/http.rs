use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::{ConsultationApi, SessionExpiredHook};
use crate::errors::ApiError;
use crate::models::{
    Appointment, AppointmentRequest, AppointmentRole, AutoBookingRequest, AutoBookingResponse,
    CancelledBy, Expert, SlotQuery, SlotQueryResponse,
};

const MAX_ERROR_BODY_CHARS: usize = 300;

pub struct HttpConsultationApi {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
    on_session_expired: Option<SessionExpiredHook>,
}

impl HttpConsultationApi {
    pub fn new(base_url: String, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            client: reqwest::Client::new(),
            on_session_expired: None,
        }
    }

    /// Called whenever the platform answers 401.
    pub fn on_session_expired(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_session_expired = Some(Arc::new(hook));
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let resp = builder.send().await?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("platform rejected credentials, session expired");
            if let Some(hook) = &self.on_session_expired {
                hook();
            }
            return Err(ApiError::SessionExpired);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = error_message(&body);
            tracing::warn!(status = %status, message = %message, "platform request failed");
            return Err(ApiError::Status { status, message });
        }

        Ok(resp)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let resp = self.execute(builder).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Pulls a human-readable message out of an error body, which may be JSON
/// with a `message`/`error` field or plain text.
fn error_message(body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        for key in ["message", "error", "detail"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[async_trait]
impl ConsultationApi for HttpConsultationApi {
    async fn available_experts(&self) -> Result<Vec<Expert>, ApiError> {
        self.send(self.request(Method::GET, "/available-experts"))
            .await
    }

    async fn available_slots(&self, query: &SlotQuery) -> Result<SlotQueryResponse, ApiError> {
        tracing::debug!(
            expert = %query.expert_id,
            date = %query.start_date,
            "querying available slots"
        );
        self.send(
            self.request(Method::POST, "/appointments/available-slots")
                .json(query),
        )
        .await
    }

    async fn create_appointment(
        &self,
        request: &AppointmentRequest,
    ) -> Result<Appointment, ApiError> {
        self.send(self.request(Method::POST, "/appointments").json(request))
            .await
    }

    async fn auto_book(
        &self,
        request: &AutoBookingRequest,
    ) -> Result<AutoBookingResponse, ApiError> {
        self.send(self.request(Method::POST, "/auto-booking").json(request))
            .await
    }

    async fn confirm_appointment(&self, id: &str) -> Result<(), ApiError> {
        self.execute(self.request(Method::PUT, &format!("/appointments/{id}/confirm")))
            .await?;
        Ok(())
    }

    async fn cancel_appointment(
        &self,
        id: &str,
        reason: &str,
        cancelled_by: CancelledBy,
    ) -> Result<(), ApiError> {
        self.execute(
            self.request(Method::PUT, &format!("/appointments/{id}/cancel"))
                .query(&[("reason", reason), ("cancelledBy", cancelled_by.as_str())]),
        )
        .await?;
        Ok(())
    }

    async fn list_appointments(&self, role: AppointmentRole) -> Result<Vec<Appointment>, ApiError> {
        self.send(self.request(
            Method::GET,
            &format!("/appointments/{}", role.path_segment()),
        ))
        .await
    }
}
