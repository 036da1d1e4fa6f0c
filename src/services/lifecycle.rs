use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::errors::{LifecycleError, SchedulingError};
use crate::models::{Appointment, AppointmentRole, AppointmentStatus};
use crate::services::platform::ConsultationApi;

/// Confirm and cancel are the only transitions started from the client.
/// Statuses seen in the last listing are remembered so illegal transitions
/// are refused without a round trip.
pub struct AppointmentLifecycle {
    api: Arc<dyn ConsultationApi>,
    known: Mutex<HashMap<String, AppointmentStatus>>,
}

impl AppointmentLifecycle {
    pub fn new(api: Arc<dyn ConsultationApi>) -> Self {
        Self {
            api,
            known: Mutex::new(HashMap::new()),
        }
    }

    pub fn known_status(&self, id: &str) -> Option<AppointmentStatus> {
        self.known.lock().ok()?.get(id).copied()
    }

    fn remember(&self, id: &str, status: AppointmentStatus) {
        if let Ok(mut known) = self.known.lock() {
            known.insert(id.to_string(), status);
        }
    }

    fn check_transition(&self, id: &str, target: AppointmentStatus) -> Result<(), SchedulingError> {
        match self.known_status(id) {
            Some(current) if !current.can_transition_to(&target) => {
                tracing::warn!(
                    appointment = id,
                    from = current.as_str(),
                    to = target.as_str(),
                    "illegal status transition"
                );
                Err(SchedulingError::Validation(format!(
                    "a {} appointment cannot become {}",
                    current.as_str().to_lowercase(),
                    target.as_str().to_lowercase()
                )))
            }
            _ => Ok(()),
        }
    }

    pub async fn list(&self, role: AppointmentRole) -> Result<Vec<Appointment>, LifecycleError> {
        let appointments = self.api.list_appointments(role).await?;
        if let Ok(mut known) = self.known.lock() {
            for appt in &appointments {
                known.insert(appt.id.clone(), appt.status);
            }
        }
        Ok(appointments)
    }

    pub async fn confirm(&self, id: &str) -> Result<AppointmentStatus, LifecycleError> {
        self.check_transition(id, AppointmentStatus::Confirmed)?;
        self.api.confirm_appointment(id).await?;
        self.remember(id, AppointmentStatus::Confirmed);
        tracing::info!(appointment = id, "appointment confirmed");
        Ok(AppointmentStatus::Confirmed)
    }

    pub async fn cancel(
        &self,
        id: &str,
        reason: &str,
        role: AppointmentRole,
    ) -> Result<AppointmentStatus, LifecycleError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(SchedulingError::Validation(
                "a cancellation reason is required".to_string(),
            )
            .into());
        }
        self.check_transition(id, AppointmentStatus::Cancelled)?;

        self.api
            .cancel_appointment(id, reason, role.cancelled_by())
            .await?;
        self.remember(id, AppointmentStatus::Cancelled);
        tracing::info!(
            appointment = id,
            by = role.cancelled_by().as_str(),
            "appointment cancelled"
        );
        Ok(AppointmentStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use crate::errors::ApiError;
    use crate::models::{
        AppointmentRequest, AutoBookingRequest, AutoBookingResponse, CancelledBy, Expert,
        SlotQuery, SlotQueryResponse,
    };

    #[derive(Default)]
    struct CountingApi {
        calls: AtomicUsize,
        cancelled: Mutex<Vec<(String, String, CancelledBy)>>,
    }

    #[async_trait]
    impl ConsultationApi for CountingApi {
        async fn available_experts(&self) -> Result<Vec<Expert>, ApiError> {
            Ok(vec![])
        }
        async fn available_slots(&self, _q: &SlotQuery) -> Result<SlotQueryResponse, ApiError> {
            unimplemented!()
        }
        async fn create_appointment(
            &self,
            _r: &AppointmentRequest,
        ) -> Result<Appointment, ApiError> {
            unimplemented!()
        }
        async fn auto_book(
            &self,
            _r: &AutoBookingRequest,
        ) -> Result<AutoBookingResponse, ApiError> {
            unimplemented!()
        }
        async fn confirm_appointment(&self, _id: &str) -> Result<(), ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn cancel_appointment(
            &self,
            id: &str,
            reason: &str,
            by: CancelledBy,
        ) -> Result<(), ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.cancelled
                .lock()
                .unwrap()
                .push((id.to_string(), reason.to_string(), by));
            Ok(())
        }
        async fn list_appointments(
            &self,
            _r: AppointmentRole,
        ) -> Result<Vec<Appointment>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_value(json!([
                {"id": 42, "status": "CANCELLED"},
                {"id": 43, "status": "PENDING"}
            ]))
            .unwrap())
        }
    }

    #[tokio::test]
    async fn test_blank_reason_never_reaches_network() {
        let api = Arc::new(CountingApi::default());
        let lifecycle = AppointmentLifecycle::new(api.clone());

        for reason in ["", "   ", "\t\n"] {
            let err = lifecycle
                .cancel("42", reason, AppointmentRole::Student)
                .await
                .unwrap_err();
            assert!(matches!(err, LifecycleError::Rejected(SchedulingError::Validation(_))));
        }
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_sends_trimmed_reason_and_role() {
        let api = Arc::new(CountingApi::default());
        let lifecycle = AppointmentLifecycle::new(api.clone());

        let status = lifecycle
            .cancel("43", "  exam clash ", AppointmentRole::Expert)
            .await
            .unwrap();
        assert_eq!(status, AppointmentStatus::Cancelled);
        assert_eq!(
            api.cancelled.lock().unwrap()[0],
            ("43".to_string(), "exam clash".to_string(), CancelledBy::Expert)
        );
        assert_eq!(lifecycle.known_status("43"), Some(AppointmentStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_illegal_transition_rejected_locally() {
        let api = Arc::new(CountingApi::default());
        let lifecycle = AppointmentLifecycle::new(api.clone());
        lifecycle.list(AppointmentRole::Student).await.unwrap();
        let after_list = api.calls.load(Ordering::SeqCst);

        let err = lifecycle.confirm("42").await.unwrap_err();
        assert!(matches!(err, LifecycleError::Rejected(SchedulingError::Validation(_))));
        assert_eq!(api.calls.load(Ordering::SeqCst), after_list);

        assert_eq!(lifecycle.confirm("43").await.unwrap(), AppointmentStatus::Confirmed);
        assert_eq!(lifecycle.known_status("43"), Some(AppointmentStatus::Confirmed));
    }

    #[tokio::test]
    async fn test_unknown_appointment_is_left_to_the_server() {
        let api = Arc::new(CountingApi::default());
        let lifecycle = AppointmentLifecycle::new(api.clone());
        assert!(lifecycle.confirm("99").await.is_ok());
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }
}
