pub mod http;

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::ApiError;
use crate::models::{
    Appointment, AppointmentRequest, AppointmentRole, AutoBookingRequest, AutoBookingResponse,
    CancelledBy, Expert, SlotQuery, SlotQueryResponse,
};

/// Invoked whenever the platform answers 401.
pub type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// The platform REST API the scheduling core calls into.
#[async_trait]
pub trait ConsultationApi: Send + Sync {
    async fn available_experts(&self) -> Result<Vec<Expert>, ApiError>;

    async fn available_slots(&self, query: &SlotQuery) -> Result<SlotQueryResponse, ApiError>;

    async fn create_appointment(
        &self,
        request: &AppointmentRequest,
    ) -> Result<Appointment, ApiError>;

    async fn auto_book(
        &self,
        request: &AutoBookingRequest,
    ) -> Result<AutoBookingResponse, ApiError>;

    async fn confirm_appointment(&self, id: &str) -> Result<(), ApiError>;

    async fn cancel_appointment(
        &self,
        id: &str,
        reason: &str,
        cancelled_by: CancelledBy,
    ) -> Result<(), ApiError>;

    async fn list_appointments(&self, role: AppointmentRole) -> Result<Vec<Appointment>, ApiError>;
}
