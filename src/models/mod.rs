pub mod appointment;
pub mod chat;
pub mod intent;
pub mod slot;
pub mod working_hours;

pub use appointment::{
    Appointment, AppointmentRequest, AppointmentRole, AppointmentStatus, AutoBookingRequest,
    AutoBookingResponse, AvailableSlotEntry, CancelledBy, ConsultationType, Expert, SlotQuery,
    SlotQueryResponse,
};
pub use chat::{
    AccountTier, ChatEvent, ChatMessage, ChatSession, MessageKind, Role, SessionState, StoredChat,
    UserIdentity,
};
pub use intent::{BookingIntent, DateReference, IntentCategory};
pub use slot::{AvailabilityState, TimeSlot};
pub use working_hours::{OpenRange, WorkingHours, WorkingHoursRule};
