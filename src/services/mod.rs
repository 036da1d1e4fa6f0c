pub mod ai;
pub mod availability;
pub mod booking;
pub mod conversation;
pub mod intent;
pub mod lifecycle;
pub mod platform;
pub mod slots;
pub mod store;
pub mod temporal;
