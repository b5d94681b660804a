//! Durable notifications plus the realtime layer on top of them: presence, order chat rooms, and live fan-out.
mod hub;

pub use hub::{ChatMessage, NotificationHub};
