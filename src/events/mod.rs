//! Engine event hooks.
//!
//! A small stateless pub-sub layer that lets the hosting process react to engine events (order created, status
//! changed, contract signed, payment settled) without reaching into engine state. Handlers are async, receive only
//! the event itself, and run on their own tasks, so a slow hook never blocks an order flow.

mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
