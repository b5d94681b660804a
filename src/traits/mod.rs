//! Contracts between the engine and its collaborators.
//!
//! The engine never talks to a concrete database, payment gateway or socket server. Each of those is an injected
//! implementation of one of the traits in this module:
//!
//! * [`MarketplaceDatabase`] is the write-side persistence contract. Every check-then-act sequence the engine needs
//!   (stock reservation, contract signing, payment settlement, state transitions) is specified here as a single
//!   atomic operation, so a conforming backend cannot oversell stock or double-apply a transition regardless of how
//!   many request handlers run concurrently.
//! * [`MarketReader`] is the query side: fetches, searches and history aggregates.
//! * [`PaymentGateway`] models the external payment processor. Production wires up [`MockGateway`]; tests inject
//!   [`StaticGateway`] to force either outcome deterministically.
//! * [`RealtimePublisher`] is the transport the notification hub publishes through. Connection management belongs to
//!   the transport, not the engine.

mod data_objects;
mod gateway;
mod market_reader;
mod marketplace_database;
mod realtime;

pub use data_objects::{
    NewNotification,
    ReservationResult,
    SettlementOutcome,
    SignOutcome,
    SupplierCandidate,
    SupplierStats,
    VendorStats,
};
pub use gateway::{ChargeRequest, GatewayError, GatewayReceipt, MockGateway, PaymentGateway, StaticGateway};
pub use market_reader::MarketReader;
pub use marketplace_database::{MarketplaceDatabase, MarketplaceError};
pub use realtime::{
    ChannelMessage,
    ChannelName,
    MemoryPublisher,
    PublishError,
    RealtimeEvent,
    RealtimePublisher,
    EVENT_RECEIVE_MESSAGE,
    EVENT_USER_STATUS_CHANGE,
    EVENT_USER_TYPING,
};
