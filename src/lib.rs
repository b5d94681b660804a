//! Mandi Engine
//!
//! The Mandi Engine is the core of a street-food supply marketplace: vendors find nearby suppliers, place orders
//! against live stock, sign supply contracts and pay for deliveries. This library contains all of the engine logic
//! and is transport-agnostic; an HTTP or socket server is expected to sit in front of it.
//!
//! The library is divided into three main sections:
//! 1. Persistence ([`mod@sqlite`] and the contracts in [`mod@traits`]). SQLite is the bundled backend. You should
//!    never need to access the database directly; use the public API instead. The exception is the data types used
//!    by the database, which are defined in [`mod@db_types`] and are public.
//! 2. The engine public API ([`mod@mde_api`]): supplier matching, the order lifecycle, contracts and payments. Any
//!    backend implementing the traits in [`mod@traits`] can stand in for the bundled one.
//! 3. Delivery ([`mod@notifications`]): durable notifications with realtime fan-out, presence tracking and
//!    per-order chat, published through an injected [`RealtimePublisher`].
//!
//! The engine also emits events (order created, status changed, contract signed, payment settled) through a small
//! actor-style hook framework in [`mod@events`], so hosts can react to engine activity without polling.
mod op;

pub mod db_types;
pub mod events;
pub mod geo;
pub mod helpers;
pub mod mde_api;
pub mod notifications;
pub mod traits;
pub mod trust;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use mde_api::{
    contract_api::ContractApi,
    errors::OrderFlowError,
    matching_api::{MatchingApi, SupplierMatch},
    order_flow_api::OrderFlowApi,
    order_objects,
    payment_api::{PaymentApi, PaymentOutcome},
};
pub use notifications::NotificationHub;
pub use traits::{MarketReader, MarketplaceDatabase, MarketplaceError, PaymentGateway, RealtimePublisher};
