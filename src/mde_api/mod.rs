//! # Marketplace engine public API
//!
//! The `mde_api` module exposes the programmatic API for the marketplace engine. The API is modular, so clients can
//! pick the functionality they need; matching, contracts and payments can each be used on their own.
//!
//! * [`order_flow_api`] is the primary API: it drives orders through their lifecycle and orchestrates the contract,
//!   payment and notification side effects.
//! * [`matching_api`] scores and ranks suppliers for a vendor's request.
//! * [`contract_api`] drafts supply contracts and collects the two signatures.
//! * [`payment_api`] drives charges across the injected payment gateway.
//!
//! The pattern for using the APIs is the same throughout: an API instance is created by supplying a database backend
//! implementing the traits that API requires.
//!
//! ```rust,ignore
//! use mandi_engine::{MatchingApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/mandi_store.db", 5).await?;
//! // SqliteDatabase implements MarketReader
//! let api = MatchingApi::new(db);
//! let best = api.find_best_supplier(vendor_id, "vegetables", &[]).await?;
//! ```

pub mod contract_api;
pub mod errors;
pub mod matching_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_api;
