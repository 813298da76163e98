//! Trader helpers around a gateway session
//!
//! Quick account/position listings, trading rules, quote lookup, quantity
//! validation and order placement. These are thin wrappers: the gateway
//! enforces all order-routing rules.

pub mod executor;

pub use executor::{Quote, Trader, TradingRule};
