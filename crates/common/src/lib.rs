//! Shared identifier types used across the fulfillment ledger crates.

pub mod ids;

pub use ids::{CounterpartyId, MovementId, OrderId, OrderLineId, OrderNo, ProductId, SkuOptionId};
