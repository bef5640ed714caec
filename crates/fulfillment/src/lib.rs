//! Order fulfillment engine.
//!
//! The engine receives a status-transition request for an order (or a subset
//! of its line items), validates the transition against the order's current
//! state, and orchestrates the three ledgers as one atomic unit:
//!
//! 1. StockLedger applies per-line stock deltas and returns before/after
//!    snapshots
//! 2. TransactionLedger appends one inventory movement per line and one
//!    account movement per order
//! 3. AccountBalance applies the order's signed total to the counterparty
//!    balance
//!
//! The order's (and each line's) new status is then recomputed and
//! persisted, one audit entry is appended, and the whole batch commits or
//! rolls back together.

pub mod account;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod policy;
pub mod stock;
pub mod transition;

pub use account::{AccountBalance, BalanceChange};
pub use engine::FulfillmentEngine;
pub use error::TransitionError;
pub use ledger::TransactionLedger;
pub use policy::{FloorAtZero, ShortfallPolicy};
pub use stock::{StockChange, StockLedger};
pub use transition::{TransitionOutcome, TransitionRequest};
