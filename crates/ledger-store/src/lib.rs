//! Transactional persistence for the fulfillment ledger.
//!
//! A fulfillment transition is a multi-step mutation (stock writes, movement
//! inserts, a balance write, order/line status updates, an audit entry) that
//! must become visible all at once or not at all. This crate provides:
//!
//! - [`LedgerStore`] / [`LedgerTxn`] — the transactional store contract
//! - [`InMemoryLedgerStore`] — in-memory implementation for tests and demos,
//!   with failure injection
//! - [`PostgresLedgerStore`] — PostgreSQL implementation using row locks
//! - The append-only record types: [`InventoryMovement`],
//!   [`AccountMovement`], [`WorkLogEntry`]

pub mod error;
pub mod memory;
pub mod movement;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryLedgerStore;
pub use movement::{
    AccountMovement, AccountMovementType, InventoryMovement, StockMovementType, WorkLogEntry,
};
pub use postgres::PostgresLedgerStore;
pub use store::{LedgerStore, LedgerTxn};
