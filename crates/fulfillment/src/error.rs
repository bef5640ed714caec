//! Fulfillment error types.

use common::OrderId;
use domain::OrderStatus;
use ledger_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the fulfillment engine.
///
/// Every kind leaves persisted state unchanged. Only `Persistence` is
/// expected to be transient; because a failed transition is fully rolled
/// back, callers may retry the whole call without risking a double apply.
#[derive(Debug, Error)]
pub enum TransitionError {
    /// The order ID does not resolve to an existing order.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The requested target status is not reachable from the order's
    /// current status.
    #[error("Illegal transition from {current} to {target}")]
    IllegalTransition {
        current: OrderStatus,
        target: OrderStatus,
    },

    /// The line scope resolved to zero matching pending lines.
    #[error("Line scope matched no pending lines")]
    EmptyScope,

    /// The order has shipped lines and may no longer be physically deleted.
    #[error("Order {0} has shipped lines and cannot be deleted")]
    DeletionRejected(OrderId),

    /// The underlying atomic write failed; the entire transition was rolled
    /// back.
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

/// Result type for fulfillment operations.
pub type Result<T> = std::result::Result<T, TransitionError>;
