//! Transition request and outcome types.

use common::{OrderId, OrderLineId, OrderNo};
use domain::{Money, OrderStatus};
use ledger_store::{AccountMovement, InventoryMovement};
use serde::{Deserialize, Serialize};

/// A status-transition request for an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    /// The order to transition.
    pub order_id: OrderId,

    /// The requested target status.
    pub target: OrderStatus,

    /// When present, restricts the transition to the named lines
    /// (partial shipping). When absent, the transition applies to all
    /// currently pending lines.
    pub line_scope: Option<Vec<OrderLineId>>,

    /// Free-text identity recorded into the audit entry; not otherwise
    /// validated.
    pub actor: String,
}

impl TransitionRequest {
    /// Creates an unscoped transition request.
    pub fn new(order_id: OrderId, target: OrderStatus, actor: impl Into<String>) -> Self {
        Self {
            order_id,
            target,
            line_scope: None,
            actor: actor.into(),
        }
    }

    /// Creates a transition request scoped to the given lines.
    pub fn scoped(
        order_id: OrderId,
        target: OrderStatus,
        lines: Vec<OrderLineId>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            target,
            line_scope: Some(lines),
            actor: actor.into(),
        }
    }
}

/// The result of a committed transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionOutcome {
    /// The order that was transitioned.
    pub order_id: OrderId,

    /// The order's number.
    pub order_no: OrderNo,

    /// Status before the transition.
    pub previous_status: OrderStatus,

    /// Status after the transition (derived for partial-scope calls).
    pub new_status: OrderStatus,

    /// Inventory movements recorded by this transition, in line order.
    pub inventory_movements: Vec<InventoryMovement>,

    /// The account movement recorded by this transition, if it changed the
    /// balance.
    pub account_movement: Option<AccountMovement>,

    /// The counterparty's outstanding balance after the transition.
    pub balance_after: Money,
}
