//! Order and line status state machines.

use serde::{Deserialize, Serialize};

/// The status of an order in its fulfillment lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──┬──► Confirmed ──┬──► Shipped ──► Delivered
///           │                │       ▲
///           ├──► Partial ────┼───────┘
///           │                │
///           └────────────────┴──► Cancelled
/// ```
///
/// `Partial` is reached when a strict subset of lines has shipped; it is
/// always derived from the line statuses, never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order received, nothing fulfilled yet.
    #[default]
    Pending,

    /// Order confirmed; stock and balance effects applied for the whole order.
    Confirmed,

    /// Some but not all lines shipped.
    Partial,

    /// Every line shipped.
    Shipped,

    /// Order delivered to the counterparty (terminal state).
    Delivered,

    /// Order cancelled, previously applied effects reversed (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the order can be confirmed from this status.
    pub fn can_confirm(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if lines can be shipped from this status.
    ///
    /// Covers both the whole-order ship and the scoped (partial) ship.
    pub fn can_ship(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Partial
        )
    }

    /// Returns true if the order can be cancelled from this status.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending
                | OrderStatus::Confirmed
                | OrderStatus::Partial
                | OrderStatus::Shipped
        )
    }

    /// Returns true if the order can be marked delivered from this status.
    pub fn can_deliver(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this is a terminal status (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Derives the order status from the full set of line statuses.
    ///
    /// `Shipped` iff every line has shipped, otherwise `Partial`. This is
    /// recomputed from the whole line set on every transition rather than
    /// tracked incrementally, so it can never drift from the lines.
    pub fn derive(lines: impl IntoIterator<Item = LineStatus>) -> OrderStatus {
        if lines.into_iter().all(|s| s == LineStatus::Shipped) {
            OrderStatus::Shipped
        } else {
            OrderStatus::Partial
        }
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Partial => "partial",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Parses a status from its string form.
    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "partial" => Some(OrderStatus::Partial),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The status of a single order line.
///
/// One-way: a shipped line never reverts to pending. Cancellation restores
/// stock and balance through linked return movements but leaves the line's
/// historical status untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LineStatus {
    /// Line awaiting shipment.
    #[default]
    Pending,

    /// Line shipped; its ledger effects have been applied.
    Shipped,
}

impl LineStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            LineStatus::Pending => "pending",
            LineStatus::Shipped => "shipped",
        }
    }

    /// Parses a line status from its string form.
    pub fn parse(s: &str) -> Option<LineStatus> {
        match s {
            "pending" => Some(LineStatus::Pending),
            "shipped" => Some(LineStatus::Shipped),
            _ => None,
        }
    }
}

impl std::fmt::Display for LineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
