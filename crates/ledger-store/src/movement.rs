//! Append-only ledger records.
//!
//! Movements are created once inside a fulfillment transaction and never
//! updated or deleted afterwards; reversals append new records instead.

use chrono::{DateTime, Utc};
use common::{CounterpartyId, MovementId, OrderId, OrderNo, ProductId, SkuOptionId};
use domain::Money;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The direction/reason of a stock change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockMovementType {
    /// Stock left the warehouse (sale shipment).
    Out,

    /// Stock entered the warehouse (shipment of a return line, restock).
    In,

    /// Stock restored by a cancellation reversal.
    Return,
}

impl StockMovementType {
    /// Returns the movement type as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StockMovementType::Out => "out",
            StockMovementType::In => "in",
            StockMovementType::Return => "return",
        }
    }

    /// Parses a movement type from its string form.
    pub fn parse(s: &str) -> Option<StockMovementType> {
        match s {
            "out" => Some(StockMovementType::Out),
            "in" => Some(StockMovementType::In),
            "return" => Some(StockMovementType::Return),
            _ => None,
        }
    }
}

impl std::fmt::Display for StockMovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable record of one stock change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryMovement {
    /// Unique record identifier.
    pub id: MovementId,

    /// The option whose stock changed; None when the line matched no
    /// stock-tracked option (the attempt is still recorded for audit).
    pub sku_option_id: Option<SkuOptionId>,

    /// The product the originating line referenced.
    pub product_id: ProductId,

    /// Kind of movement.
    pub movement_type: StockMovementType,

    /// Signed quantity change requested (may exceed what the stock floor
    /// actually absorbed).
    pub quantity_delta: i32,

    /// Stock level before the change.
    pub stock_before: i64,

    /// Stock level after the change.
    pub stock_after: i64,

    /// The order this movement originated from.
    pub order_id: OrderId,

    /// Order number snapshot for audit listings.
    pub order_no: OrderNo,

    /// Unit price snapshot from the originating line.
    pub unit_price: Money,

    /// Line total snapshot from the originating line.
    pub line_total: Money,

    /// Free-text memo.
    pub memo: String,

    /// When the movement was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// The kind of a counterparty balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountMovementType {
    /// A sale increased what the counterparty owes.
    Sale,

    /// A return or cancellation reversal decreased it.
    Return,

    /// A payment received against the balance.
    Deposit,

    /// A manual correction.
    Adjustment,
}

impl AccountMovementType {
    /// Returns the movement type as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountMovementType::Sale => "sale",
            AccountMovementType::Return => "return",
            AccountMovementType::Deposit => "deposit",
            AccountMovementType::Adjustment => "adjustment",
        }
    }

    /// Parses a movement type from its string form.
    pub fn parse(s: &str) -> Option<AccountMovementType> {
        match s {
            "sale" => Some(AccountMovementType::Sale),
            "return" => Some(AccountMovementType::Return),
            "deposit" => Some(AccountMovementType::Deposit),
            "adjustment" => Some(AccountMovementType::Adjustment),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountMovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable record of one change to a counterparty's balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountMovement {
    /// Unique record identifier.
    pub id: MovementId,

    /// The counterparty whose balance changed.
    pub counterparty_id: CounterpartyId,

    /// Kind of movement.
    pub movement_type: AccountMovementType,

    /// True signed movement amount. Recorded in full even when the balance
    /// floor absorbed part of a decrease.
    pub amount: Money,

    /// Balance snapshot after the change. Never recomputed later.
    pub balance_after: Money,

    /// The order this movement originated from, when there is one.
    pub order_id: Option<OrderId>,

    /// Order number snapshot, when there is one.
    pub order_no: Option<OrderNo>,

    /// Free-text memo.
    pub memo: String,

    /// When the movement was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// One audit entry written per fulfillment transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkLogEntry {
    /// Unique entry identifier.
    pub id: Uuid,

    /// Work classification (e.g. `"order_transition"`).
    pub work_type: String,

    /// The order the work targeted.
    pub order_id: OrderId,

    /// Order number snapshot.
    pub order_no: OrderNo,

    /// Human-readable description of what happened.
    pub description: String,

    /// Structured details blob.
    pub details: serde_json::Value,

    /// Free-text identity of whoever requested the work. Recorded, not
    /// validated.
    pub actor: String,

    /// When the entry was logged.
    pub logged_at: DateTime<Utc>,
}

impl WorkLogEntry {
    /// Creates a new entry logged now.
    pub fn new(
        work_type: impl Into<String>,
        order_id: OrderId,
        order_no: OrderNo,
        description: impl Into<String>,
        details: serde_json::Value,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            work_type: work_type.into(),
            order_id,
            order_no,
            description: description.into(),
            details,
            actor: actor.into(),
            logged_at: Utc::now(),
        }
    }
}
