//! Order and order line entities.

use chrono::{DateTime, Utc};
use common::{CounterpartyId, OrderId, OrderLineId, OrderNo, ProductId};
use serde::{Deserialize, Serialize};

use crate::lens::Diopter;
use crate::money::Money;
use crate::status::{LineStatus, OrderStatus};

/// The kind of an order, which gates whether fulfillment touches stock.
///
/// Prescription (custom-ground) orders are produced to order and never
/// touch SkuOption stock; retail-stock orders draw from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    /// Stocked retail goods; fulfillment decrements SkuOption stock.
    RetailStock,

    /// Custom prescription work; no stock movement on any transition.
    Prescription,
}

impl OrderKind {
    /// Returns true if fulfilling this kind of order mutates stock.
    pub fn affects_stock(&self) -> bool {
        matches!(self, OrderKind::RetailStock)
    }

    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::RetailStock => "retail-stock",
            OrderKind::Prescription => "prescription",
        }
    }

    /// Parses a kind from its string form.
    pub fn parse(s: &str) -> Option<OrderKind> {
        match s {
            "retail-stock" => Some(OrderKind::RetailStock),
            "prescription" => Some(OrderKind::Prescription),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One requested SKU option and quantity within an order.
///
/// The line records the product and lens powers it was ordered with; the
/// matching SkuOption is re-resolved from those attributes at transition
/// time, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Unique line identifier.
    pub id: OrderLineId,

    /// The product (SKU) ordered.
    pub product_id: ProductId,

    /// Sphere power, if the product is power-tracked.
    pub sph: Option<Diopter>,

    /// Cylinder power, if the product is power-tracked.
    pub cyl: Option<Diopter>,

    /// Signed quantity. Negative marks a return line. Never zero.
    pub quantity: i32,

    /// Price per unit at order time.
    pub unit_price: Money,

    /// Fulfillment status of this line.
    pub status: LineStatus,

    /// Stored sequence within the order; lines are always processed in
    /// this order so movement rows replay deterministically.
    pub position: i32,
}

impl OrderLine {
    /// Creates a new pending line. The position is assigned when the line
    /// is attached to an order.
    pub fn new(
        product_id: impl Into<ProductId>,
        sph: Option<Diopter>,
        cyl: Option<Diopter>,
        quantity: i32,
        unit_price: Money,
    ) -> Self {
        Self {
            id: OrderLineId::new(),
            product_id: product_id.into(),
            sph,
            cyl,
            quantity,
            unit_price,
            status: LineStatus::Pending,
            position: 0,
        }
    }

    /// Returns the line total, always recomputed as quantity × unit price.
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    /// Returns true if this is a return line (negative quantity).
    pub fn is_return(&self) -> bool {
        self.quantity < 0
    }
}

/// One customer purchase request.
///
/// Mutated only through the fulfillment engine; the status is kept
/// consistent with the aggregate state of the lines on every transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    order_no: OrderNo,
    counterparty_id: CounterpartyId,
    kind: OrderKind,
    status: OrderStatus,
    lines: Vec<OrderLine>,
    ordered_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    version: i64,
}

impl Order {
    /// Creates a new pending order, assigning line positions in the order
    /// the lines were given.
    pub fn new(
        order_no: OrderNo,
        counterparty_id: CounterpartyId,
        kind: OrderKind,
        mut lines: Vec<OrderLine>,
        ordered_at: DateTime<Utc>,
    ) -> Self {
        for (idx, line) in lines.iter_mut().enumerate() {
            line.position = idx as i32;
        }
        Self {
            id: OrderId::new(),
            order_no,
            counterparty_id,
            kind,
            status: OrderStatus::Pending,
            lines,
            ordered_at,
            confirmed_at: None,
            shipped_at: None,
            delivered_at: None,
            version: 0,
        }
    }

    /// Reconstructs an order from stored state. Lines are re-sorted by
    /// their stored position.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: OrderId,
        order_no: OrderNo,
        counterparty_id: CounterpartyId,
        kind: OrderKind,
        status: OrderStatus,
        mut lines: Vec<OrderLine>,
        ordered_at: DateTime<Utc>,
        confirmed_at: Option<DateTime<Utc>>,
        shipped_at: Option<DateTime<Utc>>,
        delivered_at: Option<DateTime<Utc>>,
        version: i64,
    ) -> Self {
        lines.sort_by_key(|l| l.position);
        Self {
            id,
            order_no,
            counterparty_id,
            kind,
            status,
            lines,
            ordered_at,
            confirmed_at,
            shipped_at,
            delivered_at,
            version,
        }
    }
}

// Query methods
impl Order {
    /// Returns the order ID.
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Returns the externally visible order number.
    pub fn order_no(&self) -> &OrderNo {
        &self.order_no
    }

    /// Returns the counterparty this order bills to.
    pub fn counterparty_id(&self) -> CounterpartyId {
        self.counterparty_id
    }

    /// Returns the order kind.
    pub fn kind(&self) -> OrderKind {
        self.kind
    }

    /// Returns the current status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns the lines in stored position order.
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Returns a line by ID.
    pub fn line(&self, id: OrderLineId) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.id == id)
    }

    /// Returns the lines still awaiting shipment, in position order.
    pub fn pending_lines(&self) -> impl Iterator<Item = &OrderLine> {
        self.lines.iter().filter(|l| l.status == LineStatus::Pending)
    }

    /// Returns the lines already shipped, in position order.
    pub fn shipped_lines(&self) -> impl Iterator<Item = &OrderLine> {
        self.lines.iter().filter(|l| l.status == LineStatus::Shipped)
    }

    /// Returns true if any line has shipped.
    ///
    /// An order in this state can no longer be physically deleted.
    pub fn has_shipped_line(&self) -> bool {
        self.lines.iter().any(|l| l.status == LineStatus::Shipped)
    }

    /// Returns the order total, recomputed as the signed sum of line totals.
    ///
    /// Negative for net-return orders.
    pub fn total_amount(&self) -> Money {
        self.lines.iter().map(OrderLine::line_total).sum()
    }

    /// Returns true if whole-order ledger effects were applied at confirm.
    ///
    /// A confirmed order's stock and balance are settled; later ships only
    /// move statuses.
    pub fn ledger_applied(&self) -> bool {
        self.confirmed_at.is_some()
    }

    /// Returns true if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns when the order was placed.
    pub fn ordered_at(&self) -> DateTime<Utc> {
        self.ordered_at
    }

    /// Returns when the order was confirmed, if it was.
    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }

    /// Returns when the order finished shipping, if it did.
    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    /// Returns when the order was delivered, if it was.
    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    /// Returns the optimistic-concurrency version of the order row.
    pub fn version(&self) -> i64 {
        self.version
    }
}

// Mutations, driven by the fulfillment engine
impl Order {
    /// Marks the order confirmed at the given time.
    pub fn mark_confirmed(&mut self, at: DateTime<Utc>) {
        self.status = OrderStatus::Confirmed;
        self.confirmed_at = Some(at);
    }

    /// Marks a line shipped. Returns false if the line is unknown.
    pub fn mark_line_shipped(&mut self, id: OrderLineId) -> bool {
        match self.lines.iter_mut().find(|l| l.id == id) {
            Some(line) => {
                line.status = LineStatus::Shipped;
                true
            }
            None => false,
        }
    }

    /// Recomputes the status from the full line set after shipping.
    ///
    /// Sets `shipped_at` the first time every line has shipped.
    pub fn refresh_status_from_lines(&mut self, at: DateTime<Utc>) {
        self.status = OrderStatus::derive(self.lines.iter().map(|l| l.status));
        if self.status == OrderStatus::Shipped && self.shipped_at.is_none() {
            self.shipped_at = Some(at);
        }
    }

    /// Marks the order delivered at the given time.
    pub fn mark_delivered(&mut self, at: DateTime<Utc>) {
        self.status = OrderStatus::Delivered;
        self.delivered_at = Some(at);
    }

    /// Marks the order cancelled.
    pub fn mark_cancelled(&mut self) {
        self.status = OrderStatus::Cancelled;
    }

    /// Advances the optimistic-concurrency version.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_with_two_lines() -> Order {
        Order::new(
            OrderNo::new("ORD-0001"),
            CounterpartyId::new(),
            OrderKind::RetailStock,
            vec![
                OrderLine::new("LENS-156", Some(Diopter::from_hundredths(-200)), None, 1, Money::from_cents(10_000)),
                OrderLine::new("LENS-160", Some(Diopter::from_hundredths(-425)), None, 2, Money::from_cents(5_000)),
            ],
            Utc::now(),
        )
    }

    #[test]
    fn test_new_order_is_pending_with_positions_assigned() {
        let order = order_with_two_lines();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.lines()[0].position, 0);
        assert_eq!(order.lines()[1].position, 1);
        assert!(order.pending_lines().count() == 2);
        assert!(!order.has_shipped_line());
        assert_eq!(order.version(), 0);
    }

    #[test]
    fn test_total_amount_is_signed_sum_of_line_totals() {
        let order = order_with_two_lines();
        assert_eq!(order.total_amount(), Money::from_cents(20_000));
    }

    #[test]
    fn test_net_return_order_has_negative_total() {
        let order = Order::new(
            OrderNo::new("ORD-0002"),
            CounterpartyId::new(),
            OrderKind::RetailStock,
            vec![OrderLine::new("LENS-156", None, None, -1, Money::from_cents(10_000))],
            Utc::now(),
        );
        assert_eq!(order.total_amount(), Money::from_cents(-10_000));
        assert!(order.lines()[0].is_return());
    }

    #[test]
    fn test_line_total_is_recomputed() {
        let line = OrderLine::new("LENS-156", None, None, 3, Money::from_cents(2_500));
        assert_eq!(line.line_total(), Money::from_cents(7_500));
    }

    #[test]
    fn test_mark_line_shipped_and_refresh_status() {
        let mut order = order_with_two_lines();
        let first = order.lines()[0].id;
        let second = order.lines()[1].id;
        let now = Utc::now();

        assert!(order.mark_line_shipped(first));
        order.refresh_status_from_lines(now);
        assert_eq!(order.status(), OrderStatus::Partial);
        assert!(order.shipped_at().is_none());

        assert!(order.mark_line_shipped(second));
        order.refresh_status_from_lines(now);
        assert_eq!(order.status(), OrderStatus::Shipped);
        assert_eq!(order.shipped_at(), Some(now));
    }

    #[test]
    fn test_mark_unknown_line_returns_false() {
        let mut order = order_with_two_lines();
        assert!(!order.mark_line_shipped(OrderLineId::new()));
    }

    #[test]
    fn test_mark_confirmed_records_ledger_application() {
        let mut order = order_with_two_lines();
        assert!(!order.ledger_applied());
        order.mark_confirmed(Utc::now());
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert!(order.ledger_applied());
    }

    #[test]
    fn test_from_parts_sorts_lines_by_position() {
        let mut a = OrderLine::new("SKU-A", None, None, 1, Money::from_cents(100));
        a.position = 1;
        let mut b = OrderLine::new("SKU-B", None, None, 1, Money::from_cents(100));
        b.position = 0;

        let order = Order::from_parts(
            OrderId::new(),
            OrderNo::new("ORD-0003"),
            CounterpartyId::new(),
            OrderKind::RetailStock,
            OrderStatus::Pending,
            vec![a, b],
            Utc::now(),
            None,
            None,
            None,
            0,
        );
        assert_eq!(order.lines()[0].product_id.as_str(), "SKU-B");
        assert_eq!(order.lines()[1].product_id.as_str(), "SKU-A");
    }

    #[test]
    fn test_order_kind_affects_stock() {
        assert!(OrderKind::RetailStock.affects_stock());
        assert!(!OrderKind::Prescription.affects_stock());
    }

    #[test]
    fn test_order_kind_string_roundtrip() {
        assert_eq!(OrderKind::parse("retail-stock"), Some(OrderKind::RetailStock));
        assert_eq!(OrderKind::parse("prescription"), Some(OrderKind::Prescription));
        assert_eq!(OrderKind::parse("other"), None);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let order = order_with_two_lines();
        let json = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.id(), order.id());
        assert_eq!(deserialized.lines().len(), 2);
        assert_eq!(deserialized.total_amount(), order.total_amount());
    }
}
