//! Transaction ledger: appends the immutable movement records.

use chrono::Utc;
use common::MovementId;
use domain::{Money, Order, OrderLine};
use ledger_store::{
    AccountMovement, AccountMovementType, InventoryMovement, LedgerTxn, Result, StockMovementType,
};

use crate::stock::StockChange;

/// Appends inventory and account movement records.
///
/// Pure append operations: inputs are the fields of the records, business
/// validation (whether the transition is legal at all) is the engine's
/// responsibility. Once recorded a movement is never mutated; if the
/// enclosing transaction aborts, no partial record becomes visible.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionLedger;

impl TransactionLedger {
    /// Records one inventory movement for a line, snapshotting its prices
    /// and the stock change.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_inventory_movement<T: LedgerTxn>(
        &self,
        txn: &mut T,
        order: &Order,
        line: &OrderLine,
        movement_type: StockMovementType,
        quantity_delta: i32,
        change: &StockChange,
        memo: impl Into<String>,
    ) -> Result<InventoryMovement> {
        let movement = InventoryMovement {
            id: MovementId::new(),
            sku_option_id: change.sku_option_id,
            product_id: line.product_id.clone(),
            movement_type,
            quantity_delta,
            stock_before: change.stock_before,
            stock_after: change.stock_after,
            order_id: order.id(),
            order_no: order.order_no().clone(),
            unit_price: line.unit_price,
            line_total: line.line_total(),
            memo: memo.into(),
            recorded_at: Utc::now(),
        };
        txn.record_inventory_movement(movement.clone()).await?;
        Ok(movement)
    }

    /// Records one account movement for an order.
    pub async fn record_account_movement<T: LedgerTxn>(
        &self,
        txn: &mut T,
        order: &Order,
        movement_type: AccountMovementType,
        amount: Money,
        balance_after: Money,
        memo: impl Into<String>,
    ) -> Result<AccountMovement> {
        let movement = AccountMovement {
            id: MovementId::new(),
            counterparty_id: order.counterparty_id(),
            movement_type,
            amount,
            balance_after,
            order_id: Some(order.id()),
            order_no: Some(order.order_no().clone()),
            memo: memo.into(),
            recorded_at: Utc::now(),
        };
        txn.record_account_movement(movement.clone()).await?;
        Ok(movement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{CounterpartyId, OrderNo};
    use domain::{OrderKind, SkuOption};
    use ledger_store::{InMemoryLedgerStore, LedgerStore};

    fn test_order() -> Order {
        Order::new(
            OrderNo::new("ORD-0001"),
            CounterpartyId::new(),
            OrderKind::RetailStock,
            vec![OrderLine::new("LENS-156", None, None, 2, Money::from_cents(5_000))],
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_inventory_movement_snapshots_line_and_change() {
        let store = InMemoryLedgerStore::new();
        let option = SkuOption::new("LENS-156", None, None, 5);
        let order = test_order();
        let line = order.lines()[0].clone();

        let ledger = TransactionLedger;
        let mut txn = store.begin().await.unwrap();
        let change = StockChange {
            sku_option_id: Some(option.id),
            stock_before: 5,
            stock_after: 3,
        };
        let movement = ledger
            .record_inventory_movement(
                &mut txn,
                &order,
                &line,
                StockMovementType::Out,
                -2,
                &change,
                "sale shipment",
            )
            .await
            .unwrap();

        assert_eq!(movement.quantity_delta, -2);
        assert_eq!(movement.stock_before, 5);
        assert_eq!(movement.stock_after, 3);
        assert_eq!(movement.line_total, Money::from_cents(10_000));
        assert_eq!(movement.order_no, OrderNo::new("ORD-0001"));
    }

    #[tokio::test]
    async fn test_account_movement_links_order() {
        let store = InMemoryLedgerStore::new();
        let order = test_order();

        let ledger = TransactionLedger;
        let mut txn = store.begin().await.unwrap();
        let movement = ledger
            .record_account_movement(
                &mut txn,
                &order,
                AccountMovementType::Sale,
                Money::from_cents(10_000),
                Money::from_cents(10_000),
                "sale shipment",
            )
            .await
            .unwrap();

        assert_eq!(movement.counterparty_id, order.counterparty_id());
        assert_eq!(movement.order_id, Some(order.id()));
        assert_eq!(movement.movement_type, AccountMovementType::Sale);
    }
}
