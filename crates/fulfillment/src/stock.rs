//! Stock ledger: the sole writer of SkuOption stock.

use std::sync::Arc;

use common::SkuOptionId;
use domain::SkuOption;
use ledger_store::{LedgerTxn, Result};

use crate::policy::{FloorAtZero, ShortfallPolicy};

/// Before/after snapshot of one stock change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    /// The option whose stock changed; None for a line that matched no
    /// stock-tracked option.
    pub sku_option_id: Option<SkuOptionId>,

    /// Stock level before the delta.
    pub stock_before: i64,

    /// Stock level after the delta.
    pub stock_after: i64,
}

impl StockChange {
    /// A no-op change for a line with no matching option.
    pub fn unmatched() -> Self {
        Self {
            sku_option_id: None,
            stock_before: 0,
            stock_after: 0,
        }
    }
}

/// Applies signed stock deltas inside a fulfillment transaction.
///
/// This component is the only writer of `SkuOption.stock`. Decreasing
/// deltas pass through the shortfall policy (floor-at-zero by default);
/// increasing deltas are applied unclamped.
#[derive(Clone)]
pub struct StockLedger {
    policy: Arc<dyn ShortfallPolicy>,
}

impl StockLedger {
    /// Creates a stock ledger with the given shortfall policy.
    pub fn new(policy: Arc<dyn ShortfallPolicy>) -> Self {
        Self { policy }
    }

    /// Applies `delta` to the resolved option's stock and stages the write.
    ///
    /// When `option` is None the call is a no-op returning a zero snapshot;
    /// the caller still records the attempted movement so sales of
    /// untracked items stay auditable.
    pub async fn apply_delta<T: LedgerTxn>(
        &self,
        txn: &mut T,
        option: Option<&SkuOption>,
        delta: i64,
    ) -> Result<StockChange> {
        let Some(option) = option else {
            return Ok(StockChange::unmatched());
        };

        let stock_before = option.stock;
        let stock_after = self.policy.apply(stock_before, delta);
        txn.update_stock(option.id, stock_before, stock_after).await?;

        Ok(StockChange {
            sku_option_id: Some(option.id),
            stock_before,
            stock_after,
        })
    }
}

impl Default for StockLedger {
    fn default() -> Self {
        Self::new(Arc::new(FloorAtZero))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_store::{InMemoryLedgerStore, LedgerStore};

    #[tokio::test]
    async fn test_sale_delta_decrements_and_stages_write() {
        let store = InMemoryLedgerStore::new();
        let option = SkuOption::new("LENS-156", None, None, 5);
        store.insert_option(&option).await.unwrap();

        let ledger = StockLedger::default();
        let mut txn = store.begin().await.unwrap();
        let change = ledger.apply_delta(&mut txn, Some(&option), -2).await.unwrap();
        txn.commit().await.unwrap();

        assert_eq!(change.stock_before, 5);
        assert_eq!(change.stock_after, 3);
        assert_eq!(store.get_option(option.id).await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_oversell_floors_at_zero() {
        let store = InMemoryLedgerStore::new();
        let option = SkuOption::new("LENS-156", None, None, 3);
        store.insert_option(&option).await.unwrap();

        let ledger = StockLedger::default();
        let mut txn = store.begin().await.unwrap();
        let change = ledger.apply_delta(&mut txn, Some(&option), -10).await.unwrap();
        txn.commit().await.unwrap();

        assert_eq!(change.stock_after, 0);
        assert_eq!(store.get_option(option.id).await.unwrap().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_restore_delta_has_no_ceiling() {
        let store = InMemoryLedgerStore::new();
        let option = SkuOption::new("LENS-156", None, None, 0);
        store.insert_option(&option).await.unwrap();

        let ledger = StockLedger::default();
        let mut txn = store.begin().await.unwrap();
        let change = ledger.apply_delta(&mut txn, Some(&option), 7).await.unwrap();
        txn.commit().await.unwrap();

        assert_eq!(change.stock_after, 7);
    }

    #[tokio::test]
    async fn test_unmatched_option_is_noop_with_zero_snapshot() {
        let store = InMemoryLedgerStore::new();
        let ledger = StockLedger::default();
        let mut txn = store.begin().await.unwrap();

        let change = ledger.apply_delta(&mut txn, None, -4).await.unwrap();
        assert_eq!(change, StockChange::unmatched());
        assert_eq!(change.stock_before, 0);
        assert_eq!(change.stock_after, 0);
    }
}
