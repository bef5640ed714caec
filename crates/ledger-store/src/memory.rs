use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{CounterpartyId, OrderId, ProductId, SkuOptionId};
use domain::{CounterpartyAccount, Diopter, Money, Order, SkuOption};
use tokio::sync::RwLock;

use crate::movement::{AccountMovement, InventoryMovement, WorkLogEntry};
use crate::store::{LedgerStore, LedgerTxn};
use crate::{Result, StoreError};

/// In-memory ledger store for tests and demos.
///
/// Provides the same transactional contract as the PostgreSQL
/// implementation: a transaction stages its writes and a commit applies them
/// to a scratch copy of the tables under one write lock, swapping it in only
/// when every write succeeded. Failure injection interrupts the batch
/// mid-apply, which is how the atomicity properties are exercised.
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    tables: Arc<RwLock<Tables>>,
    failure: Arc<std::sync::RwLock<FailureInjection>>,
}

#[derive(Clone, Default)]
struct Tables {
    orders: HashMap<OrderId, Order>,
    // Insertion order preserved so option matching is deterministic.
    options: Vec<SkuOption>,
    accounts: HashMap<CounterpartyId, CounterpartyAccount>,
    inventory_movements: Vec<InventoryMovement>,
    account_movements: Vec<AccountMovement>,
    work_logs: Vec<WorkLogEntry>,
}

#[derive(Debug, Clone, Copy, Default)]
struct FailureInjection {
    fail_on_commit: bool,
    fail_after_writes: Option<usize>,
}

impl InMemoryLedgerStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to reject the next commits outright.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.failure.write().unwrap().fail_on_commit = fail;
    }

    /// Configures commits to fail after `limit` staged writes have been
    /// applied, simulating a mid-batch store failure. `None` disables the
    /// injection.
    pub fn fail_after_writes(&self, limit: Option<usize>) {
        self.failure.write().unwrap().fail_after_writes = limit;
    }

    /// Returns the total number of inventory movements stored.
    pub async fn inventory_movement_count(&self) -> usize {
        self.tables.read().await.inventory_movements.len()
    }

    /// Returns the total number of account movements stored.
    pub async fn account_movement_count(&self) -> usize {
        self.tables.read().await.account_movements.len()
    }

    /// Returns the total number of work-log entries stored.
    pub async fn work_log_count(&self) -> usize {
        self.tables.read().await.work_logs.len()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    type Txn = InMemoryLedgerTxn;

    async fn begin(&self) -> Result<Self::Txn> {
        Ok(InMemoryLedgerTxn {
            tables: self.tables.clone(),
            failure: self.failure.clone(),
            staged_order: None,
            staged_stock: Vec::new(),
            staged_outstanding: Vec::new(),
            staged_inventory_movements: Vec::new(),
            staged_account_movements: Vec::new(),
            staged_work_logs: Vec::new(),
        })
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.orders.contains_key(&order.id()) {
            return Err(StoreError::Duplicate {
                entity: "order",
                id: order.id().to_string(),
            });
        }
        if tables.orders.values().any(|o| o.order_no() == order.order_no()) {
            return Err(StoreError::Duplicate {
                entity: "order_no",
                id: order.order_no().to_string(),
            });
        }
        tables.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn insert_option(&self, option: &SkuOption) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.options.iter().any(|o| o.id == option.id) {
            return Err(StoreError::Duplicate {
                entity: "sku_option",
                id: option.id.to_string(),
            });
        }
        tables.options.push(option.clone());
        Ok(())
    }

    async fn insert_account(&self, account: &CounterpartyAccount) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.accounts.contains_key(&account.id) {
            return Err(StoreError::Duplicate {
                entity: "account",
                id: account.id.to_string(),
            });
        }
        tables.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn get_option(&self, id: SkuOptionId) -> Result<Option<SkuOption>> {
        Ok(self
            .tables
            .read()
            .await
            .options
            .iter()
            .find(|o| o.id == id)
            .cloned())
    }

    async fn get_account(&self, id: CounterpartyId) -> Result<Option<CounterpartyAccount>> {
        Ok(self.tables.read().await.accounts.get(&id).cloned())
    }

    async fn delete_order(&self, id: OrderId) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.orders.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                entity: "order",
                id: id.to_string(),
            }),
        }
    }

    async fn inventory_movements_for_order(&self, id: OrderId) -> Result<Vec<InventoryMovement>> {
        Ok(self
            .tables
            .read()
            .await
            .inventory_movements
            .iter()
            .filter(|m| m.order_id == id)
            .cloned()
            .collect())
    }

    async fn account_movements_for_counterparty(
        &self,
        id: CounterpartyId,
    ) -> Result<Vec<AccountMovement>> {
        Ok(self
            .tables
            .read()
            .await
            .account_movements
            .iter()
            .filter(|m| m.counterparty_id == id)
            .cloned()
            .collect())
    }

    async fn work_logs_for_order(&self, id: OrderId) -> Result<Vec<WorkLogEntry>> {
        Ok(self
            .tables
            .read()
            .await
            .work_logs
            .iter()
            .filter(|e| e.order_id == id)
            .cloned()
            .collect())
    }
}

/// A staged in-memory transaction.
pub struct InMemoryLedgerTxn {
    tables: Arc<RwLock<Tables>>,
    failure: Arc<std::sync::RwLock<FailureInjection>>,
    staged_order: Option<Order>,
    // Insertion order preserved so failure injection interrupts the batch
    // at a reproducible point.
    staged_stock: Vec<(SkuOptionId, StockWrite)>,
    staged_outstanding: Vec<(CounterpartyId, OutstandingWrite)>,
    staged_inventory_movements: Vec<InventoryMovement>,
    staged_account_movements: Vec<AccountMovement>,
    staged_work_logs: Vec<WorkLogEntry>,
}

#[derive(Debug, Clone, Copy)]
struct StockWrite {
    /// Stock value first read inside this transaction, validated at commit.
    original: i64,
    current: i64,
}

#[derive(Debug, Clone, Copy)]
struct OutstandingWrite {
    original: Money,
    current: Money,
}

impl InMemoryLedgerTxn {
    fn staged_stock_for(&self, id: SkuOptionId) -> Option<i64> {
        self.staged_stock
            .iter()
            .find(|(sid, _)| *sid == id)
            .map(|(_, w)| w.current)
    }
}

#[async_trait]
impl LedgerTxn for InMemoryLedgerTxn {
    async fn fetch_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        if let Some(order) = &self.staged_order
            && order.id() == id
        {
            return Ok(Some(order.clone()));
        }
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn find_matching_option(
        &mut self,
        product_id: &ProductId,
        sph: Option<Diopter>,
        cyl: Option<Diopter>,
    ) -> Result<Option<SkuOption>> {
        let tables = self.tables.read().await;
        let mut option = tables
            .options
            .iter()
            .find(|o| o.matches(product_id, sph, cyl))
            .cloned();
        if let Some(opt) = &mut option
            && let Some(staged) = self.staged_stock_for(opt.id)
        {
            opt.stock = staged;
        }
        Ok(option)
    }

    async fn update_stock(&mut self, id: SkuOptionId, before: i64, after: i64) -> Result<()> {
        match self.staged_stock.iter().position(|(sid, _)| *sid == id) {
            Some(idx) => self.staged_stock[idx].1.current = after,
            None => self.staged_stock.push((
                id,
                StockWrite {
                    original: before,
                    current: after,
                },
            )),
        }
        Ok(())
    }

    async fn record_inventory_movement(&mut self, movement: InventoryMovement) -> Result<()> {
        self.staged_inventory_movements.push(movement);
        Ok(())
    }

    async fn fetch_account(&mut self, id: CounterpartyId) -> Result<Option<CounterpartyAccount>> {
        let mut account = self.tables.read().await.accounts.get(&id).cloned();
        if let Some(acct) = &mut account
            && let Some((_, write)) = self.staged_outstanding.iter().find(|(cid, _)| *cid == id)
        {
            acct.outstanding = write.current;
        }
        Ok(account)
    }

    async fn update_outstanding(
        &mut self,
        id: CounterpartyId,
        before: Money,
        after: Money,
    ) -> Result<()> {
        match self.staged_outstanding.iter().position(|(cid, _)| *cid == id) {
            Some(idx) => self.staged_outstanding[idx].1.current = after,
            None => self.staged_outstanding.push((
                id,
                OutstandingWrite {
                    original: before,
                    current: after,
                },
            )),
        }
        Ok(())
    }

    async fn record_account_movement(&mut self, movement: AccountMovement) -> Result<()> {
        self.staged_account_movements.push(movement);
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        self.staged_order = Some(order.clone());
        Ok(())
    }

    async fn append_work_log(&mut self, entry: WorkLogEntry) -> Result<()> {
        self.staged_work_logs.push(entry);
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let failure = *self.failure.read().unwrap();
        if failure.fail_on_commit {
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }

        let mut tables = self.tables.write().await;

        // Apply to a scratch copy; swap in only when every write succeeded.
        let mut next = tables.clone();
        let mut writes = 0usize;
        let count_write = |writes: &mut usize| -> Result<()> {
            *writes += 1;
            if let Some(limit) = failure.fail_after_writes
                && *writes > limit
            {
                return Err(StoreError::Unavailable(format!(
                    "injected failure after {limit} writes"
                )));
            }
            Ok(())
        };

        for (id, write) in &self.staged_stock {
            count_write(&mut writes)?;
            let option = next
                .options
                .iter_mut()
                .find(|o| o.id == *id)
                .ok_or(StoreError::NotFound {
                    entity: "sku_option",
                    id: id.to_string(),
                })?;
            if option.stock != write.original {
                return Err(StoreError::Conflict {
                    entity: "sku_option",
                    id: id.to_string(),
                });
            }
            option.stock = write.current;
        }

        for movement in self.staged_inventory_movements {
            count_write(&mut writes)?;
            next.inventory_movements.push(movement);
        }

        for (id, write) in &self.staged_outstanding {
            count_write(&mut writes)?;
            let account = next.accounts.get_mut(id).ok_or(StoreError::NotFound {
                entity: "account",
                id: id.to_string(),
            })?;
            if account.outstanding != write.original {
                return Err(StoreError::Conflict {
                    entity: "account",
                    id: id.to_string(),
                });
            }
            account.outstanding = write.current;
        }

        for movement in self.staged_account_movements {
            count_write(&mut writes)?;
            next.account_movements.push(movement);
        }

        if let Some(order) = self.staged_order {
            count_write(&mut writes)?;
            let stored = next.orders.get(&order.id()).ok_or(StoreError::NotFound {
                entity: "order",
                id: order.id().to_string(),
            })?;
            if stored.version() != order.version() - 1 {
                return Err(StoreError::Conflict {
                    entity: "order",
                    id: order.id().to_string(),
                });
            }
            next.orders.insert(order.id(), order);
        }

        for entry in self.staged_work_logs {
            count_write(&mut writes)?;
            next.work_logs.push(entry);
        }

        *tables = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{MovementId, OrderNo};
    use domain::{OrderKind, OrderLine};

    use crate::movement::StockMovementType;

    fn seed_order(counterparty: CounterpartyId) -> Order {
        Order::new(
            OrderNo::new("ORD-0001"),
            counterparty,
            OrderKind::RetailStock,
            vec![OrderLine::new("LENS-156", None, None, 1, Money::from_cents(10_000))],
            Utc::now(),
        )
    }

    fn inventory_movement(order: &Order, option: Option<SkuOptionId>) -> InventoryMovement {
        InventoryMovement {
            id: MovementId::new(),
            sku_option_id: option,
            product_id: ProductId::new("LENS-156"),
            movement_type: StockMovementType::Out,
            quantity_delta: -1,
            stock_before: 5,
            stock_after: 4,
            order_id: order.id(),
            order_no: order.order_no().clone(),
            unit_price: Money::from_cents(10_000),
            line_total: Money::from_cents(10_000),
            memo: "test".to_string(),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn commit_applies_all_staged_writes() {
        let store = InMemoryLedgerStore::new();
        let account = CounterpartyAccount::new("Test Optical", Money::zero());
        let option = SkuOption::new("LENS-156", None, None, 5);
        let mut order = seed_order(account.id);

        store.insert_account(&account).await.unwrap();
        store.insert_option(&option).await.unwrap();
        store.insert_order(&order).await.unwrap();

        let mut txn = store.begin().await.unwrap();
        txn.update_stock(option.id, 5, 4).await.unwrap();
        txn.record_inventory_movement(inventory_movement(&order, Some(option.id)))
            .await
            .unwrap();
        txn.update_outstanding(account.id, Money::zero(), Money::from_cents(10_000))
            .await
            .unwrap();
        order.mark_confirmed(Utc::now());
        order.bump_version();
        txn.update_order(&order).await.unwrap();
        txn.commit().await.unwrap();

        assert_eq!(store.get_option(option.id).await.unwrap().unwrap().stock, 4);
        assert_eq!(
            store.get_account(account.id).await.unwrap().unwrap().outstanding,
            Money::from_cents(10_000)
        );
        assert_eq!(
            store.get_order(order.id()).await.unwrap().unwrap().version(),
            1
        );
        assert_eq!(store.inventory_movement_count().await, 1);
    }

    #[tokio::test]
    async fn transaction_reads_observe_staged_stock() {
        let store = InMemoryLedgerStore::new();
        let option = SkuOption::new("LENS-156", None, None, 5);
        store.insert_option(&option).await.unwrap();

        let mut txn = store.begin().await.unwrap();
        txn.update_stock(option.id, 5, 3).await.unwrap();

        let seen = txn
            .find_matching_option(&ProductId::new("LENS-156"), None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen.stock, 3);

        // Base tables untouched until commit.
        assert_eq!(store.get_option(option.id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn stale_order_version_conflicts() {
        let store = InMemoryLedgerStore::new();
        let account = CounterpartyAccount::new("Test Optical", Money::zero());
        let order = seed_order(account.id);
        store.insert_order(&order).await.unwrap();

        // Two transactions load the same order version.
        let mut txn1 = store.begin().await.unwrap();
        let mut loaded1 = txn1.fetch_order(order.id()).await.unwrap().unwrap();
        let mut txn2 = store.begin().await.unwrap();
        let mut loaded2 = txn2.fetch_order(order.id()).await.unwrap().unwrap();

        loaded1.mark_cancelled();
        loaded1.bump_version();
        txn1.update_order(&loaded1).await.unwrap();
        txn1.commit().await.unwrap();

        loaded2.mark_confirmed(Utc::now());
        loaded2.bump_version();
        txn2.update_order(&loaded2).await.unwrap();
        let result = txn2.commit().await;
        assert!(matches!(result, Err(StoreError::Conflict { entity: "order", .. })));
    }

    #[tokio::test]
    async fn stale_stock_read_conflicts() {
        let store = InMemoryLedgerStore::new();
        let option = SkuOption::new("LENS-156", None, None, 5);
        store.insert_option(&option).await.unwrap();

        let mut txn1 = store.begin().await.unwrap();
        txn1.update_stock(option.id, 5, 4).await.unwrap();
        let mut txn2 = store.begin().await.unwrap();
        txn2.update_stock(option.id, 5, 3).await.unwrap();

        txn1.commit().await.unwrap();
        let result = txn2.commit().await;
        assert!(matches!(
            result,
            Err(StoreError::Conflict { entity: "sku_option", .. })
        ));
        // First writer's value survives.
        assert_eq!(store.get_option(option.id).await.unwrap().unwrap().stock, 4);
    }

    #[tokio::test]
    async fn mid_batch_failure_leaves_nothing_behind() {
        let store = InMemoryLedgerStore::new();
        let option = SkuOption::new("LENS-156", None, None, 5);
        let account = CounterpartyAccount::new("Test Optical", Money::zero());
        let order = seed_order(account.id);
        store.insert_option(&option).await.unwrap();
        store.insert_account(&account).await.unwrap();
        store.insert_order(&order).await.unwrap();

        store.fail_after_writes(Some(2));

        let mut txn = store.begin().await.unwrap();
        txn.update_stock(option.id, 5, 4).await.unwrap();
        txn.record_inventory_movement(inventory_movement(&order, Some(option.id)))
            .await
            .unwrap();
        txn.update_outstanding(account.id, Money::zero(), Money::from_cents(10_000))
            .await
            .unwrap();
        let result = txn.commit().await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));

        // The first two writes succeeded inside the batch, but nothing is
        // visible because the scratch copy was discarded.
        assert_eq!(store.get_option(option.id).await.unwrap().unwrap().stock, 5);
        assert_eq!(store.inventory_movement_count().await, 0);
        assert_eq!(
            store.get_account(account.id).await.unwrap().unwrap().outstanding,
            Money::zero()
        );
    }

    #[tokio::test]
    async fn duplicate_order_no_rejected() {
        let store = InMemoryLedgerStore::new();
        let account = CounterpartyAccount::new("Test Optical", Money::zero());
        let order1 = seed_order(account.id);
        let order2 = seed_order(account.id);

        store.insert_order(&order1).await.unwrap();
        let result = store.insert_order(&order2).await;
        assert!(matches!(
            result,
            Err(StoreError::Duplicate { entity: "order_no", .. })
        ));
    }

    #[tokio::test]
    async fn option_matching_prefers_insertion_order() {
        let store = InMemoryLedgerStore::new();
        let first = SkuOption::new("LENS-156", None, None, 1);
        let second = SkuOption::new("LENS-156", None, None, 9);
        store.insert_option(&first).await.unwrap();
        store.insert_option(&second).await.unwrap();

        let mut txn = store.begin().await.unwrap();
        let matched = txn
            .find_matching_option(&ProductId::new("LENS-156"), None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(matched.id, first.id);
    }

    #[tokio::test]
    async fn delete_missing_order_is_not_found() {
        let store = InMemoryLedgerStore::new();
        let result = store.delete_order(OrderId::new()).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }
}
