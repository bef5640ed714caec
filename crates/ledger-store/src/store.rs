use async_trait::async_trait;
use common::{CounterpartyId, OrderId, ProductId, SkuOptionId};
use domain::{CounterpartyAccount, Diopter, Money, Order, SkuOption};

use crate::movement::{AccountMovement, InventoryMovement, WorkLogEntry};
use crate::Result;

/// A single all-or-nothing fulfillment transaction.
///
/// Every read inside the transaction observes the writes already staged in
/// it; nothing is visible outside until [`commit`](LedgerTxn::commit)
/// succeeds. Dropping the transaction without committing discards all
/// staged writes.
///
/// Conflict rules enforced at commit:
/// - the order row's `version` must not have moved since it was fetched
/// - stock and outstanding values must still equal the before-snapshots the
///   transaction read (row locks in PostgreSQL, optimistic validation in
///   the in-memory store)
#[async_trait]
pub trait LedgerTxn: Send {
    /// Fetches an order with its lines, observing staged updates.
    async fn fetch_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Resolves a line's `(product_id, sph, cyl)` attributes to an active
    /// stock-tracked option, observing staged stock updates.
    ///
    /// Re-run on every transition; never cached across calls.
    async fn find_matching_option(
        &mut self,
        product_id: &ProductId,
        sph: Option<Diopter>,
        cyl: Option<Diopter>,
    ) -> Result<Option<SkuOption>>;

    /// Stages a stock write for one option.
    ///
    /// `before` is the value the caller read inside this transaction; the
    /// store uses it to detect lost updates at commit.
    async fn update_stock(&mut self, id: SkuOptionId, before: i64, after: i64) -> Result<()>;

    /// Stages an append of one inventory movement record.
    async fn record_inventory_movement(&mut self, movement: InventoryMovement) -> Result<()>;

    /// Fetches a counterparty account, observing staged updates.
    async fn fetch_account(&mut self, id: CounterpartyId) -> Result<Option<CounterpartyAccount>>;

    /// Stages an outstanding-balance write for one counterparty.
    async fn update_outstanding(
        &mut self,
        id: CounterpartyId,
        before: Money,
        after: Money,
    ) -> Result<()>;

    /// Stages an append of one account movement record.
    async fn record_account_movement(&mut self, movement: AccountMovement) -> Result<()>;

    /// Stages the order/line status update.
    ///
    /// The caller bumps the order version before staging; commit fails with
    /// a conflict if the stored version is not exactly one behind.
    async fn update_order(&mut self, order: &Order) -> Result<()>;

    /// Stages an append of one audit entry.
    async fn append_work_log(&mut self, entry: WorkLogEntry) -> Result<()>;

    /// Atomically applies every staged write.
    async fn commit(self) -> Result<()>
    where
        Self: Sized;
}

/// The fulfillment ledger's backing store.
///
/// [`begin`](LedgerStore::begin) opens the transactional path used by the
/// fulfillment engine; the remaining methods are the plain read/seed surface
/// used by the surrounding application layer and the tests.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// The transaction type this store produces.
    type Txn: LedgerTxn;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Txn>;

    /// Inserts a new order with its lines. Fails on a duplicate order
    /// number.
    async fn insert_order(&self, order: &Order) -> Result<()>;

    /// Inserts a new SKU option.
    async fn insert_option(&self, option: &SkuOption) -> Result<()>;

    /// Inserts a new counterparty account.
    async fn insert_account(&self, account: &CounterpartyAccount) -> Result<()>;

    /// Fetches an order with its lines.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Fetches a SKU option.
    async fn get_option(&self, id: SkuOptionId) -> Result<Option<SkuOption>>;

    /// Fetches a counterparty account.
    async fn get_account(&self, id: CounterpartyId) -> Result<Option<CounterpartyAccount>>;

    /// Physically deletes an order and its lines.
    ///
    /// The shipped-order deletion guard lives in the fulfillment engine;
    /// the store only removes rows.
    async fn delete_order(&self, id: OrderId) -> Result<()>;

    /// Returns the inventory movements recorded for an order, oldest first.
    async fn inventory_movements_for_order(&self, id: OrderId) -> Result<Vec<InventoryMovement>>;

    /// Returns the account movements recorded for a counterparty, oldest
    /// first.
    async fn account_movements_for_counterparty(
        &self,
        id: CounterpartyId,
    ) -> Result<Vec<AccountMovement>>;

    /// Returns the work-log entries recorded for an order, oldest first.
    async fn work_logs_for_order(&self, id: OrderId) -> Result<Vec<WorkLogEntry>>;
}
