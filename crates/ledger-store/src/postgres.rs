use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CounterpartyId, MovementId, OrderId, OrderLineId, OrderNo, ProductId, SkuOptionId};
use domain::{
    CounterpartyAccount, Diopter, LineStatus, Money, Order, OrderKind, OrderLine, OrderStatus,
    SkuOption,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::movement::{
    AccountMovement, AccountMovementType, InventoryMovement, StockMovementType, WorkLogEntry,
};
use crate::store::{LedgerStore, LedgerTxn};
use crate::{Result, StoreError};

/// PostgreSQL-backed ledger store.
///
/// Rows a transaction will write are locked with `SELECT … FOR UPDATE` as
/// they are read, so concurrent fulfillment of two orders touching the same
/// SkuOption serializes at the stock row. The order row additionally carries
/// a version column guarded on update.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Creates a new PostgreSQL ledger store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

fn corrupt(what: &str, value: &str) -> StoreError {
    StoreError::Serialization(serde_json::Error::io(std::io::Error::other(format!(
        "unknown {what}: {value}"
    ))))
}

fn row_to_option(row: &PgRow) -> Result<SkuOption> {
    Ok(SkuOption {
        id: SkuOptionId::from_uuid(row.try_get::<Uuid, _>("id")?),
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        sph: row.try_get::<Option<i32>, _>("sph")?.map(Diopter::from_hundredths),
        cyl: row.try_get::<Option<i32>, _>("cyl")?.map(Diopter::from_hundredths),
        stock: row.try_get("stock")?,
        active: row.try_get("active")?,
    })
}

fn row_to_account(row: &PgRow) -> Result<CounterpartyAccount> {
    Ok(CounterpartyAccount {
        id: CounterpartyId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        outstanding: Money::from_cents(row.try_get("outstanding_cents")?),
        credit_limit: Money::from_cents(row.try_get("credit_limit_cents")?),
    })
}

fn row_to_line(row: &PgRow) -> Result<OrderLine> {
    let status_str: String = row.try_get("status")?;
    let status = LineStatus::parse(&status_str).ok_or_else(|| corrupt("line status", &status_str))?;
    Ok(OrderLine {
        id: OrderLineId::from_uuid(row.try_get::<Uuid, _>("id")?),
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        sph: row.try_get::<Option<i32>, _>("sph")?.map(Diopter::from_hundredths),
        cyl: row.try_get::<Option<i32>, _>("cyl")?.map(Diopter::from_hundredths),
        quantity: row.try_get("quantity")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        status,
        position: row.try_get("position")?,
    })
}

fn row_to_order(row: &PgRow, lines: Vec<OrderLine>) -> Result<Order> {
    let kind_str: String = row.try_get("kind")?;
    let kind = OrderKind::parse(&kind_str).ok_or_else(|| corrupt("order kind", &kind_str))?;
    let status_str: String = row.try_get("status")?;
    let status =
        OrderStatus::parse(&status_str).ok_or_else(|| corrupt("order status", &status_str))?;

    Ok(Order::from_parts(
        OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        OrderNo::new(row.try_get::<String, _>("order_no")?),
        CounterpartyId::from_uuid(row.try_get::<Uuid, _>("counterparty_id")?),
        kind,
        status,
        lines,
        row.try_get::<DateTime<Utc>, _>("ordered_at")?,
        row.try_get::<Option<DateTime<Utc>>, _>("confirmed_at")?,
        row.try_get::<Option<DateTime<Utc>>, _>("shipped_at")?,
        row.try_get::<Option<DateTime<Utc>>, _>("delivered_at")?,
        row.try_get("version")?,
    ))
}

fn row_to_inventory_movement(row: &PgRow) -> Result<InventoryMovement> {
    let type_str: String = row.try_get("movement_type")?;
    let movement_type = StockMovementType::parse(&type_str)
        .ok_or_else(|| corrupt("inventory movement type", &type_str))?;
    Ok(InventoryMovement {
        id: MovementId::from_uuid(row.try_get::<Uuid, _>("id")?),
        sku_option_id: row
            .try_get::<Option<Uuid>, _>("sku_option_id")?
            .map(SkuOptionId::from_uuid),
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        movement_type,
        quantity_delta: row.try_get("quantity_delta")?,
        stock_before: row.try_get("stock_before")?,
        stock_after: row.try_get("stock_after")?,
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        order_no: OrderNo::new(row.try_get::<String, _>("order_no")?),
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        line_total: Money::from_cents(row.try_get("line_total_cents")?),
        memo: row.try_get("memo")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

fn row_to_account_movement(row: &PgRow) -> Result<AccountMovement> {
    let type_str: String = row.try_get("movement_type")?;
    let movement_type = AccountMovementType::parse(&type_str)
        .ok_or_else(|| corrupt("account movement type", &type_str))?;
    Ok(AccountMovement {
        id: MovementId::from_uuid(row.try_get::<Uuid, _>("id")?),
        counterparty_id: CounterpartyId::from_uuid(row.try_get::<Uuid, _>("counterparty_id")?),
        movement_type,
        amount: Money::from_cents(row.try_get("amount_cents")?),
        balance_after: Money::from_cents(row.try_get("balance_after_cents")?),
        order_id: row.try_get::<Option<Uuid>, _>("order_id")?.map(OrderId::from_uuid),
        order_no: row.try_get::<Option<String>, _>("order_no")?.map(OrderNo::new),
        memo: row.try_get("memo")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

fn row_to_work_log(row: &PgRow) -> Result<WorkLogEntry> {
    Ok(WorkLogEntry {
        id: row.try_get("id")?,
        work_type: row.try_get("work_type")?,
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        order_no: OrderNo::new(row.try_get::<String, _>("order_no")?),
        description: row.try_get("description")?,
        details: row.try_get("details")?,
        actor: row.try_get("actor")?,
        logged_at: row.try_get("logged_at")?,
    })
}

async fn fetch_lines(
    tx: &mut Transaction<'static, Postgres>,
    order_id: OrderId,
) -> Result<Vec<OrderLine>> {
    let rows = sqlx::query(
        r#"
        SELECT id, product_id, sph, cyl, quantity, unit_price_cents, status, position
        FROM order_lines
        WHERE order_id = $1
        ORDER BY position ASC
        "#,
    )
    .bind(order_id.as_uuid())
    .fetch_all(&mut **tx)
    .await?;

    rows.iter().map(row_to_line).collect()
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    type Txn = PostgresLedgerTxn;

    async fn begin(&self) -> Result<Self::Txn> {
        Ok(PostgresLedgerTxn {
            tx: self.pool.begin().await?,
        })
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_no, counterparty_id, kind, status, ordered_at,
                                confirmed_at, shipped_at, delivered_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.order_no().as_str())
        .bind(order.counterparty_id().as_uuid())
        .bind(order.kind().as_str())
        .bind(order.status().as_str())
        .bind(order.ordered_at())
        .bind(order.confirmed_at())
        .bind(order.shipped_at())
        .bind(order.delivered_at())
        .bind(order.version())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_order_no")
            {
                return StoreError::Duplicate {
                    entity: "order_no",
                    id: order.order_no().to_string(),
                };
            }
            StoreError::Database(e)
        })?;

        for line in order.lines() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (id, order_id, product_id, sph, cyl, quantity,
                                         unit_price_cents, status, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(line.id.as_uuid())
            .bind(order.id().as_uuid())
            .bind(line.product_id.as_str())
            .bind(line.sph.map(|d| d.as_hundredths()))
            .bind(line.cyl.map(|d| d.as_hundredths()))
            .bind(line.quantity)
            .bind(line.unit_price.cents())
            .bind(line.status.as_str())
            .bind(line.position)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_option(&self, option: &SkuOption) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sku_options (id, product_id, sph, cyl, stock, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(option.id.as_uuid())
        .bind(option.product_id.as_str())
        .bind(option.sph.map(|d| d.as_hundredths()))
        .bind(option.cyl.map(|d| d.as_hundredths()))
        .bind(option.stock)
        .bind(option.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_account(&self, account: &CounterpartyAccount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO counterparty_accounts (id, name, outstanding_cents, credit_limit_cents)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(&account.name)
        .bind(account.outstanding.cents())
        .bind(account.credit_limit.cents())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            r#"
            SELECT id, order_no, counterparty_id, kind, status, ordered_at,
                   confirmed_at, shipped_at, delivered_at, version
            FROM orders WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let lines = fetch_lines(&mut tx, id).await?;
        tx.commit().await?;
        Ok(Some(row_to_order(&row, lines)?))
    }

    async fn get_option(&self, id: SkuOptionId) -> Result<Option<SkuOption>> {
        let row = sqlx::query(
            "SELECT id, product_id, sph, cyl, stock, active FROM sku_options WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_option).transpose()
    }

    async fn get_account(&self, id: CounterpartyId) -> Result<Option<CounterpartyAccount>> {
        let row = sqlx::query(
            "SELECT id, name, outstanding_cents, credit_limit_cents FROM counterparty_accounts WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    async fn delete_order(&self, id: OrderId) -> Result<()> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "order",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn inventory_movements_for_order(&self, id: OrderId) -> Result<Vec<InventoryMovement>> {
        let rows = sqlx::query(
            r#"
            SELECT id, sku_option_id, product_id, movement_type, quantity_delta,
                   stock_before, stock_after, order_id, order_no, unit_price_cents,
                   line_total_cents, memo, recorded_at
            FROM inventory_movements
            WHERE order_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_inventory_movement).collect()
    }

    async fn account_movements_for_counterparty(
        &self,
        id: CounterpartyId,
    ) -> Result<Vec<AccountMovement>> {
        let rows = sqlx::query(
            r#"
            SELECT id, counterparty_id, movement_type, amount_cents, balance_after_cents,
                   order_id, order_no, memo, recorded_at
            FROM account_movements
            WHERE counterparty_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_account_movement).collect()
    }

    async fn work_logs_for_order(&self, id: OrderId) -> Result<Vec<WorkLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, work_type, order_id, order_no, description, details, actor, logged_at
            FROM work_logs
            WHERE order_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_work_log).collect()
    }
}

/// A PostgreSQL ledger transaction.
///
/// Reads lock the rows they return; all writes happen inside the wrapped
/// database transaction and become visible only at commit.
pub struct PostgresLedgerTxn {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTxn for PostgresLedgerTxn {
    async fn fetch_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, order_no, counterparty_id, kind, status, ordered_at,
                   confirmed_at, shipped_at, delivered_at, version
            FROM orders WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let lines = fetch_lines(&mut self.tx, id).await?;
        Ok(Some(row_to_order(&row, lines)?))
    }

    async fn find_matching_option(
        &mut self,
        product_id: &ProductId,
        sph: Option<Diopter>,
        cyl: Option<Diopter>,
    ) -> Result<Option<SkuOption>> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, sph, cyl, stock, active
            FROM sku_options
            WHERE product_id = $1
              AND sph IS NOT DISTINCT FROM $2
              AND cyl IS NOT DISTINCT FROM $3
              AND active
            ORDER BY id ASC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(product_id.as_str())
        .bind(sph.map(|d| d.as_hundredths()))
        .bind(cyl.map(|d| d.as_hundredths()))
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(row_to_option).transpose()
    }

    async fn update_stock(&mut self, id: SkuOptionId, before: i64, after: i64) -> Result<()> {
        let result = sqlx::query("UPDATE sku_options SET stock = $2 WHERE id = $1 AND stock = $3")
            .bind(id.as_uuid())
            .bind(after)
            .bind(before)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict {
                entity: "sku_option",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn record_inventory_movement(&mut self, movement: InventoryMovement) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_movements (id, sku_option_id, product_id, movement_type,
                quantity_delta, stock_before, stock_after, order_id, order_no,
                unit_price_cents, line_total_cents, memo, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.sku_option_id.map(|id| id.as_uuid()))
        .bind(movement.product_id.as_str())
        .bind(movement.movement_type.as_str())
        .bind(movement.quantity_delta)
        .bind(movement.stock_before)
        .bind(movement.stock_after)
        .bind(movement.order_id.as_uuid())
        .bind(movement.order_no.as_str())
        .bind(movement.unit_price.cents())
        .bind(movement.line_total.cents())
        .bind(&movement.memo)
        .bind(movement.recorded_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn fetch_account(&mut self, id: CounterpartyId) -> Result<Option<CounterpartyAccount>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, outstanding_cents, credit_limit_cents
            FROM counterparty_accounts WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    async fn update_outstanding(
        &mut self,
        id: CounterpartyId,
        before: Money,
        after: Money,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE counterparty_accounts SET outstanding_cents = $2 WHERE id = $1 AND outstanding_cents = $3",
        )
        .bind(id.as_uuid())
        .bind(after.cents())
        .bind(before.cents())
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict {
                entity: "account",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn record_account_movement(&mut self, movement: AccountMovement) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO account_movements (id, counterparty_id, movement_type, amount_cents,
                balance_after_cents, order_id, order_no, memo, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.counterparty_id.as_uuid())
        .bind(movement.movement_type.as_str())
        .bind(movement.amount.cents())
        .bind(movement.balance_after.cents())
        .bind(movement.order_id.map(|id| id.as_uuid()))
        .bind(movement.order_no.as_ref().map(|no| no.as_str().to_string()))
        .bind(&movement.memo)
        .bind(movement.recorded_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, confirmed_at = $3, shipped_at = $4, delivered_at = $5, version = $6
            WHERE id = $1 AND version = $7
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.status().as_str())
        .bind(order.confirmed_at())
        .bind(order.shipped_at())
        .bind(order.delivered_at())
        .bind(order.version())
        .bind(order.version() - 1)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict {
                entity: "order",
                id: order.id().to_string(),
            });
        }

        for line in order.lines() {
            sqlx::query("UPDATE order_lines SET status = $2 WHERE id = $1")
                .bind(line.id.as_uuid())
                .bind(line.status.as_str())
                .execute(&mut *self.tx)
                .await?;
        }
        Ok(())
    }

    async fn append_work_log(&mut self, entry: WorkLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO work_logs (id, work_type, order_id, order_no, description,
                                   details, actor, logged_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.work_type)
        .bind(entry.order_id.as_uuid())
        .bind(entry.order_no.as_str())
        .bind(&entry.description)
        .bind(&entry.details)
        .bind(&entry.actor)
        .bind(entry.logged_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
