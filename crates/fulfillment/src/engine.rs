//! The fulfillment engine: order status transitions as atomic ledger units.

use std::sync::Arc;

use chrono::Utc;
use common::{OrderId, OrderLineId};
use domain::{Money, Order, OrderLine, OrderStatus};
use ledger_store::{
    AccountMovementType, InventoryMovement, LedgerStore, LedgerTxn, StockMovementType, StoreError,
    WorkLogEntry,
};

use crate::account::AccountBalance;
use crate::error::{Result, TransitionError};
use crate::ledger::TransactionLedger;
use crate::policy::ShortfallPolicy;
use crate::stock::StockLedger;
use crate::transition::{TransitionOutcome, TransitionRequest};

/// What a legal transition request resolves to.
#[derive(Debug)]
enum Action {
    Confirm,
    Ship { scope: Option<Vec<OrderLineId>> },
    Cancel,
    Deliver,
}

/// Validates a request against the order's current status.
///
/// Re-requesting the order's current status without a scope is illegal, so
/// replaying a completed transition never re-applies its effects. A scoped
/// request on a partially shipped order is the continuation path and stays
/// legal.
fn plan(order: &Order, request: &TransitionRequest) -> Result<Action> {
    let current = order.status();
    let illegal = TransitionError::IllegalTransition {
        current,
        target: request.target,
    };

    match request.target {
        OrderStatus::Confirmed => {
            if request.line_scope.is_some() || !current.can_confirm() {
                return Err(illegal);
            }
            Ok(Action::Confirm)
        }
        OrderStatus::Shipped | OrderStatus::Partial => {
            if !current.can_ship() {
                return Err(illegal);
            }
            if request.line_scope.is_none() && request.target == current {
                return Err(illegal);
            }
            Ok(Action::Ship {
                scope: request.line_scope.clone(),
            })
        }
        OrderStatus::Cancelled => {
            if !current.can_cancel() {
                return Err(illegal);
            }
            Ok(Action::Cancel)
        }
        OrderStatus::Delivered => {
            if !current.can_deliver() {
                return Err(illegal);
            }
            Ok(Action::Deliver)
        }
        OrderStatus::Pending => Err(illegal),
    }
}

/// The order fulfillment state machine.
///
/// Each [`transition`](FulfillmentEngine::transition) call validates the
/// requested status change, computes per-line stock deltas, and drives the
/// stock ledger, transaction ledger, and account balance through a single
/// store transaction. Either every write commits or none do; the engine
/// performs no retries itself.
pub struct FulfillmentEngine<S: LedgerStore> {
    store: S,
    stock: StockLedger,
    balance: AccountBalance,
    ledger: TransactionLedger,
}

impl<S: LedgerStore> FulfillmentEngine<S> {
    /// Creates an engine with the default floor-at-zero shortfall policy.
    pub fn new(store: S) -> Self {
        Self {
            store,
            stock: StockLedger::default(),
            balance: AccountBalance::default(),
            ledger: TransactionLedger,
        }
    }

    /// Creates an engine with a custom shortfall policy for both counters.
    pub fn with_shortfall_policy(store: S, policy: Arc<dyn ShortfallPolicy>) -> Self {
        Self {
            store,
            stock: StockLedger::new(policy.clone()),
            balance: AccountBalance::new(policy),
            ledger: TransactionLedger,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Executes one status transition as an atomic unit.
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id, target = %request.target))]
    pub async fn transition(&self, request: TransitionRequest) -> Result<TransitionOutcome> {
        metrics::counter!("fulfillment_transitions_total").increment(1);
        let started = std::time::Instant::now();

        let result = self.run_transition(request).await;

        metrics::histogram!("fulfillment_transition_seconds")
            .record(started.elapsed().as_secs_f64());
        match &result {
            Ok(outcome) => {
                metrics::counter!("fulfillment_transitions_committed").increment(1);
                tracing::info!(
                    order_no = %outcome.order_no,
                    from = %outcome.previous_status,
                    to = %outcome.new_status,
                    movements = outcome.inventory_movements.len(),
                    "transition committed"
                );
            }
            Err(error) => {
                metrics::counter!("fulfillment_transitions_rejected").increment(1);
                tracing::warn!(%error, "transition rejected");
            }
        }
        result
    }

    async fn run_transition(&self, request: TransitionRequest) -> Result<TransitionOutcome> {
        let now = Utc::now();
        let mut txn = self.store.begin().await?;

        let mut order = txn
            .fetch_order(request.order_id)
            .await?
            .ok_or(TransitionError::OrderNotFound(request.order_id))?;
        let previous_status = order.status();
        let action = plan(&order, &request)?;

        let mut inventory_movements = Vec::new();
        let mut account_movement = None;

        match action {
            Action::Confirm => {
                if order.kind().affects_stock() {
                    let lines = order.lines().to_vec();
                    for line in &lines {
                        let movement = self
                            .outgoing_line(&mut txn, &order, line, "order confirmed")
                            .await?;
                        inventory_movements.push(movement);
                    }
                }

                let amount = order.total_amount();
                let memo = format!("order confirmed: {}", order.order_no());
                account_movement = Some(self.charge(&mut txn, &order, amount, memo).await?);
                order.mark_confirmed(now);
            }

            Action::Ship { scope } => {
                let included: Vec<OrderLine> = match &scope {
                    Some(ids) => order
                        .pending_lines()
                        .filter(|l| ids.contains(&l.id))
                        .cloned()
                        .collect(),
                    None => order.pending_lines().cloned().collect(),
                };
                if included.is_empty() {
                    return Err(TransitionError::EmptyScope);
                }

                // A confirmed order's stock and balance were settled at
                // confirm; shipping it only moves statuses.
                if !order.ledger_applied() {
                    if order.kind().affects_stock() {
                        for line in &included {
                            let movement = self
                                .outgoing_line(&mut txn, &order, line, "sale shipment")
                                .await?;
                            inventory_movements.push(movement);
                        }
                    }

                    let amount: Money = included.iter().map(OrderLine::line_total).sum();
                    let memo = format!("sale shipment: {}", order.order_no());
                    account_movement = Some(self.charge(&mut txn, &order, amount, memo).await?);
                }

                for line in &included {
                    order.mark_line_shipped(line.id);
                }
                order.refresh_status_from_lines(now);
            }

            Action::Cancel => {
                let restore: Vec<OrderLine> = if order.ledger_applied() {
                    order.lines().to_vec()
                } else {
                    order.shipped_lines().cloned().collect()
                };
                let applied: Money = if order.ledger_applied() {
                    order.total_amount()
                } else {
                    restore.iter().map(OrderLine::line_total).sum()
                };

                if order.kind().affects_stock() {
                    for line in &restore {
                        let movement = self
                            .restore_line(&mut txn, &order, line, "cancellation restock")
                            .await?;
                        inventory_movements.push(movement);
                    }
                }

                // A pure pending cancel has nothing to reverse.
                if order.ledger_applied() || !restore.is_empty() {
                    let account = self.fetch_account(&mut txn, &order).await?;
                    let change = self.balance.apply_delta(&mut txn, &account, -applied).await?;
                    let memo = format!("order cancelled: {}", order.order_no());
                    account_movement = Some(
                        self.ledger
                            .record_account_movement(
                                &mut txn,
                                &order,
                                AccountMovementType::Return,
                                -applied,
                                change.balance_after,
                                memo,
                            )
                            .await?,
                    );
                }
                order.mark_cancelled();
            }

            Action::Deliver => {
                order.mark_delivered(now);
            }
        }

        order.bump_version();
        txn.update_order(&order).await?;

        let balance_after = match &account_movement {
            Some(movement) => movement.balance_after,
            None => txn
                .fetch_account(order.counterparty_id())
                .await?
                .map(|a| a.outstanding)
                .unwrap_or_default(),
        };

        let details = serde_json::json!({
            "from": previous_status.as_str(),
            "to": order.status().as_str(),
            "target": request.target.as_str(),
            "scoped": request.line_scope.is_some(),
            "movement_count": inventory_movements.len(),
            "total_cents": order.total_amount().cents(),
        });
        txn.append_work_log(WorkLogEntry::new(
            "order_transition",
            order.id(),
            order.order_no().clone(),
            format!("{previous_status} -> {}: {}", order.status(), order.order_no()),
            details,
            request.actor,
        ))
        .await?;

        txn.commit().await?;

        Ok(TransitionOutcome {
            order_id: order.id(),
            order_no: order.order_no().clone(),
            previous_status,
            new_status: order.status(),
            inventory_movements,
            account_movement,
            balance_after,
        })
    }

    /// Physically deletes an order that has never shipped a line.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, order_id: OrderId) -> Result<()> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(TransitionError::OrderNotFound(order_id))?;

        if order.has_shipped_line()
            || matches!(order.status(), OrderStatus::Partial | OrderStatus::Shipped)
        {
            return Err(TransitionError::DeletionRejected(order_id));
        }

        self.store.delete_order(order_id).await?;
        tracing::info!(%order_id, order_no = %order.order_no(), "order deleted");
        Ok(())
    }

    /// Resolves a line to an option and applies the outgoing (sale) delta.
    ///
    /// The option match is re-resolved from the line's attributes on every
    /// call; catalog changes since order creation are picked up, and a line
    /// with no match still produces an auditable movement.
    async fn outgoing_line(
        &self,
        txn: &mut S::Txn,
        order: &Order,
        line: &OrderLine,
        memo_prefix: &str,
    ) -> Result<InventoryMovement> {
        let option = txn
            .find_matching_option(&line.product_id, line.sph, line.cyl)
            .await?;
        let delta = -(line.quantity as i64);
        let change = self.stock.apply_delta(txn, option.as_ref(), delta).await?;

        // Shipping a return line moves stock inward.
        let movement_type = if delta >= 0 {
            StockMovementType::In
        } else {
            StockMovementType::Out
        };
        let memo = if option.is_some() {
            format!("{memo_prefix}: {}", order.order_no())
        } else {
            format!("{memo_prefix}: {} (no option)", order.order_no())
        };

        let movement = self
            .ledger
            .record_inventory_movement(
                txn,
                order,
                line,
                movement_type,
                delta as i32,
                &change,
                memo,
            )
            .await?;
        Ok(movement)
    }

    /// Reverses a previously applied line delta on the cancellation path.
    async fn restore_line(
        &self,
        txn: &mut S::Txn,
        order: &Order,
        line: &OrderLine,
        memo_prefix: &str,
    ) -> Result<InventoryMovement> {
        let option = txn
            .find_matching_option(&line.product_id, line.sph, line.cyl)
            .await?;
        let delta = line.quantity as i64;
        let change = self.stock.apply_delta(txn, option.as_ref(), delta).await?;

        let memo = if option.is_some() {
            format!("{memo_prefix}: {}", order.order_no())
        } else {
            format!("{memo_prefix}: {} (no option)", order.order_no())
        };

        let movement = self
            .ledger
            .record_inventory_movement(
                txn,
                order,
                line,
                StockMovementType::Return,
                delta as i32,
                &change,
                memo,
            )
            .await?;
        Ok(movement)
    }

    /// Charges the signed amount to the counterparty and records the
    /// movement, typed by the amount's sign.
    async fn charge(
        &self,
        txn: &mut S::Txn,
        order: &Order,
        amount: Money,
        memo: String,
    ) -> Result<ledger_store::AccountMovement> {
        let account = self.fetch_account(txn, order).await?;
        let change = self.balance.apply_delta(txn, &account, amount).await?;
        let movement_type = if amount.is_negative() {
            AccountMovementType::Return
        } else {
            AccountMovementType::Sale
        };
        let movement = self
            .ledger
            .record_account_movement(txn, order, movement_type, amount, change.balance_after, memo)
            .await?;
        Ok(movement)
    }

    async fn fetch_account(
        &self,
        txn: &mut S::Txn,
        order: &Order,
    ) -> Result<domain::CounterpartyAccount> {
        let account = txn
            .fetch_account(order.counterparty_id())
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "account",
                id: order.counterparty_id().to_string(),
            })?;
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{CounterpartyId, OrderNo};
    use domain::OrderKind;

    fn order_in(status: OrderStatus) -> Order {
        let mut order = Order::new(
            OrderNo::new("ORD-0001"),
            CounterpartyId::new(),
            OrderKind::RetailStock,
            vec![
                OrderLine::new("LENS-156", None, None, 1, Money::from_cents(10_000)),
                OrderLine::new("LENS-160", None, None, 2, Money::from_cents(5_000)),
            ],
            Utc::now(),
        );
        match status {
            OrderStatus::Pending => {}
            OrderStatus::Confirmed => order.mark_confirmed(Utc::now()),
            OrderStatus::Partial => {
                let first = order.lines()[0].id;
                order.mark_line_shipped(first);
                order.refresh_status_from_lines(Utc::now());
            }
            OrderStatus::Shipped => {
                let ids: Vec<_> = order.lines().iter().map(|l| l.id).collect();
                for id in ids {
                    order.mark_line_shipped(id);
                }
                order.refresh_status_from_lines(Utc::now());
            }
            OrderStatus::Delivered => order.mark_delivered(Utc::now()),
            OrderStatus::Cancelled => order.mark_cancelled(),
        }
        order
    }

    fn request(order: &Order, target: OrderStatus) -> TransitionRequest {
        TransitionRequest::new(order.id(), target, "tester")
    }

    #[test]
    fn test_plan_confirm_from_pending() {
        let order = order_in(OrderStatus::Pending);
        assert!(matches!(
            plan(&order, &request(&order, OrderStatus::Confirmed)),
            Ok(Action::Confirm)
        ));
    }

    #[test]
    fn test_plan_confirm_rejects_scope() {
        let order = order_in(OrderStatus::Pending);
        let req = TransitionRequest::scoped(
            order.id(),
            OrderStatus::Confirmed,
            vec![order.lines()[0].id],
            "tester",
        );
        assert!(matches!(
            plan(&order, &req),
            Err(TransitionError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn test_plan_ship_from_pending_confirmed_partial() {
        for status in [OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Partial] {
            let order = order_in(status);
            assert!(matches!(
                plan(&order, &request(&order, OrderStatus::Shipped)),
                Ok(Action::Ship { .. })
            ));
        }
    }

    #[test]
    fn test_plan_rejects_same_target_replay() {
        let order = order_in(OrderStatus::Shipped);
        assert!(matches!(
            plan(&order, &request(&order, OrderStatus::Shipped)),
            Err(TransitionError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn test_plan_scoped_partial_continuation_is_legal() {
        let order = order_in(OrderStatus::Partial);
        let remaining = order.lines()[1].id;
        let req = TransitionRequest::scoped(order.id(), OrderStatus::Partial, vec![remaining], "tester");
        assert!(matches!(plan(&order, &req), Ok(Action::Ship { .. })));
    }

    #[test]
    fn test_plan_rejects_transitions_from_terminal_states() {
        for status in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            let order = order_in(status);
            for target in [
                OrderStatus::Confirmed,
                OrderStatus::Shipped,
                OrderStatus::Cancelled,
                OrderStatus::Delivered,
            ] {
                assert!(
                    matches!(
                        plan(&order, &request(&order, target)),
                        Err(TransitionError::IllegalTransition { .. })
                    ),
                    "expected {status} -> {target} to be illegal"
                );
            }
        }
    }

    #[test]
    fn test_plan_deliver_from_any_non_terminal() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Partial,
            OrderStatus::Shipped,
        ] {
            let order = order_in(status);
            assert!(matches!(
                plan(&order, &request(&order, OrderStatus::Delivered)),
                Ok(Action::Deliver)
            ));
        }
    }

    #[test]
    fn test_plan_pending_is_never_a_target() {
        let order = order_in(OrderStatus::Confirmed);
        assert!(matches!(
            plan(&order, &request(&order, OrderStatus::Pending)),
            Err(TransitionError::IllegalTransition { .. })
        ));
    }
}
