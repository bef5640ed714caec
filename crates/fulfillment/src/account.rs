//! Account balance ledger: the sole writer of the outstanding amount.

use std::sync::Arc;

use domain::{CounterpartyAccount, Money};
use ledger_store::{LedgerTxn, Result};

use crate::policy::{FloorAtZero, ShortfallPolicy};

/// Before/after snapshot of one balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    /// Outstanding amount before the delta.
    pub balance_before: Money,

    /// Outstanding amount after the delta (floored for decreases).
    pub balance_after: Money,
}

/// Applies signed balance deltas inside a fulfillment transaction.
///
/// This component is the only writer of
/// `CounterpartyAccount.outstanding`. Decreasing deltas are floored at
/// zero by the shortfall policy so a cancellation never leaves a negative
/// receivable visible; the movement record the caller appends still carries
/// the true signed amount.
#[derive(Clone)]
pub struct AccountBalance {
    policy: Arc<dyn ShortfallPolicy>,
}

impl AccountBalance {
    /// Creates an account balance ledger with the given shortfall policy.
    pub fn new(policy: Arc<dyn ShortfallPolicy>) -> Self {
        Self { policy }
    }

    /// Applies `amount` to the account's outstanding balance and stages the
    /// write.
    pub async fn apply_delta<T: LedgerTxn>(
        &self,
        txn: &mut T,
        account: &CounterpartyAccount,
        amount: Money,
    ) -> Result<BalanceChange> {
        let balance_before = account.outstanding;
        let balance_after =
            Money::from_cents(self.policy.apply(balance_before.cents(), amount.cents()));
        txn.update_outstanding(account.id, balance_before, balance_after)
            .await?;

        Ok(BalanceChange {
            balance_before,
            balance_after,
        })
    }
}

impl Default for AccountBalance {
    fn default() -> Self {
        Self::new(Arc::new(FloorAtZero))
    }
}
