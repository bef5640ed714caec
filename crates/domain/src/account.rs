//! Counterparty account with its running balance.

use common::CounterpartyId;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// A customer/store account carrying the running outstanding balance.
///
/// `outstanding` is mutated only by the account balance ledger, in lockstep
/// with an AccountMovement record, and always equals the floored fold of the
/// movements for this counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartyAccount {
    /// Unique account identifier.
    pub id: CounterpartyId,

    /// Display name of the customer or store.
    pub name: String,

    /// Current outstanding amount the counterparty owes.
    pub outstanding: Money,

    /// Credit limit. Read-only input to policy decisions made by
    /// collaborators; the core does not enforce it.
    pub credit_limit: Money,
}

impl CounterpartyAccount {
    /// Creates a new account with a zero balance.
    pub fn new(name: impl Into<String>, credit_limit: Money) -> Self {
        Self {
            id: CounterpartyId::new(),
            name: name.into(),
            outstanding: Money::zero(),
            credit_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_starts_at_zero() {
        let account = CounterpartyAccount::new("Gangnam Optical", Money::from_cents(500_000));
        assert_eq!(account.outstanding, Money::zero());
        assert_eq!(account.credit_limit, Money::from_cents(500_000));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let account = CounterpartyAccount::new("Mapo Optical", Money::zero());
        let json = serde_json::to_string(&account).unwrap();
        let deserialized: CounterpartyAccount = serde_json::from_str(&json).unwrap();
        assert_eq!(account, deserialized);
    }
}
