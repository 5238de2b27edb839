//! Wallet entity
//!
//! Spendable balance a user funds plans from. Debits fail closed: a wallet
//! balance never goes below zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Currency, DomainError, Money, UserId};

use super::Entity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    user_id: UserId,
    balance: Money,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Empty wallet in the given currency
    pub fn open(user_id: UserId, currency: Currency, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            balance: Money::zero(currency),
            version: 1,
            updated_at: now,
        }
    }

    /// Rebuild from persisted state
    pub fn from_state(
        user_id: UserId,
        balance: Money,
        version: i64,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            balance,
            version,
            updated_at,
        }
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn has_sufficient_balance(&self, amount: &Money) -> Result<bool, DomainError> {
        Ok(!amount.is_greater_than(&self.balance)?)
    }

    pub fn debit(&self, amount: &Money, now: DateTime<Utc>) -> Result<Wallet, DomainError> {
        if !self.has_sufficient_balance(amount)? {
            return Err(DomainError::insufficient_funds(
                self.balance.clone(),
                amount.clone(),
            ));
        }

        let mut wallet = self.clone();
        wallet.balance = self.balance.subtract(amount)?;
        wallet.updated_at = now;
        Ok(wallet)
    }

    pub fn credit(&self, amount: &Money, now: DateTime<Utc>) -> Result<Wallet, DomainError> {
        let mut wallet = self.clone();
        wallet.balance = self.balance.add(amount)?;
        wallet.updated_at = now;
        Ok(wallet)
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn balance(&self) -> &Money {
        &self.balance
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Entity for Wallet {
    type Id = UserId;

    fn entity_type() -> &'static str {
        "Wallet"
    }

    fn id(&self) -> UserId {
        self.user_id
    }

    fn version(&self) -> i64 {
        self.version
    }
}
