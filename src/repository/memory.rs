//! In-memory adapters
//!
//! Single-process implementations of the repository ports. They follow the
//! same contracts as the PostgreSQL adapters (versioned updates, idempotent
//! wallet entries, pending-only settlement) and back the handler and API
//! tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{Clock, DomainError, Money, PlanId, SystemClock, TransactionId, UserId};
use crate::entities::{Entity, PlanStatus, SavingsPlan, Transaction, User, Wallet};

use super::{
    RepoResult, RepositoryError, SavingsRepository, TransactionRepository, UserRepository,
    WalletRepository,
};

// =============================================================================
// Savings plans
// =============================================================================

#[derive(Default)]
struct PlanTable {
    plans: HashMap<PlanId, SavingsPlan>,
    applied: HashSet<String>,
}

#[derive(Default)]
pub struct MemorySavingsRepository {
    inner: RwLock<PlanTable>,
}

impl MemorySavingsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SavingsRepository for MemorySavingsRepository {
    async fn create(&self, plan: &SavingsPlan) -> RepoResult<()> {
        let mut table = self.inner.write().await;
        if table.plans.contains_key(&plan.id()) {
            return Err(RepositoryError::Duplicate {
                entity: SavingsPlan::entity_type(),
                key: plan.id().to_string(),
            });
        }
        table.plans.insert(plan.id(), plan.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: PlanId) -> RepoResult<Option<SavingsPlan>> {
        Ok(self.inner.read().await.plans.get(&id).cloned())
    }

    async fn find_by_user_id(&self, user_id: UserId) -> RepoResult<Vec<SavingsPlan>> {
        let table = self.inner.read().await;
        let mut plans: Vec<SavingsPlan> = table
            .plans
            .values()
            .filter(|p| p.user_id() == user_id)
            .cloned()
            .collect();
        plans.sort_by_key(|p| p.created_at());
        Ok(plans)
    }

    async fn find_plans_for_auto_save(&self) -> RepoResult<Vec<SavingsPlan>> {
        let table = self.inner.read().await;
        Ok(table
            .plans
            .values()
            .filter(|p| p.auto_save_enabled() && p.status() == PlanStatus::Active)
            .cloned()
            .collect())
    }

    async fn update(&self, plan: &SavingsPlan) -> RepoResult<SavingsPlan> {
        let mut table = self.inner.write().await;
        let stored_version = table
            .plans
            .get(&plan.id())
            .map(|p| p.version())
            .ok_or_else(|| RepositoryError::not_found(SavingsPlan::entity_type(), plan.id()))?;

        if stored_version != plan.version() {
            return Err(RepositoryError::version_conflict(
                SavingsPlan::entity_type(),
                plan.id(),
                plan.version(),
            ));
        }

        let stored = plan.clone().with_version(stored_version + 1);
        if let Some(reference) = stored.last_transaction_reference() {
            table.applied.insert(reference.to_string());
        }
        table.plans.insert(stored.id(), stored.clone());
        Ok(stored)
    }

    async fn has_applied(&self, reference: &str) -> RepoResult<bool> {
        Ok(self.inner.read().await.applied.contains(reference))
    }
}

// =============================================================================
// Wallets
// =============================================================================

#[derive(Default)]
struct WalletTable {
    wallets: HashMap<UserId, Wallet>,
    entries: HashMap<String, UserId>,
}

pub struct MemoryWalletRepository {
    inner: RwLock<WalletTable>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryWalletRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWalletRepository {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Balance changes are stamped with `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(WalletTable::default()),
            clock,
        }
    }

    fn wallet_mut(table: &mut WalletTable, user_id: UserId) -> RepoResult<&mut Wallet> {
        table
            .wallets
            .get_mut(&user_id)
            .ok_or_else(|| RepositoryError::not_found(Wallet::entity_type(), user_id))
    }
}

#[async_trait]
impl WalletRepository for MemoryWalletRepository {
    async fn create(&self, wallet: &Wallet) -> RepoResult<()> {
        let mut table = self.inner.write().await;
        if table.wallets.contains_key(&wallet.user_id()) {
            return Err(RepositoryError::Duplicate {
                entity: Wallet::entity_type(),
                key: wallet.user_id().to_string(),
            });
        }
        table.wallets.insert(wallet.user_id(), wallet.clone());
        Ok(())
    }

    async fn find_by_user_id(&self, user_id: UserId) -> RepoResult<Option<Wallet>> {
        Ok(self.inner.read().await.wallets.get(&user_id).cloned())
    }

    async fn get_balance(&self, user_id: UserId) -> RepoResult<Money> {
        self.inner
            .read()
            .await
            .wallets
            .get(&user_id)
            .map(|w| w.balance().clone())
            .ok_or_else(|| RepositoryError::not_found(Wallet::entity_type(), user_id))
    }

    async fn has_sufficient_balance(&self, user_id: UserId, amount: &Money) -> RepoResult<bool> {
        let table = self.inner.read().await;
        let wallet = table
            .wallets
            .get(&user_id)
            .ok_or_else(|| RepositoryError::not_found(Wallet::entity_type(), user_id))?;
        Ok(wallet.has_sufficient_balance(amount)?)
    }

    async fn debit(&self, user_id: UserId, amount: &Money, reference: &str) -> RepoResult<Money> {
        let mut table = self.inner.write().await;
        if table.entries.contains_key(reference) {
            return Ok(Self::wallet_mut(&mut table, user_id)?.balance().clone());
        }

        let wallet = Self::wallet_mut(&mut table, user_id)?;
        let debited = match wallet.debit(amount, self.clock.now()) {
            Ok(w) => w,
            Err(DomainError::InsufficientFunds {
                available,
                required,
            }) => return Err(RepositoryError::InsufficientBalance { available, required }),
            Err(e) => return Err(e.into()),
        };
        let version = wallet.version();
        *wallet = debited.with_version(version + 1);
        let balance = wallet.balance().clone();

        table.entries.insert(reference.to_string(), user_id);
        Ok(balance)
    }

    async fn credit(&self, user_id: UserId, amount: &Money, reference: &str) -> RepoResult<Money> {
        let mut table = self.inner.write().await;
        if table.entries.contains_key(reference) {
            return Ok(Self::wallet_mut(&mut table, user_id)?.balance().clone());
        }

        let wallet = Self::wallet_mut(&mut table, user_id)?;
        let version = wallet.version();
        *wallet = wallet.credit(amount, self.clock.now())?.with_version(version + 1);
        let balance = wallet.balance().clone();

        table.entries.insert(reference.to_string(), user_id);
        Ok(balance)
    }

    async fn has_entry(&self, reference: &str) -> RepoResult<bool> {
        Ok(self.inner.read().await.entries.contains_key(reference))
    }
}

// =============================================================================
// Transactions
// =============================================================================

#[derive(Default)]
pub struct MemoryTransactionRepository {
    inner: RwLock<HashMap<TransactionId, Transaction>>,
}

impl MemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionRepository for MemoryTransactionRepository {
    async fn save(&self, transaction: &Transaction) -> RepoResult<()> {
        let mut rows = self.inner.write().await;
        if rows.contains_key(&transaction.id())
            || rows.values().any(|t| t.reference() == transaction.reference())
        {
            return Err(RepositoryError::Duplicate {
                entity: "Transaction",
                key: transaction.reference().to_string(),
            });
        }
        rows.insert(transaction.id(), transaction.clone());
        Ok(())
    }

    async fn update(&self, transaction: &Transaction) -> RepoResult<()> {
        let mut rows = self.inner.write().await;
        let stored = rows
            .get(&transaction.id())
            .ok_or_else(|| RepositoryError::not_found("Transaction", transaction.id()))?;

        if !stored.is_pending() {
            return Err(RepositoryError::version_conflict("Transaction", transaction.id(), 0));
        }

        rows.insert(transaction.id(), transaction.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: TransactionId) -> RepoResult<Option<Transaction>> {
        Ok(self.inner.read().await.get(&id).cloned())
    }

    async fn find_by_reference(&self, reference: &str) -> RepoResult<Option<Transaction>> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .find(|t| t.reference() == reference)
            .cloned())
    }

    async fn find_by_user_id(&self, user_id: UserId, limit: i64) -> RepoResult<Vec<Transaction>> {
        let rows = self.inner.read().await;
        let mut found: Vec<Transaction> = rows
            .values()
            .filter(|t| t.user_id() == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|t| std::cmp::Reverse(t.created_at()));
        found.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(found)
    }

    async fn find_pending_older_than(&self, cutoff: DateTime<Utc>) -> RepoResult<Vec<Transaction>> {
        let rows = self.inner.read().await;
        let mut found: Vec<Transaction> = rows
            .values()
            .filter(|t| t.is_pending() && t.created_at() < cutoff)
            .cloned()
            .collect();
        found.sort_by_key(|t| t.created_at());
        Ok(found)
    }
}

// =============================================================================
// Users
// =============================================================================

#[derive(Default)]
pub struct MemoryUserRepository {
    inner: RwLock<HashMap<UserId, User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: &User) -> RepoResult<()> {
        let mut rows = self.inner.write().await;
        if rows.contains_key(&user.id()) {
            return Err(RepositoryError::Duplicate {
                entity: User::entity_type(),
                key: user.id().to_string(),
            });
        }
        rows.insert(user.id(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        Ok(self.inner.read().await.get(&id).cloned())
    }

    async fn update(&self, user: &User) -> RepoResult<User> {
        let mut rows = self.inner.write().await;
        let stored_version = rows
            .get(&user.id())
            .map(|u| u.version())
            .ok_or_else(|| RepositoryError::not_found(User::entity_type(), user.id()))?;

        if stored_version != user.version() {
            return Err(RepositoryError::version_conflict(
                User::entity_type(),
                user.id(),
                user.version(),
            ));
        }

        let stored = user.clone().with_version(stored_version + 1);
        rows.insert(stored.id(), stored.clone());
        Ok(stored)
    }
}
