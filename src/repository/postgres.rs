//! PostgreSQL adapters
//!
//! sqlx implementations of the repository ports. Schema lives in
//! `migrations/0001_init.sql`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres};
use uuid::Uuid;

use crate::domain::{Currency, Money, PlanId, TransactionId, UserId};
use crate::entities::{
    AutoSaveTime, Entity, PlanState, SavingsPlan, Transaction, User, Wallet,
};

use super::{
    RepoResult, RepositoryError, SavingsRepository, TransactionRepository, UserRepository,
    WalletRepository,
};

fn money(amount: Decimal, currency: &str) -> RepoResult<Money> {
    Ok(Money::new(amount, Currency::new(currency)?)?)
}

fn count(value: i32, column: &str) -> RepoResult<u32> {
    u32::try_from(value).map_err(|_| RepositoryError::Corrupt(format!("negative {}", column)))
}

fn duplicate_or(err: sqlx::Error, entity: &'static str, key: String) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Duplicate { entity, key }
        }
        _ => RepositoryError::Database(err),
    }
}

// =============================================================================
// Savings plans
// =============================================================================

#[derive(Debug, FromRow)]
struct PlanRow {
    id: Uuid,
    user_id: Uuid,
    plan_name: String,
    currency: String,
    daily_amount: Decimal,
    target_amount: Option<Decimal>,
    current_amount: Decimal,
    status: String,
    contribution_streak: i32,
    total_contributions: i32,
    auto_save_enabled: bool,
    auto_save_time: Option<NaiveTime>,
    last_contribution_date: Option<NaiveDate>,
    last_transaction_reference: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PlanRow> for SavingsPlan {
    type Error = RepositoryError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        let target_amount = row
            .target_amount
            .map(|t| money(t, &row.currency))
            .transpose()?;

        let plan = SavingsPlan::from_state(PlanState {
            id: PlanId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            plan_name: row.plan_name,
            daily_amount: money(row.daily_amount, &row.currency)?,
            target_amount,
            current_amount: money(row.current_amount, &row.currency)?,
            status: row.status.parse()?,
            contribution_streak: count(row.contribution_streak, "contribution_streak")?,
            total_contributions: count(row.total_contributions, "total_contributions")?,
            auto_save_enabled: row.auto_save_enabled,
            auto_save_time: row.auto_save_time.map(AutoSaveTime::new),
            last_contribution_date: row.last_contribution_date,
            last_transaction_reference: row.last_transaction_reference,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })?;
        Ok(plan)
    }
}

const PLAN_COLUMNS: &str = r#"
    id, user_id, plan_name, currency, daily_amount, target_amount, current_amount,
    status, contribution_streak, total_contributions, auto_save_enabled,
    auto_save_time, last_contribution_date, last_transaction_reference,
    version, created_at, updated_at
"#;

#[derive(Debug, Clone)]
pub struct PgSavingsRepository {
    pool: PgPool,
}

impl PgSavingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_plans(
        &self,
        query: sqlx::query::QueryAs<'_, Postgres, PlanRow, sqlx::postgres::PgArguments>,
    ) -> RepoResult<Vec<SavingsPlan>> {
        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(SavingsPlan::try_from)
            .collect()
    }
}

#[async_trait]
impl SavingsRepository for PgSavingsRepository {
    async fn create(&self, plan: &SavingsPlan) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO savings_plans (
                id, user_id, plan_name, currency, daily_amount, target_amount,
                current_amount, status, contribution_streak, total_contributions,
                auto_save_enabled, auto_save_time, last_contribution_date,
                last_transaction_reference, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(plan.id().as_uuid())
        .bind(plan.user_id().as_uuid())
        .bind(plan.plan_name())
        .bind(plan.daily_amount().currency().code())
        .bind(plan.daily_amount().amount())
        .bind(plan.target_amount().map(|t| t.amount()))
        .bind(plan.current_amount().amount())
        .bind(plan.status().as_str())
        .bind(plan.contribution_streak() as i32)
        .bind(plan.total_contributions() as i32)
        .bind(plan.auto_save_enabled())
        .bind(plan.auto_save_time().map(|t| t.time()))
        .bind(plan.last_contribution_date())
        .bind(plan.last_transaction_reference())
        .bind(plan.version())
        .bind(plan.created_at())
        .bind(plan.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_or(e, SavingsPlan::entity_type(), plan.id().to_string()))?;

        Ok(())
    }

    async fn find_by_id(&self, id: PlanId) -> RepoResult<Option<SavingsPlan>> {
        let sql = format!("SELECT {} FROM savings_plans WHERE id = $1", PLAN_COLUMNS);
        let row: Option<PlanRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(SavingsPlan::try_from).transpose()
    }

    async fn find_by_user_id(&self, user_id: UserId) -> RepoResult<Vec<SavingsPlan>> {
        let sql = format!(
            "SELECT {} FROM savings_plans WHERE user_id = $1 ORDER BY created_at",
            PLAN_COLUMNS
        );
        self.fetch_plans(sqlx::query_as(&sql).bind(user_id.as_uuid()))
            .await
    }

    async fn find_plans_for_auto_save(&self) -> RepoResult<Vec<SavingsPlan>> {
        let sql = format!(
            "SELECT {} FROM savings_plans WHERE auto_save_enabled AND status = 'active'",
            PLAN_COLUMNS
        );
        self.fetch_plans(sqlx::query_as(&sql)).await
    }

    async fn update(&self, plan: &SavingsPlan) -> RepoResult<SavingsPlan> {
        let mut tx = self.pool.begin().await?;

        let new_version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE savings_plans
            SET current_amount = $3,
                status = $4,
                contribution_streak = $5,
                total_contributions = $6,
                auto_save_enabled = $7,
                auto_save_time = $8,
                last_contribution_date = $9,
                last_transaction_reference = $10,
                updated_at = $11,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(plan.id().as_uuid())
        .bind(plan.version())
        .bind(plan.current_amount().amount())
        .bind(plan.status().as_str())
        .bind(plan.contribution_streak() as i32)
        .bind(plan.total_contributions() as i32)
        .bind(plan.auto_save_enabled())
        .bind(plan.auto_save_time().map(|t| t.time()))
        .bind(plan.last_contribution_date())
        .bind(plan.last_transaction_reference())
        .bind(plan.updated_at())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(new_version) = new_version else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM savings_plans WHERE id = $1)")
                    .bind(plan.id().as_uuid())
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(if exists {
                RepositoryError::version_conflict(
                    SavingsPlan::entity_type(),
                    plan.id(),
                    plan.version(),
                )
            } else {
                RepositoryError::not_found(SavingsPlan::entity_type(), plan.id())
            });
        };

        if let Some(reference) = plan.last_transaction_reference() {
            sqlx::query(
                r#"
                INSERT INTO plan_entries (reference, plan_id)
                VALUES ($1, $2)
                ON CONFLICT (reference) DO NOTHING
                "#,
            )
            .bind(reference)
            .bind(plan.id().as_uuid())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(plan.clone().with_version(new_version))
    }

    async fn has_applied(&self, reference: &str) -> RepoResult<bool> {
        let applied: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM plan_entries WHERE reference = $1)")
                .bind(reference)
                .fetch_one(&self.pool)
                .await?;
        Ok(applied)
    }
}

// =============================================================================
// Wallets
// =============================================================================

#[derive(Debug, FromRow)]
struct WalletRow {
    user_id: Uuid,
    balance: Decimal,
    currency: String,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WalletRow> for Wallet {
    type Error = RepositoryError;

    fn try_from(row: WalletRow) -> Result<Self, Self::Error> {
        Ok(Wallet::from_state(
            UserId::from_uuid(row.user_id),
            money(row.balance, &row.currency)?,
            row.version,
            row.updated_at,
        ))
    }
}

#[derive(Debug, Clone)]
pub struct PgWalletRepository {
    pool: PgPool,
}

impl PgWalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply one wallet movement inside a single SQL transaction.
    ///
    /// The entry row is inserted first; if the reference is already present
    /// the movement was applied before and the balance is returned as is.
    async fn apply_entry(
        &self,
        user_id: UserId,
        amount: &Money,
        reference: &str,
        direction: &str,
    ) -> RepoResult<Money> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO wallet_entries (reference, user_id, direction, amount, currency)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (reference) DO NOTHING
            "#,
        )
        .bind(reference)
        .bind(user_id.as_uuid())
        .bind(direction)
        .bind(amount.amount())
        .bind(amount.currency().code())
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                RepositoryError::not_found(Wallet::entity_type(), user_id)
            }
            _ => RepositoryError::Database(e),
        })?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return self.get_balance(user_id).await;
        }

        // Single conditional statement: a debit never takes the balance below zero
        let signed = if direction == "debit" {
            -amount.amount()
        } else {
            amount.amount()
        };
        let updated: Option<(Decimal, String)> = sqlx::query_as(
            r#"
            UPDATE wallets
            SET balance = balance + $2,
                version = version + 1,
                updated_at = NOW()
            WHERE user_id = $1 AND currency = $3 AND balance + $2 >= 0
            RETURNING balance, currency
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(signed)
        .bind(amount.currency().code())
        .fetch_optional(&mut *tx)
        .await?;

        match updated {
            Some((balance, currency)) => {
                tx.commit().await?;
                money(balance, &currency)
            }
            None => {
                tx.rollback().await?;
                let available = self.get_balance(user_id).await?;
                if available.currency() != amount.currency() {
                    return Err(crate::domain::MoneyError::CurrencyMismatch {
                        left: available.currency().clone(),
                        right: amount.currency().clone(),
                    }
                    .into());
                }
                Err(RepositoryError::InsufficientBalance {
                    available,
                    required: amount.clone(),
                })
            }
        }
    }
}

#[async_trait]
impl WalletRepository for PgWalletRepository {
    async fn create(&self, wallet: &Wallet) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallets (user_id, balance, currency, version, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(wallet.user_id().as_uuid())
        .bind(wallet.balance().amount())
        .bind(wallet.balance().currency().code())
        .bind(wallet.version())
        .bind(wallet.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_or(e, Wallet::entity_type(), wallet.user_id().to_string()))?;

        Ok(())
    }

    async fn find_by_user_id(&self, user_id: UserId) -> RepoResult<Option<Wallet>> {
        let row: Option<WalletRow> = sqlx::query_as(
            "SELECT user_id, balance, currency, version, updated_at FROM wallets WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Wallet::try_from).transpose()
    }

    async fn get_balance(&self, user_id: UserId) -> RepoResult<Money> {
        self.find_by_user_id(user_id)
            .await?
            .map(|w| w.balance().clone())
            .ok_or_else(|| RepositoryError::not_found(Wallet::entity_type(), user_id))
    }

    async fn has_sufficient_balance(&self, user_id: UserId, amount: &Money) -> RepoResult<bool> {
        let balance = self.get_balance(user_id).await?;
        Ok(!amount.is_greater_than(&balance)?)
    }

    async fn debit(&self, user_id: UserId, amount: &Money, reference: &str) -> RepoResult<Money> {
        self.apply_entry(user_id, amount, reference, "debit").await
    }

    async fn credit(&self, user_id: UserId, amount: &Money, reference: &str) -> RepoResult<Money> {
        self.apply_entry(user_id, amount, reference, "credit").await
    }

    async fn has_entry(&self, reference: &str) -> RepoResult<bool> {
        let found: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM wallet_entries WHERE reference = $1)")
                .bind(reference)
                .fetch_one(&self.pool)
                .await?;
        Ok(found)
    }
}

// =============================================================================
// Transactions
// =============================================================================

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: Uuid,
    plan_id: Option<Uuid>,
    amount: Decimal,
    currency: String,
    transaction_type: String,
    source: String,
    reference: String,
    status: String,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = RepositoryError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction::from_state(
            TransactionId::from_uuid(row.id),
            UserId::from_uuid(row.user_id),
            row.plan_id.map(PlanId::from_uuid),
            money(row.amount, &row.currency)?,
            row.transaction_type.parse()?,
            row.source.parse()?,
            row.reference,
            row.status.parse()?,
            row.failure_reason,
            row.created_at,
            row.updated_at,
        ))
    }
}

const TRANSACTION_COLUMNS: &str = r#"
    id, user_id, plan_id, amount, currency, transaction_type, source,
    reference, status, failure_reason, created_at, updated_at
"#;

#[derive(Debug, Clone)]
pub struct PgTransactionRepository {
    pool: PgPool,
}

impl PgTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for PgTransactionRepository {
    async fn save(&self, transaction: &Transaction) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, user_id, plan_id, amount, currency, transaction_type, source,
                reference, status, failure_reason, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(transaction.id().as_uuid())
        .bind(transaction.user_id().as_uuid())
        .bind(transaction.plan_id().map(|p| p.as_uuid()))
        .bind(transaction.amount().amount())
        .bind(transaction.amount().currency().code())
        .bind(transaction.transaction_type().as_str())
        .bind(transaction.source().as_str())
        .bind(transaction.reference())
        .bind(transaction.status().as_str())
        .bind(transaction.failure_reason())
        .bind(transaction.created_at())
        .bind(transaction.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_or(e, "Transaction", transaction.reference().to_string()))?;

        Ok(())
    }

    async fn update(&self, transaction: &Transaction) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $2, failure_reason = $3, updated_at = $4
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(transaction.id().as_uuid())
        .bind(transaction.status().as_str())
        .bind(transaction.failure_reason())
        .bind(transaction.updated_at())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(match self.find_by_id(transaction.id()).await? {
                Some(_) => RepositoryError::version_conflict("Transaction", transaction.id(), 0),
                None => RepositoryError::not_found("Transaction", transaction.id()),
            });
        }
        Ok(())
    }

    async fn find_by_id(&self, id: TransactionId) -> RepoResult<Option<Transaction>> {
        let sql = format!("SELECT {} FROM transactions WHERE id = $1", TRANSACTION_COLUMNS);
        let row: Option<TransactionRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Transaction::try_from).transpose()
    }

    async fn find_by_reference(&self, reference: &str) -> RepoResult<Option<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE reference = $1",
            TRANSACTION_COLUMNS
        );
        let row: Option<TransactionRow> = sqlx::query_as(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Transaction::try_from).transpose()
    }

    async fn find_by_user_id(&self, user_id: UserId, limit: i64) -> RepoResult<Vec<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
            TRANSACTION_COLUMNS
        );
        let rows: Vec<TransactionRow> = sqlx::query_as(&sql)
            .bind(user_id.as_uuid())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn find_pending_older_than(&self, cutoff: DateTime<Utc>) -> RepoResult<Vec<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE status = 'pending' AND created_at < $1 ORDER BY created_at",
            TRANSACTION_COLUMNS
        );
        let rows: Vec<TransactionRow> = sqlx::query_as(&sql)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Transaction::try_from).collect()
    }
}

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    kyc_tier: String,
    kyc_status: String,
    is_active: bool,
    is_suspended: bool,
    suspension_reason: Option<String>,
    is_admin: bool,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User::from_state(
            UserId::from_uuid(row.id),
            row.kyc_tier.parse()?,
            row.kyc_status.parse()?,
            row.is_active,
            row.is_suspended,
            row.suspension_reason,
            row.is_admin,
            row.version,
            row.created_at,
            row.updated_at,
        ))
    }
}

#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: &User) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, kyc_tier, kyc_status, is_active, is_suspended,
                suspension_reason, is_admin, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.id().as_uuid())
        .bind(user.kyc_tier().as_str())
        .bind(user.kyc_status().as_str())
        .bind(user.is_active())
        .bind(user.is_suspended())
        .bind(user.suspension_reason())
        .bind(user.is_admin())
        .bind(user.version())
        .bind(user.created_at())
        .bind(user.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_or(e, User::entity_type(), user.id().to_string()))?;

        Ok(())
    }

    async fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, kyc_tier, kyc_status, is_active, is_suspended,
                   suspension_reason, is_admin, version, created_at, updated_at
            FROM users WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn update(&self, user: &User) -> RepoResult<User> {
        let new_version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET kyc_tier = $3,
                kyc_status = $4,
                is_active = $5,
                is_suspended = $6,
                suspension_reason = $7,
                updated_at = $8,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(user.id().as_uuid())
        .bind(user.version())
        .bind(user.kyc_tier().as_str())
        .bind(user.kyc_status().as_str())
        .bind(user.is_active())
        .bind(user.is_suspended())
        .bind(user.suspension_reason())
        .bind(user.updated_at())
        .fetch_optional(&self.pool)
        .await?;

        match new_version {
            Some(version) => Ok(user.clone().with_version(version)),
            None => Err(match self.find_by_id(user.id()).await? {
                Some(_) => {
                    RepositoryError::version_conflict(User::entity_type(), user.id(), user.version())
                }
                None => RepositoryError::not_found(User::entity_type(), user.id()),
            }),
        }
    }
}
