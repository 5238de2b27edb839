//! Compliance service
//!
//! KYC-tier transaction ceilings and the advisory tax threshold.

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::domain::{Currency, Money, MoneyError, UserId};
use crate::entities::{KycTier, User};
use crate::error::{AppError, AppResult, RepoContext};
use crate::repository::UserRepository;

/// Ceilings per KYC tier, all in the platform currency
#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceLimits {
    basic_limit: Money,
    full_limit: Money,
    tax_threshold: Money,
}

impl ComplianceLimits {
    pub fn new(
        currency: Currency,
        basic_limit: Decimal,
        full_limit: Decimal,
        tax_threshold: Decimal,
    ) -> Result<Self, MoneyError> {
        Ok(Self::from_money(
            Money::new(basic_limit, currency.clone())?,
            Money::new(full_limit, currency.clone())?,
            Money::new(tax_threshold, currency)?,
        ))
    }

    /// Amounts already validated, all in one currency
    pub fn from_money(basic_limit: Money, full_limit: Money, tax_threshold: Money) -> Self {
        Self {
            basic_limit,
            full_limit,
            tax_threshold,
        }
    }

    /// 50 000 / 500 000 NGN ceilings, 1 000 000 NGN tax threshold
    pub fn naira_defaults() -> Self {
        Self {
            basic_limit: Money::from_major(50_000, Currency::ngn()),
            full_limit: Money::from_major(500_000, Currency::ngn()),
            tax_threshold: Money::from_major(1_000_000, Currency::ngn()),
        }
    }

    pub fn limit_for(&self, tier: KycTier) -> Money {
        match tier {
            KycTier::Unverified => Money::zero(self.basic_limit.currency().clone()),
            KycTier::Basic => self.basic_limit.clone(),
            KycTier::Full => self.full_limit.clone(),
        }
    }

    pub fn tax_threshold(&self) -> &Money {
        &self.tax_threshold
    }
}

/// Load `user_id` and fail unless the account may move money
pub async fn ensure_account_open(users: &dyn UserRepository, user_id: UserId) -> AppResult<User> {
    let user = users
        .find_by_id(user_id)
        .await
        .db_context("find_by_id", "users")?
        .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;

    if user.is_suspended() {
        return Err(AppError::authorization(format!("user {} is suspended", user_id)));
    }
    if !user.is_active() {
        return Err(AppError::authorization(format!("user {} is inactive", user_id)));
    }
    Ok(user)
}

pub struct ComplianceService {
    users: Arc<dyn UserRepository>,
    limits: ComplianceLimits,
}

impl ComplianceService {
    pub fn new(users: Arc<dyn UserRepository>, limits: ComplianceLimits) -> Self {
        Self { users, limits }
    }

    pub fn limits(&self) -> &ComplianceLimits {
        &self.limits
    }

    /// Fail unless `user_id` may move `amount` in one transaction.
    /// Returns the user that was checked.
    pub async fn check_compliance(&self, user_id: UserId, amount: &Money) -> AppResult<User> {
        let user = ensure_account_open(self.users.as_ref(), user_id).await?;

        let limit = self.limits.limit_for(user.kyc_tier());
        let exceeds = amount
            .is_greater_than(&limit)
            .map_err(|e| AppError::validation("amount", e.to_string()))?;

        if exceeds {
            tracing::warn!(
                user_id = %user_id,
                kyc_tier = %user.kyc_tier(),
                requested = %amount,
                limit = %limit,
                "Compliance limit exceeded"
            );
            return Err(AppError::ComplianceViolation {
                reason: format!(
                    "{} exceeds the {} KYC limit of {}",
                    amount,
                    user.kyc_tier(),
                    limit
                ),
                limit_amount: limit,
                requested_amount: amount.clone(),
                kyc_tier: user.kyc_tier().to_string(),
            });
        }

        Ok(user)
    }

    /// Advisory only, never blocks the movement
    pub fn tax_warning(&self, amount: &Money) -> Option<String> {
        let threshold = self.limits.tax_threshold();
        let reaches = !threshold.is_greater_than(amount).ok()?;
        reaches.then(|| {
            format!(
                "Transactions of {} or more may be reported for tax purposes",
                threshold
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::KycStatus;
    use crate::repository::memory::MemoryUserRepository;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn ngn(amount: Decimal) -> Money {
        Money::new(amount, Currency::ngn()).unwrap()
    }

    async fn service_with(user: User) -> ComplianceService {
        let users = Arc::new(MemoryUserRepository::new());
        users.create(&user).await.unwrap();
        ComplianceService::new(users, ComplianceLimits::naira_defaults())
    }

    fn user_at(tier: KycTier) -> User {
        let user = User::register(UserId::new(), Utc::now());
        match tier {
            KycTier::Unverified => user,
            KycTier::Basic => user.update_kyc(KycTier::Basic, None, Utc::now()).unwrap(),
            KycTier::Full => user
                .update_kyc(KycTier::Basic, None, Utc::now())
                .unwrap()
                .update_kyc(KycTier::Full, None, Utc::now())
                .unwrap(),
        }
    }

    #[tokio::test]
    async fn test_full_tier_boundary() {
        let user = user_at(KycTier::Full);
        let user_id = crate::entities::Entity::id(&user);
        let service = service_with(user).await;

        assert!(service.check_compliance(user_id, &ngn(dec!(500000))).await.is_ok());

        match service.check_compliance(user_id, &ngn(dec!(500001))).await {
            Err(AppError::ComplianceViolation {
                limit_amount,
                requested_amount,
                kyc_tier,
                ..
            }) => {
                assert_eq!(limit_amount, ngn(dec!(500000)));
                assert_eq!(requested_amount, ngn(dec!(500001)));
                assert_eq!(kyc_tier, "full");
            }
            other => panic!("Expected ComplianceViolation, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unverified_has_zero_ceiling() {
        let user = user_at(KycTier::Unverified);
        let user_id = crate::entities::Entity::id(&user);
        let service = service_with(user).await;

        assert!(matches!(
            service.check_compliance(user_id, &ngn(dec!(0.01))).await,
            Err(AppError::ComplianceViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_suspended_user_not_authorized() {
        let user = user_at(KycTier::Basic)
            .update_kyc(KycTier::Basic, Some(KycStatus::Verified), Utc::now())
            .unwrap()
            .suspend("fraud review", Utc::now())
            .unwrap();
        let user_id = crate::entities::Entity::id(&user);
        let service = service_with(user).await;

        assert!(matches!(
            service.check_compliance(user_id, &ngn(dec!(10))).await,
            Err(AppError::Authorization { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_user() {
        let service = service_with(user_at(KycTier::Full)).await;
        assert!(matches!(
            service.check_compliance(UserId::new(), &ngn(dec!(10))).await,
            Err(AppError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_tax_warning_threshold() {
        let service = service_with(user_at(KycTier::Full)).await;

        assert!(service.tax_warning(&ngn(dec!(999999.99))).is_none());
        assert!(service.tax_warning(&ngn(dec!(1000000))).is_some());
        assert!(service
            .tax_warning(&Money::new(dec!(5000000), Currency::new("USD").unwrap()).unwrap())
            .is_none());
    }
}
