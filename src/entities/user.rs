//! User entity
//!
//! Only the parts of a user the money core needs: KYC level, account state
//! and the admin flag used to authorize back-office operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::{DomainError, UserId};

use super::Entity;

/// Regulatory verification level, ordered from least to most verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycTier {
    Unverified,
    Basic,
    Full,
}

impl KycTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycTier::Unverified => "unverified",
            KycTier::Basic => "basic",
            KycTier::Full => "full",
        }
    }

    /// The only tier reachable from this one
    pub fn next(&self) -> Option<KycTier> {
        match self {
            KycTier::Unverified => Some(KycTier::Basic),
            KycTier::Basic => Some(KycTier::Full),
            KycTier::Full => None,
        }
    }
}

impl fmt::Display for KycTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KycTier {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unverified" => Ok(KycTier::Unverified),
            "basic" => Ok(KycTier::Basic),
            "full" => Ok(KycTier::Full),
            other => Err(DomainError::InvalidInput(format!("unknown KYC tier '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    NotSubmitted,
    Pending,
    Verified,
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::NotSubmitted => "not_submitted",
            KycStatus::Pending => "pending",
            KycStatus::Verified => "verified",
            KycStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for KycStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KycStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_submitted" => Ok(KycStatus::NotSubmitted),
            "pending" => Ok(KycStatus::Pending),
            "verified" => Ok(KycStatus::Verified),
            "rejected" => Ok(KycStatus::Rejected),
            other => Err(DomainError::InvalidInput(format!("unknown KYC status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    kyc_tier: KycTier,
    kyc_status: KycStatus,
    is_active: bool,
    is_suspended: bool,
    suspension_reason: Option<String>,
    is_admin: bool,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl User {
    /// Active, unverified, non-admin user
    pub fn register(id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            kyc_tier: KycTier::Unverified,
            kyc_status: KycStatus::NotSubmitted,
            is_active: true,
            is_suspended: false,
            suspension_reason: None,
            is_admin: false,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_state(
        id: UserId,
        kyc_tier: KycTier,
        kyc_status: KycStatus,
        is_active: bool,
        is_suspended: bool,
        suspension_reason: Option<String>,
        is_admin: bool,
        version: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kyc_tier,
            kyc_status,
            is_active,
            is_suspended,
            suspension_reason,
            is_admin,
            version,
            created_at,
            updated_at,
        }
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    /// Builder used when seeding back-office accounts
    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    // =========================================================================
    // KYC
    // =========================================================================

    /// Change KYC tier and/or status.
    ///
    /// At the current tier only the status may change. Moving to the next
    /// tier is allowed and marks the user verified. Skipping a tier or
    /// downgrading is rejected.
    pub fn update_kyc(
        &self,
        tier: KycTier,
        status: Option<KycStatus>,
        now: DateTime<Utc>,
    ) -> Result<User, DomainError> {
        let mut user = self.clone();

        if tier == self.kyc_tier {
            let status = status.ok_or_else(|| {
                DomainError::InvalidInput("KYC status is required when the tier is unchanged".to_string())
            })?;
            user.kyc_status = status;
        } else if self.kyc_tier.next() == Some(tier) {
            user.kyc_tier = tier;
            user.kyc_status = KycStatus::Verified;
        } else {
            return Err(DomainError::InvalidKycTransition {
                current: self.kyc_tier.to_string(),
                requested: tier.to_string(),
            });
        }

        user.updated_at = now;
        Ok(user)
    }

    // =========================================================================
    // Account state
    // =========================================================================

    pub fn suspend(&self, reason: &str, now: DateTime<Utc>) -> Result<User, DomainError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::InvalidInput("suspension reason is required".to_string()));
        }
        if self.is_suspended {
            return Err(DomainError::InvalidUserState(format!(
                "user {} is already suspended",
                self.id
            )));
        }

        let mut user = self.clone();
        user.is_suspended = true;
        user.suspension_reason = Some(reason.to_string());
        user.updated_at = now;
        Ok(user)
    }

    /// Whether the user may move money at all
    pub fn can_transact(&self) -> bool {
        self.is_active && !self.is_suspended
    }

    pub fn kyc_tier(&self) -> KycTier {
        self.kyc_tier
    }

    pub fn kyc_status(&self) -> KycStatus {
        self.kyc_status
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_suspended(&self) -> bool {
        self.is_suspended
    }

    pub fn suspension_reason(&self) -> Option<&str> {
        self.suspension_reason.as_deref()
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Entity for User {
    type Id = UserId;

    fn entity_type() -> &'static str {
        "User"
    }

    fn id(&self) -> UserId {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }
}
