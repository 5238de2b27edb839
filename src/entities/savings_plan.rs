//! Savings Plan entity
//!
//! A savings plan collects a fixed daily amount from its owner until an
//! optional target is reached. State changes never mutate in place: every
//! transition returns a new plan that the repository then persists.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::{DomainError, Money, PlanId, UserId};

use super::Entity;

/// Plan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Active => "active",
            PlanStatus::Paused => "paused",
            PlanStatus::Completed => "completed",
            PlanStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled plans accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanStatus::Completed | PlanStatus::Cancelled)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PlanStatus::Active),
            "paused" => Ok(PlanStatus::Paused),
            "completed" => Ok(PlanStatus::Completed),
            "cancelled" => Ok(PlanStatus::Cancelled),
            other => Err(DomainError::InvalidInput(format!("unknown plan status '{}'", other))),
        }
    }
}

/// Time of day for the scheduled contribution, written as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AutoSaveTime(NaiveTime);

impl AutoSaveTime {
    pub fn new(time: NaiveTime) -> Self {
        Self(time)
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl FromStr for AutoSaveTime {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 5 {
            return Err(DomainError::InvalidInput(format!(
                "auto-save time must be HH:MM, got '{}'",
                s
            )));
        }
        NaiveTime::parse_from_str(s, "%H:%M")
            .map(Self)
            .map_err(|_| DomainError::InvalidInput(format!("auto-save time must be HH:MM, got '{}'", s)))
    }
}

impl TryFrom<String> for AutoSaveTime {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AutoSaveTime> for String {
    fn from(time: AutoSaveTime) -> Self {
        time.to_string()
    }
}

impl fmt::Display for AutoSaveTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

/// Input for opening a plan
#[derive(Debug, Clone)]
pub struct NewSavingsPlan {
    pub user_id: UserId,
    pub plan_name: String,
    pub daily_amount: Money,
    pub target_amount: Option<Money>,
    pub auto_save_time: Option<AutoSaveTime>,
}

/// Raw persisted state, used by storage adapters to rebuild a plan
#[derive(Debug, Clone)]
pub struct PlanState {
    pub id: PlanId,
    pub user_id: UserId,
    pub plan_name: String,
    pub daily_amount: Money,
    pub target_amount: Option<Money>,
    pub current_amount: Money,
    pub status: PlanStatus,
    pub contribution_streak: u32,
    pub total_contributions: u32,
    pub auto_save_enabled: bool,
    pub auto_save_time: Option<AutoSaveTime>,
    pub last_contribution_date: Option<NaiveDate>,
    pub last_transaction_reference: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Savings Plan entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsPlan {
    id: PlanId,
    user_id: UserId,
    plan_name: String,
    daily_amount: Money,
    target_amount: Option<Money>,
    current_amount: Money,
    status: PlanStatus,
    contribution_streak: u32,
    total_contributions: u32,
    auto_save_enabled: bool,
    auto_save_time: Option<AutoSaveTime>,
    last_contribution_date: Option<NaiveDate>,
    last_transaction_reference: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SavingsPlan {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Open a new active plan with nothing saved yet
    pub fn create(input: NewSavingsPlan, now: DateTime<Utc>) -> Result<Self, DomainError> {
        let plan_name = input.plan_name.trim().to_string();
        if plan_name.is_empty() {
            return Err(DomainError::InvalidInput("plan name is required".to_string()));
        }

        if input.daily_amount.is_zero() {
            return Err(DomainError::InvalidInput(
                "daily amount must be greater than zero".to_string(),
            ));
        }

        if let Some(target) = &input.target_amount {
            if input.daily_amount.is_greater_than(target)? {
                return Err(DomainError::InvalidInput(
                    "target amount must be at least the daily amount".to_string(),
                ));
            }
        }

        let currency = input.daily_amount.currency().clone();

        Ok(Self {
            id: PlanId::new(),
            user_id: input.user_id,
            plan_name,
            daily_amount: input.daily_amount,
            target_amount: input.target_amount,
            current_amount: Money::zero(currency),
            status: PlanStatus::Active,
            contribution_streak: 0,
            total_contributions: 0,
            auto_save_enabled: input.auto_save_time.is_some(),
            auto_save_time: input.auto_save_time,
            last_contribution_date: None,
            last_transaction_reference: None,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild a plan from storage, re-checking the invariants a row could
    /// have lost.
    pub fn from_state(state: PlanState) -> Result<Self, DomainError> {
        // Same-currency check for every amount
        state.daily_amount.equals(&state.current_amount)?;
        if let Some(target) = &state.target_amount {
            target.equals(&state.daily_amount)?;
            if state.current_amount.is_greater_than(target)? {
                return Err(DomainError::InvalidInput(format!(
                    "plan {} holds more than its target",
                    state.id
                )));
            }
        }

        Ok(Self {
            id: state.id,
            user_id: state.user_id,
            plan_name: state.plan_name,
            daily_amount: state.daily_amount,
            target_amount: state.target_amount,
            current_amount: state.current_amount,
            status: state.status,
            contribution_streak: state.contribution_streak,
            total_contributions: state.total_contributions,
            auto_save_enabled: state.auto_save_enabled,
            auto_save_time: state.auto_save_time,
            last_contribution_date: state.last_contribution_date,
            last_transaction_reference: state.last_transaction_reference,
            version: state.version,
            created_at: state.created_at,
            updated_at: state.updated_at,
        })
    }

    /// Copy stamped with the version the store assigned on write
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    // =========================================================================
    // State machine
    // =========================================================================

    pub fn pause(&self, now: DateTime<Utc>) -> Result<SavingsPlan, DomainError> {
        match self.status {
            PlanStatus::Active => Ok(self.transition(PlanStatus::Paused, now)),
            PlanStatus::Paused => Err(DomainError::invalid_plan_state(
                self.status.as_str(),
                PlanStatus::Paused.as_str(),
                "plan is already paused",
            )),
            _ => Err(self.terminal_error(PlanStatus::Paused)),
        }
    }

    pub fn resume(&self, now: DateTime<Utc>) -> Result<SavingsPlan, DomainError> {
        match self.status {
            PlanStatus::Paused => Ok(self.transition(PlanStatus::Active, now)),
            PlanStatus::Active => Err(DomainError::invalid_plan_state(
                self.status.as_str(),
                PlanStatus::Active.as_str(),
                "plan is not paused",
            )),
            _ => Err(self.terminal_error(PlanStatus::Active)),
        }
    }

    pub fn cancel(&self, now: DateTime<Utc>) -> Result<SavingsPlan, DomainError> {
        match self.status {
            PlanStatus::Active | PlanStatus::Paused => {
                let mut plan = self.transition(PlanStatus::Cancelled, now);
                plan.auto_save_enabled = false;
                Ok(plan)
            }
            _ => Err(self.terminal_error(PlanStatus::Cancelled)),
        }
    }

    /// Apply one daily contribution.
    ///
    /// Streak policy: a contribution on the day after the previous one
    /// extends the streak, a second contribution on the same day leaves it
    /// unchanged, anything else restarts it at 1. Reaching the target
    /// completes the plan.
    pub fn make_contribution(
        &self,
        amount: &Money,
        reference: &str,
        at: DateTime<Utc>,
    ) -> Result<SavingsPlan, DomainError> {
        if self.status != PlanStatus::Active {
            let reason = if self.status.is_terminal() {
                format!("plan is {}", self.status)
            } else {
                "contributions require an active plan".to_string()
            };
            return Err(DomainError::invalid_plan_state(
                self.status.as_str(),
                PlanStatus::Active.as_str(),
                reason,
            ));
        }

        if !amount.equals(&self.daily_amount)? {
            return Err(DomainError::InvalidContribution {
                reason: "amount must equal the plan's daily amount".to_string(),
                expected: Some(self.daily_amount.clone()),
                actual: Some(amount.clone()),
            });
        }

        let new_amount = self.current_amount.add(amount)?;
        let mut reached_target = false;
        if let Some(target) = &self.target_amount {
            if new_amount.is_greater_than(target)? {
                return Err(DomainError::InvalidContribution {
                    reason: "contribution would exceed the target amount".to_string(),
                    expected: Some(target.subtract(&self.current_amount)?),
                    actual: Some(amount.clone()),
                });
            }
            reached_target = new_amount.equals(target)?;
        }

        let today = at.date_naive();
        let streak = match self.last_contribution_date {
            Some(previous) if previous == today => self.contribution_streak.max(1),
            Some(previous) if previous + Duration::days(1) == today => {
                self.contribution_streak.saturating_add(1)
            }
            _ => 1,
        };

        let mut plan = self.clone();
        plan.current_amount = new_amount;
        plan.contribution_streak = streak;
        plan.total_contributions = self.total_contributions.saturating_add(1);
        plan.last_contribution_date = Some(today);
        plan.last_transaction_reference = Some(reference.to_string());
        plan.updated_at = at;
        if reached_target {
            plan.status = PlanStatus::Completed;
            plan.auto_save_enabled = false;
        }
        Ok(plan)
    }

    /// Turn the scheduled contribution on or off.
    pub fn update_auto_save(
        &self,
        enabled: bool,
        time: Option<AutoSaveTime>,
        now: DateTime<Utc>,
    ) -> Result<SavingsPlan, DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::invalid_plan_state(
                self.status.as_str(),
                self.status.as_str(),
                format!("cannot change auto-save on a {} plan", self.status),
            ));
        }

        let time = time.or(self.auto_save_time);
        if enabled && time.is_none() {
            return Err(DomainError::InvalidInput(
                "auto-save time is required when enabling auto-save".to_string(),
            ));
        }

        let mut plan = self.clone();
        plan.auto_save_enabled = enabled;
        plan.auto_save_time = time;
        plan.updated_at = now;
        Ok(plan)
    }

    /// Take money out of a finished (completed or cancelled) plan.
    pub fn withdraw(
        &self,
        amount: &Money,
        reference: &str,
        at: DateTime<Utc>,
    ) -> Result<SavingsPlan, DomainError> {
        if !self.status.is_terminal() {
            return Err(DomainError::invalid_plan_state(
                self.status.as_str(),
                self.status.as_str(),
                "withdrawals are only allowed from completed or cancelled plans",
            ));
        }

        if amount.is_zero() {
            return Err(DomainError::InvalidInput(
                "withdrawal amount must be greater than zero".to_string(),
            ));
        }

        if amount.is_greater_than(&self.current_amount)? {
            return Err(DomainError::insufficient_funds(
                self.current_amount.clone(),
                amount.clone(),
            ));
        }

        let mut plan = self.clone();
        plan.current_amount = self.current_amount.subtract(amount)?;
        plan.last_transaction_reference = Some(reference.to_string());
        plan.updated_at = at;
        Ok(plan)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether the configured time of day has been reached on `now`'s date
    pub fn is_auto_save_time(&self, now: DateTime<Utc>) -> bool {
        match (self.auto_save_enabled, self.auto_save_time) {
            (true, Some(time)) => now.time() >= time.time(),
            _ => false,
        }
    }

    /// Auto-save should run: enabled, active, time reached, nothing saved today
    pub fn is_auto_save_due(&self, now: DateTime<Utc>) -> bool {
        self.status == PlanStatus::Active
            && self.is_auto_save_time(now)
            && self.last_contribution_date != Some(now.date_naive())
    }

    /// Percentage of the target saved so far, rounded to 2 places
    pub fn progress_percentage(&self) -> Option<Decimal> {
        let target = self.target_amount.as_ref()?;
        if target.is_zero() {
            return None;
        }
        Some((self.current_amount.amount() / target.amount() * Decimal::ONE_HUNDRED).round_dp(2))
    }

    /// Amount still missing to reach the target
    pub fn remaining_to_target(&self) -> Option<Money> {
        self.target_amount
            .as_ref()
            .and_then(|target| target.subtract(&self.current_amount).ok())
    }

    fn transition(&self, to: PlanStatus, now: DateTime<Utc>) -> SavingsPlan {
        let mut plan = self.clone();
        plan.status = to;
        plan.updated_at = now;
        plan
    }

    fn terminal_error(&self, attempted: PlanStatus) -> DomainError {
        DomainError::invalid_plan_state(
            self.status.as_str(),
            attempted.as_str(),
            format!("plan is already {}", self.status),
        )
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn plan_name(&self) -> &str {
        &self.plan_name
    }

    pub fn daily_amount(&self) -> &Money {
        &self.daily_amount
    }

    pub fn target_amount(&self) -> Option<&Money> {
        self.target_amount.as_ref()
    }

    pub fn current_amount(&self) -> &Money {
        &self.current_amount
    }

    pub fn status(&self) -> PlanStatus {
        self.status
    }

    pub fn contribution_streak(&self) -> u32 {
        self.contribution_streak
    }

    pub fn total_contributions(&self) -> u32 {
        self.total_contributions
    }

    pub fn auto_save_enabled(&self) -> bool {
        self.auto_save_enabled
    }

    pub fn auto_save_time(&self) -> Option<AutoSaveTime> {
        self.auto_save_time
    }

    pub fn last_contribution_date(&self) -> Option<NaiveDate> {
        self.last_contribution_date
    }

    pub fn last_transaction_reference(&self) -> Option<&str> {
        self.last_transaction_reference.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Entity for SavingsPlan {
    type Id = PlanId;

    fn entity_type() -> &'static str {
        "SavingsPlan"
    }

    fn id(&self) -> PlanId {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Currency;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ngn(amount: Decimal) -> Money {
        Money::new(amount, Currency::ngn()).unwrap()
    }

    fn day(d: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, hour, 0, 0).unwrap()
    }

    fn plan(daily: Decimal, target: Option<Decimal>) -> SavingsPlan {
        SavingsPlan::create(
            NewSavingsPlan {
                user_id: UserId::new(),
                plan_name: "Rent".to_string(),
                daily_amount: ngn(daily),
                target_amount: target.map(ngn),
                auto_save_time: None,
            },
            day(1, 6),
        )
        .unwrap()
    }

    fn plan_with_balance(daily: Decimal, target: Decimal, current: Decimal) -> SavingsPlan {
        let base = plan(daily, Some(target));
        SavingsPlan::from_state(PlanState {
            id: base.id(),
            user_id: base.user_id(),
            plan_name: base.plan_name().to_string(),
            daily_amount: ngn(daily),
            target_amount: Some(ngn(target)),
            current_amount: ngn(current),
            status: PlanStatus::Active,
            contribution_streak: 0,
            total_contributions: 0,
            auto_save_enabled: false,
            auto_save_time: None,
            last_contribution_date: None,
            last_transaction_reference: None,
            version: 1,
            created_at: day(1, 6),
            updated_at: day(1, 6),
        })
        .unwrap()
    }

    #[test]
    fn test_create_plan() {
        let plan = plan(dec!(100), Some(dec!(1000)));

        assert_eq!(plan.status(), PlanStatus::Active);
        assert!(plan.current_amount().is_zero());
        assert_eq!(plan.version(), 1);
        assert!(!plan.auto_save_enabled());
    }

    #[test]
    fn test_create_rejects_target_below_daily() {
        let result = SavingsPlan::create(
            NewSavingsPlan {
                user_id: UserId::new(),
                plan_name: "Tiny".to_string(),
                daily_amount: ngn(dec!(100)),
                target_amount: Some(ngn(dec!(50))),
                auto_save_time: None,
            },
            day(1, 6),
        );
        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn test_pause_resume_cycle() {
        let plan = plan(dec!(100), None);

        let paused = plan.pause(day(2, 9)).unwrap();
        assert_eq!(paused.status(), PlanStatus::Paused);
        assert_eq!(plan.status(), PlanStatus::Active, "original is untouched");

        assert!(matches!(
            paused.pause(day(2, 10)),
            Err(DomainError::InvalidPlanState { .. })
        ));

        let resumed = paused.resume(day(3, 9)).unwrap();
        assert_eq!(resumed.status(), PlanStatus::Active);
        assert!(resumed.resume(day(3, 10)).is_err());
    }

    #[test]
    fn test_cancel_from_active_and_paused() {
        let plan = plan(dec!(100), None);
        assert_eq!(plan.cancel(day(2, 9)).unwrap().status(), PlanStatus::Cancelled);

        let paused = plan.pause(day(2, 9)).unwrap();
        assert_eq!(paused.cancel(day(2, 10)).unwrap().status(), PlanStatus::Cancelled);
    }

    #[test]
    fn test_terminal_states_are_closed() {
        let cancelled = plan(dec!(100), None).cancel(day(2, 9)).unwrap();
        let completed = plan_with_balance(dec!(50), dec!(1000), dec!(950))
            .make_contribution(&ngn(dec!(50)), "CONTRIB-00000001", day(2, 9))
            .unwrap();
        assert_eq!(completed.status(), PlanStatus::Completed);

        for terminal in [cancelled, completed] {
            let at = day(3, 9);
            let err = |r: Result<SavingsPlan, DomainError>| {
                matches!(r, Err(DomainError::InvalidPlanState { .. }))
            };
            assert!(err(terminal.pause(at)));
            assert!(err(terminal.resume(at)));
            assert!(err(terminal.cancel(at)));
            assert!(err(terminal.make_contribution(terminal.daily_amount(), "CONTRIB-00000002", at)));
        }
    }

    #[test]
    fn test_contribution_adds_exact_amount() {
        let plan = plan(dec!(100), Some(dec!(1000)));
        let updated = plan
            .make_contribution(&ngn(dec!(100)), "CONTRIB-AAAAAAAA", day(2, 9))
            .unwrap();

        assert_eq!(
            updated.current_amount(),
            &plan.current_amount().add(&ngn(dec!(100))).unwrap()
        );
        assert_eq!(updated.total_contributions(), 1);
        assert_eq!(updated.contribution_streak(), 1);
        assert_eq!(updated.last_transaction_reference(), Some("CONTRIB-AAAAAAAA"));
    }

    #[test]
    fn test_contribution_must_match_daily_amount() {
        let plan = plan(dec!(100), None);
        let result = plan.make_contribution(&ngn(dec!(99.99)), "CONTRIB-1", day(2, 9));

        match result {
            Err(DomainError::InvalidContribution { expected, actual, .. }) => {
                assert_eq!(expected, Some(ngn(dec!(100))));
                assert_eq!(actual, Some(ngn(dec!(99.99))));
            }
            other => panic!("Expected InvalidContribution, got: {:?}", other),
        }
    }

    #[test]
    fn test_contribution_exceeding_target_fails() {
        let plan = plan_with_balance(dec!(100), dec!(1000), dec!(950));
        let result = plan.make_contribution(&ngn(dec!(100)), "CONTRIB-1", day(2, 9));

        assert!(matches!(result, Err(DomainError::InvalidContribution { .. })));
    }

    #[test]
    fn test_contribution_reaching_target_completes() {
        let plan = plan_with_balance(dec!(50), dec!(1000), dec!(950));
        let updated = plan
            .make_contribution(&ngn(dec!(50)), "CONTRIB-1", day(2, 9))
            .unwrap();

        assert_eq!(updated.status(), PlanStatus::Completed);
        assert_eq!(updated.current_amount(), &ngn(dec!(1000)));
        assert_eq!(updated.progress_percentage(), Some(dec!(100)));
    }

    #[test]
    fn test_contribution_wrong_currency() {
        let plan = plan(dec!(100), None);
        let dollars = Money::new(dec!(100), Currency::new("USD").unwrap()).unwrap();

        assert!(matches!(
            plan.make_contribution(&dollars, "CONTRIB-1", day(2, 9)),
            Err(DomainError::Money(_))
        ));
    }

    #[test]
    fn test_streak_consecutive_days() {
        let amount = ngn(dec!(100));
        let plan = plan(dec!(100), None)
            .make_contribution(&amount, "R1", day(2, 9))
            .unwrap()
            .make_contribution(&amount, "R2", day(3, 9))
            .unwrap()
            .make_contribution(&amount, "R3", day(4, 9))
            .unwrap();

        assert_eq!(plan.contribution_streak(), 3);
        assert_eq!(plan.total_contributions(), 3);
    }

    #[test]
    fn test_streak_resets_after_gap() {
        let amount = ngn(dec!(100));
        let plan = plan(dec!(100), None)
            .make_contribution(&amount, "R1", day(2, 9))
            .unwrap()
            .make_contribution(&amount, "R2", day(3, 9))
            .unwrap()
            .make_contribution(&amount, "R3", day(5, 9))
            .unwrap();

        assert_eq!(plan.contribution_streak(), 1);
        assert_eq!(plan.total_contributions(), 3);
    }

    #[test]
    fn test_same_day_contribution_keeps_streak() {
        let amount = ngn(dec!(100));
        let plan = plan(dec!(100), None)
            .make_contribution(&amount, "R1", day(2, 9))
            .unwrap()
            .make_contribution(&amount, "R2", day(3, 9))
            .unwrap()
            .make_contribution(&amount, "R3", day(3, 18))
            .unwrap();

        assert_eq!(plan.contribution_streak(), 2);
    }

    #[test]
    fn test_auto_save_schedule() {
        let time: AutoSaveTime = "08:30".parse().unwrap();
        let plan = plan(dec!(100), None)
            .update_auto_save(true, Some(time), day(1, 7))
            .unwrap();

        assert!(!plan.is_auto_save_due(Utc.with_ymd_and_hms(2026, 3, 2, 8, 29, 0).unwrap()));
        assert!(plan.is_auto_save_due(Utc.with_ymd_and_hms(2026, 3, 2, 8, 30, 0).unwrap()));

        // Already contributed today
        let saved = plan
            .make_contribution(&ngn(dec!(100)), "AUTOSAVE-1", day(2, 9))
            .unwrap();
        assert!(!saved.is_auto_save_due(day(2, 10)));
        assert!(saved.is_auto_save_due(day(3, 10)));

        // Paused plans are never due
        assert!(!plan.pause(day(2, 7)).unwrap().is_auto_save_due(day(2, 10)));
    }

    #[test]
    fn test_enable_auto_save_requires_time() {
        let plan = plan(dec!(100), None);
        assert!(matches!(
            plan.update_auto_save(true, None, day(1, 7)),
            Err(DomainError::InvalidInput(_))
        ));

        let disabled = plan.update_auto_save(false, None, day(1, 7)).unwrap();
        assert!(!disabled.auto_save_enabled());
    }

    #[test]
    fn test_auto_save_time_parsing() {
        assert_eq!("07:05".parse::<AutoSaveTime>().unwrap().to_string(), "07:05");
        assert!("7:05".parse::<AutoSaveTime>().is_err());
        assert!("24:00".parse::<AutoSaveTime>().is_err());
        assert!("07:05:00".parse::<AutoSaveTime>().is_err());
    }

    #[test]
    fn test_withdraw_only_from_finished_plan() {
        let active = plan_with_balance(dec!(100), dec!(1000), dec!(500));
        assert!(matches!(
            active.withdraw(&ngn(dec!(100)), "WITHDRAW-1", day(2, 9)),
            Err(DomainError::InvalidPlanState { .. })
        ));

        let cancelled = active.cancel(day(2, 9)).unwrap();
        let after = cancelled
            .withdraw(&ngn(dec!(200)), "WITHDRAW-1", day(2, 10))
            .unwrap();
        assert_eq!(after.current_amount(), &ngn(dec!(300)));

        assert!(matches!(
            after.withdraw(&ngn(dec!(300.01)), "WITHDRAW-2", day(2, 11)),
            Err(DomainError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_from_state_rejects_overfilled_plan() {
        let base = plan(dec!(100), Some(dec!(1000)));
        let result = SavingsPlan::from_state(PlanState {
            id: base.id(),
            user_id: base.user_id(),
            plan_name: "Rent".to_string(),
            daily_amount: ngn(dec!(100)),
            target_amount: Some(ngn(dec!(1000))),
            current_amount: ngn(dec!(1100)),
            status: PlanStatus::Active,
            contribution_streak: 0,
            total_contributions: 0,
            auto_save_enabled: false,
            auto_save_time: None,
            last_contribution_date: None,
            last_transaction_reference: None,
            version: 3,
            created_at: day(1, 6),
            updated_at: day(1, 6),
        });
        assert!(result.is_err());
    }
}
