//! Backup tiers and expiration arithmetic
//!
//! Each run snapshots an instance under exactly one tier. The tier decides the
//! snapshot description and how long the snapshot is kept.

use crate::defaults::{
    DAYS_PER_MONTH, DAYS_PER_WEEK, DEFAULT_RETENTION_DAYS, DEFAULT_RETENTION_MONTHS,
    DEFAULT_RETENTION_WEEKS,
};
use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use std::fmt;

/// Retention tier of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Daily,
    Weekly,
    Monthly,
}

impl Tier {
    /// Name used in snapshot descriptions
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Daily => "Daily",
            Tier::Weekly => "Weekly",
            Tier::Monthly => "Monthly",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifetimes of the three tiers
///
/// A zero `weeks` or `months` disables that tier; a zero `days` makes Daily
/// snapshots expire immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub days: u32,
    pub weeks: u32,
    pub months: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            days: DEFAULT_RETENTION_DAYS,
            weeks: DEFAULT_RETENTION_WEEKS,
            months: DEFAULT_RETENTION_MONTHS,
        }
    }
}

/// Tier and expiry chosen for one instance in one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPlan {
    pub tier: Tier,
    pub expires_at: DateTime<Utc>,
}

impl RetentionPolicy {
    /// Pick the tier for `today`.
    ///
    /// Monthly is checked first (first day of the month), then Weekly
    /// (Monday), and Daily is the fallback.
    pub fn select_tier(&self, today: DateTime<Utc>) -> Tier {
        if today.day() == 1 && self.months > 0 {
            Tier::Monthly
        } else if today.weekday() == Weekday::Mon && self.weeks > 0 {
            Tier::Weekly
        } else {
            Tier::Daily
        }
    }

    /// Retention horizon of `tier`, in days
    pub fn lifetime_days(&self, tier: Tier) -> i64 {
        match tier {
            Tier::Daily => i64::from(self.days),
            Tier::Weekly => DAYS_PER_WEEK * i64::from(self.weeks),
            Tier::Monthly => DAYS_PER_MONTH * i64::from(self.months),
        }
    }

    /// Expiration of a snapshot of `tier` taken at `today`
    ///
    /// Saturates at the maximum representable time instead of overflowing.
    pub fn expiration(&self, tier: Tier, today: DateTime<Utc>) -> DateTime<Utc> {
        Duration::try_days(self.lifetime_days(tier))
            .and_then(|lifetime| today.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Select the tier and compute the expiry in one step
    pub fn plan(&self, today: DateTime<Utc>) -> TierPlan {
        let tier = self.select_tier(today);
        TierPlan {
            tier,
            expires_at: self.expiration(tier, today),
        }
    }
}
