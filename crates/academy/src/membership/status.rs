//! Temporal status resolution.
//!
//! Status is never stored. Every listing or detail read calls [`derive`] with the current date so a
//! membership expires on schedule even when nothing was written in between.

use std::fmt;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Subscription status derived from the stored expiry date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    NeverPaid,
}

impl SubscriptionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::NeverPaid => "never_paid",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(SubscriptionStatus::Active),
            "expired" => Some(SubscriptionStatus::Expired),
            "never_paid" => Some(SubscriptionStatus::NeverPaid),
            _ => None,
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Calendar date every "as of today" read defaults to. Always UTC.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Status plus the day count shown next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DerivedStatus {
    pub status: SubscriptionStatus,
    /// `None` exactly when the status is [`SubscriptionStatus::NeverPaid`].
    pub days_remaining: Option<u32>,
}

/// Resolves the subscription status for `today`.
///
/// The manual paid flag is an operator override used for display and filtering only; it never
/// grants `Active` on its own. The expiry date is inclusive: a membership expiring today is still
/// active.
pub fn resolve(
    _has_paid_flag: bool,
    expiry_date: Option<NaiveDate>,
    today: NaiveDate,
) -> SubscriptionStatus {
    match expiry_date {
        None => SubscriptionStatus::NeverPaid,
        Some(expiry) if expiry >= today => SubscriptionStatus::Active,
        Some(_) => SubscriptionStatus::Expired,
    }
}

/// Whole days left before expiry, clamped at zero once the date has passed.
pub fn days_remaining(expiry_date: Option<NaiveDate>, today: NaiveDate) -> Option<u32> {
    expiry_date.map(|expiry| {
        let days = (expiry - today).num_days().max(0);
        u32::try_from(days).unwrap_or(u32::MAX)
    })
}

pub fn derive(has_paid_flag: bool, expiry_date: Option<NaiveDate>, today: NaiveDate) -> DerivedStatus {
    DerivedStatus {
        status: resolve(has_paid_flag, expiry_date, today),
        days_remaining: days_remaining(expiry_date, today),
    }
}
