use std::time::Duration;

use rust_decimal::Decimal;

/// Tunables shared by the request, ledger, and invoice components.
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipSettings {
    /// Upper bound for any single call into an external collaborator.
    pub collaborator_timeout: Duration,
    /// Amount billed when a membership invoice is generated without an explicit amount.
    pub membership_fee: Decimal,
    /// Length of one paid membership cycle.
    pub membership_period_days: u32,
    pub password_length: usize,
    pub organization_name: String,
}

impl Default for MembershipSettings {
    fn default() -> Self {
        Self {
            collaborator_timeout: Duration::from_secs(5),
            membership_fee: Decimal::from(35),
            membership_period_days: 365,
            password_length: 12,
            organization_name: "Academie Jacques Levinet".to_string(),
        }
    }
}

impl MembershipSettings {
    pub fn membership_period(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.membership_period_days))
    }
}
