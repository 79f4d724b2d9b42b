use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::membership::domain::{Member, MemberId};
use crate::membership::error::RepositoryError;
use crate::membership::status::{self, DerivedStatus};

/// Stored subscription state for one member. Status is never stored, only derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionFact {
    pub member_id: MemberId,
    pub has_paid_flag: bool,
    pub expiry_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionFact {
    /// Fact for a freshly enrolled member: unpaid, no expiry.
    pub fn opened(member_id: MemberId, at: DateTime<Utc>) -> Self {
        Self {
            member_id,
            has_paid_flag: false,
            expiry_date: None,
            updated_at: at,
        }
    }

    pub fn derive(&self, today: NaiveDate) -> DerivedStatus {
        status::derive(self.has_paid_flag, self.expiry_date, today)
    }
}

/// Storage abstraction for member accounts.
pub trait MemberRepository: Send + Sync {
    /// Refuses with [`RepositoryError::Conflict`] when the id or the source request is taken.
    fn insert(&self, member: Member) -> Result<Member, RepositoryError>;
    fn fetch(&self, id: &MemberId) -> Result<Option<Member>, RepositoryError>;
    /// Case-insensitive lookup.
    fn find_by_email(&self, email: &str) -> Result<Option<Member>, RepositoryError>;
    fn remove(&self, id: &MemberId) -> Result<(), RepositoryError>;
    fn list(&self) -> Result<Vec<Member>, RepositoryError>;
}

/// Storage abstraction for subscription facts, keyed by member.
pub trait SubscriptionRepository: Send + Sync {
    fn fetch(&self, member_id: &MemberId) -> Result<Option<SubscriptionFact>, RepositoryError>;
    fn upsert(&self, fact: SubscriptionFact) -> Result<(), RepositoryError>;
    fn remove(&self, member_id: &MemberId) -> Result<(), RepositoryError>;
}
