use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::repository::{MemberRepository, SubscriptionFact, SubscriptionRepository};
use crate::membership::domain::{BeltGrade, Member, MemberId, MembershipType};
use crate::membership::error::MembershipError;
use crate::membership::roles::Role;
use crate::membership::status::{DerivedStatus, SubscriptionStatus};

/// Filters accepted by the subscription overview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OverviewQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<SubscriptionStatus>,
}

/// One row of the administrator overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberWithStatus {
    pub member_id: MemberId,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub belt_grade: BeltGrade,
    pub membership_type: MembershipType,
    pub has_paid_flag: bool,
    pub expiry_date: Option<NaiveDate>,
    pub status: SubscriptionStatus,
    pub days_remaining: Option<u32>,
}

impl MemberWithStatus {
    fn new(member: &Member, fact: &SubscriptionFact, derived: DerivedStatus) -> Self {
        Self {
            member_id: member.id.clone(),
            full_name: member.contact.full_name.clone(),
            email: member.contact.email.clone(),
            role: member.role,
            belt_grade: member.belt_grade,
            membership_type: member.membership_type,
            has_paid_flag: fact.has_paid_flag,
            expiry_date: fact.expiry_date,
            status: derived.status,
            days_remaining: derived.days_remaining,
        }
    }
}

/// Counts per derived status, always over the whole population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubscriptionStats {
    pub total: usize,
    pub active: usize,
    pub expired: usize,
    pub never_paid: usize,
}

impl SubscriptionStats {
    fn record(&mut self, status: SubscriptionStatus) {
        self.total += 1;
        match status {
            SubscriptionStatus::Active => self.active += 1,
            SubscriptionStatus::Expired => self.expired += 1,
            SubscriptionStatus::NeverPaid => self.never_paid += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionOverview {
    pub members: Vec<MemberWithStatus>,
    pub stats: SubscriptionStats,
}

/// Authoritative store of member accounts and their subscription facts.
///
/// Writes are serialized through a single writer lock; reads go straight to the repositories and
/// may observe a write that is in flight but never a half-applied one.
pub struct SubscriptionLedger {
    members: Arc<dyn MemberRepository>,
    facts: Arc<dyn SubscriptionRepository>,
    writer: Mutex<()>,
}

impl SubscriptionLedger {
    pub fn new(members: Arc<dyn MemberRepository>, facts: Arc<dyn SubscriptionRepository>) -> Self {
        Self {
            members,
            facts,
            writer: Mutex::new(()),
        }
    }

    fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates the account together with an unpaid subscription fact.
    pub fn enroll(&self, member: Member) -> Result<Member, MembershipError> {
        let _writer = self.write_lock();

        if let Some(existing) = self.members.find_by_email(&member.contact.email)? {
            if existing.id != member.id {
                return Err(MembershipError::validation(format!(
                    "an account already exists for {}",
                    member.contact.email
                )));
            }
        }

        let stored = self.members.insert(member)?;
        if let Err(err) = self
            .facts
            .upsert(SubscriptionFact::opened(stored.id.clone(), Utc::now()))
        {
            if let Err(cleanup) = self.members.remove(&stored.id) {
                warn!(member_id = %stored.id, error = %cleanup, "failed to remove half-enrolled member");
            }
            return Err(err.into());
        }

        info!(member_id = %stored.id, "member enrolled");
        Ok(stored)
    }

    /// Undoes [`SubscriptionLedger::enroll`] when the surrounding approval could not complete.
    pub fn revoke_enrollment(&self, member_id: &MemberId) -> Result<(), MembershipError> {
        let _writer = self.write_lock();
        self.facts.remove(member_id)?;
        self.members.remove(member_id)?;
        warn!(member_id = %member_id, "member enrollment revoked");
        Ok(())
    }

    pub fn member(&self, member_id: &MemberId) -> Result<Member, MembershipError> {
        self.members
            .fetch(member_id)?
            .ok_or_else(|| MembershipError::MemberNotFound(member_id.clone()))
    }

    /// Current fact for an existing member. A member without a stored fact reads as never paid.
    pub fn fact(&self, member_id: &MemberId) -> Result<SubscriptionFact, MembershipError> {
        let member = self.member(member_id)?;
        Ok(self
            .facts
            .fetch(member_id)?
            .unwrap_or_else(|| SubscriptionFact::opened(member.id, member.created_at)))
    }

    /// Sets the operator override flag. The expiry date is left untouched.
    pub fn set_paid_flag(
        &self,
        member_id: &MemberId,
        has_paid_flag: bool,
    ) -> Result<SubscriptionFact, MembershipError> {
        let _writer = self.write_lock();
        let mut fact = self.fact(member_id)?;
        fact.has_paid_flag = has_paid_flag;
        fact.updated_at = Utc::now();
        self.facts.upsert(fact.clone())?;

        info!(member_id = %member_id, has_paid_flag, "paid flag updated");
        Ok(fact)
    }

    /// Records a confirmed payment by replacing the expiry date.
    pub fn record_payment(
        &self,
        member_id: &MemberId,
        new_expiry: NaiveDate,
    ) -> Result<SubscriptionFact, MembershipError> {
        let _writer = self.write_lock();
        let mut fact = self.fact(member_id)?;
        let previous = fact.expiry_date.replace(new_expiry);
        fact.updated_at = Utc::now();
        self.facts.upsert(fact.clone())?;

        info!(
            member_id = %member_id,
            previous_expiry = ?previous,
            expiry = %new_expiry,
            "membership payment recorded"
        );
        Ok(fact)
    }

    pub fn member_with_status(
        &self,
        member_id: &MemberId,
        today: NaiveDate,
    ) -> Result<MemberWithStatus, MembershipError> {
        let member = self.member(member_id)?;
        let fact = self.fact(member_id)?;
        let derived = fact.derive(today);
        Ok(MemberWithStatus::new(&member, &fact, derived))
    }

    /// Every member with a status derived for `today`, sorted by name.
    ///
    /// Filters narrow the rows; the stats always cover all members.
    pub fn list_with_status(
        &self,
        query: &OverviewQuery,
        today: NaiveDate,
    ) -> Result<SubscriptionOverview, MembershipError> {
        let mut stats = SubscriptionStats::default();
        let mut members = Vec::new();

        for member in self.members.list()? {
            let fact = self
                .facts
                .fetch(&member.id)?
                .unwrap_or_else(|| SubscriptionFact::opened(member.id.clone(), member.created_at));
            let derived = fact.derive(today);
            stats.record(derived.status);

            let search_hit = query
                .search
                .as_deref()
                .map_or(true, |needle| member.matches_search(needle));
            let status_hit = query.status.map_or(true, |wanted| wanted == derived.status);
            if search_hit && status_hit {
                members.push(MemberWithStatus::new(&member, &fact, derived));
            }
        }

        members.sort_by(|left, right| {
            left.full_name
                .to_lowercase()
                .cmp(&right.full_name.to_lowercase())
                .then_with(|| left.member_id.cmp(&right.member_id))
        });

        Ok(SubscriptionOverview { members, stats })
    }
}
