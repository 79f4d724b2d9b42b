use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::membership::domain::{
    non_blank, string_identifier, AdminId, Affiliations, BeltGrade, ContactDetails, Member,
    MemberId, MembershipType,
};
use crate::membership::error::MembershipError;
use crate::membership::roles::Role;

string_identifier!(
    /// Identifier wrapper for membership requests.
    RequestId
);

/// Approval lifecycle of a request. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    /// Accepts the English labels and the French ones stored by the legacy console.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "pending" | "en attente" => Some(RequestStatus::Pending),
            "approved" | "approuvé" | "approuve" => Some(RequestStatus::Approved),
            "rejected" | "rejeté" | "rejete" | "refusé" | "refuse" => {
                Some(RequestStatus::Rejected)
            }
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }

    /// Only `Pending -> Approved` and `Pending -> Rejected` exist.
    pub fn transition(self, to: RequestStatus) -> Result<RequestStatus, MembershipError> {
        match (self, to) {
            (RequestStatus::Pending, RequestStatus::Approved | RequestStatus::Rejected) => Ok(to),
            (from, to) => Err(MembershipError::InvalidStateTransition { from, to }),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Intake payload captured by the public join form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipApplication {
    pub contact: ContactDetails,
    #[serde(default)]
    pub affiliations: Affiliations,
    #[serde(default)]
    pub belt_grade: Option<BeltGrade>,
    #[serde(default)]
    pub membership_type: Option<MembershipType>,
    #[serde(default)]
    pub motivations: Vec<String>,
}

impl MembershipApplication {
    /// Trims free text and drops blank optional fields and motivations.
    pub fn normalized(mut self) -> Result<Self, MembershipError> {
        self.contact = self.contact.normalized()?;
        self.affiliations.club_id = non_blank(self.affiliations.club_id);
        self.affiliations.instructor_id = non_blank(self.affiliations.instructor_id);
        self.affiliations.technical_director_id =
            non_blank(self.affiliations.technical_director_id);
        self.motivations = self
            .motivations
            .into_iter()
            .map(|motivation| motivation.trim().to_string())
            .filter(|motivation| !motivation.is_empty())
            .collect();

        Ok(self)
    }
}

/// A prospective member's request, retained for audit after the decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub id: RequestId,
    pub contact: ContactDetails,
    pub affiliations: Affiliations,
    pub belt_grade: Option<BeltGrade>,
    pub membership_type: Option<MembershipType>,
    pub motivations: Vec<String>,
    pub status: RequestStatus,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_by: Option<AdminId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub member_id: Option<MemberId>,
}

impl PendingRequest {
    pub fn new(id: RequestId, application: MembershipApplication, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            contact: application.contact,
            affiliations: application.affiliations,
            belt_grade: application.belt_grade,
            membership_type: application.membership_type,
            motivations: application.motivations,
            status: RequestStatus::Pending,
            admin_note: None,
            created_at,
            decided_by: None,
            decided_at: None,
            member_id: None,
        }
    }

    /// Writes a terminal decision. Fails without touching the request when it already left `Pending`.
    pub fn apply(&mut self, decision: &Decision) -> Result<(), MembershipError> {
        self.status = self.status.transition(decision.outcome)?;
        self.decided_by = Some(decision.decided_by.clone());
        self.decided_at = Some(decision.decided_at);
        self.admin_note = decision.admin_note.clone();
        self.member_id = decision.member_id.clone();
        Ok(())
    }

    /// Deterministic mapping from the stored request onto a new member account.
    pub fn provision_member(
        &self,
        member_id: MemberId,
        credential_hash: String,
        created_at: DateTime<Utc>,
    ) -> Member {
        Member {
            id: member_id,
            contact: self.contact.clone(),
            role: Role::Member,
            affiliations: self.affiliations.clone(),
            belt_grade: self.belt_grade.unwrap_or_default(),
            membership_type: self.membership_type.unwrap_or_default(),
            source_request: Some(self.id.clone()),
            credential_hash: Some(credential_hash),
            created_at,
        }
    }
}

/// Terminal decision stamped onto a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub outcome: RequestStatus,
    pub decided_by: AdminId,
    pub decided_at: DateTime<Utc>,
    pub admin_note: Option<String>,
    pub member_id: Option<MemberId>,
}

impl Decision {
    pub fn approved(decided_by: AdminId, decided_at: DateTime<Utc>, member_id: MemberId) -> Self {
        Self {
            outcome: RequestStatus::Approved,
            decided_by,
            decided_at,
            admin_note: None,
            member_id: Some(member_id),
        }
    }

    pub fn rejected(
        decided_by: AdminId,
        decided_at: DateTime<Utc>,
        reason: Option<String>,
    ) -> Self {
        Self {
            outcome: RequestStatus::Rejected,
            decided_by,
            decided_at,
            admin_note: reason,
            member_id: None,
        }
    }
}
