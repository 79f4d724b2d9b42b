//! Closed role enumeration and the capability table deciding which operator may run which command.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::AdminId;
use super::error::MembershipError;

/// Organizational roles known to the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "fondateur", alias = "founder")]
    Founder,
    #[serde(rename = "directeur_national", alias = "national_director")]
    NationalDirector,
    #[serde(rename = "directeur_technique", alias = "technical_director")]
    TechnicalDirector,
    #[serde(rename = "instructeur", alias = "instructor")]
    Instructor,
    #[serde(rename = "membre", alias = "member")]
    Member,
}

/// Administrative commands subject to the capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ListPendingRequests,
    ApproveRequest,
    RejectRequest,
    ViewSubscriptions,
    SetPaidFlag,
    RecordPayment,
    GenerateInvoice,
    FetchInvoiceDocument,
    CreateMember,
}

const FULL_ACCESS: &[Operation] = &[
    Operation::ListPendingRequests,
    Operation::ApproveRequest,
    Operation::RejectRequest,
    Operation::ViewSubscriptions,
    Operation::SetPaidFlag,
    Operation::RecordPayment,
    Operation::GenerateInvoice,
    Operation::FetchInvoiceDocument,
    Operation::CreateMember,
];

const NATIONAL_DIRECTOR: &[Operation] = &[
    Operation::ListPendingRequests,
    Operation::ApproveRequest,
    Operation::RejectRequest,
    Operation::ViewSubscriptions,
    Operation::GenerateInvoice,
    Operation::FetchInvoiceDocument,
];

const TECHNICAL_DIRECTOR: &[Operation] = &[
    Operation::ListPendingRequests,
    Operation::ApproveRequest,
    Operation::RejectRequest,
    Operation::ViewSubscriptions,
];

const INSTRUCTOR: &[Operation] = &[Operation::ListPendingRequests, Operation::ViewSubscriptions];

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Founder,
        Role::NationalDirector,
        Role::TechnicalDirector,
        Role::Instructor,
        Role::Member,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Founder => "fondateur",
            Role::NationalDirector => "directeur_national",
            Role::TechnicalDirector => "directeur_technique",
            Role::Instructor => "instructeur",
            Role::Member => "membre",
        }
    }

    /// Accepts the stored wire names as well as their English spellings.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "fondateur" | "founder" => Some(Role::Founder),
            "directeur_national" | "national_director" => Some(Role::NationalDirector),
            "directeur_technique" | "technical_director" => Some(Role::TechnicalDirector),
            "instructeur" | "instructor" => Some(Role::Instructor),
            "membre" | "member" => Some(Role::Member),
            _ => None,
        }
    }

    pub const fn capabilities(self) -> &'static [Operation] {
        match self {
            Role::Admin | Role::Founder => FULL_ACCESS,
            Role::NationalDirector => NATIONAL_DIRECTOR,
            Role::TechnicalDirector => TECHNICAL_DIRECTOR,
            Role::Instructor => INSTRUCTOR,
            Role::Member => &[],
        }
    }

    pub fn permits(self, operation: Operation) -> bool {
        self.capabilities().contains(&operation)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Operation {
    pub const fn label(self) -> &'static str {
        match self {
            Operation::ListPendingRequests => "list pending requests",
            Operation::ApproveRequest => "approve requests",
            Operation::RejectRequest => "reject requests",
            Operation::ViewSubscriptions => "view subscriptions",
            Operation::SetPaidFlag => "change the paid flag",
            Operation::RecordPayment => "record payments",
            Operation::GenerateInvoice => "generate invoices",
            Operation::FetchInvoiceDocument => "download invoices",
            Operation::CreateMember => "create member accounts",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Authenticated administrator issuing a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: AdminId,
    pub role: Role,
}

impl Operator {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: AdminId(id.into()),
            role,
        }
    }

    pub fn authorize(&self, operation: Operation) -> Result<(), MembershipError> {
        if self.role.permits(operation) {
            Ok(())
        } else {
            Err(MembershipError::Forbidden {
                role: self.role,
                operation,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn administrators_hold_every_capability() {
        for operation in FULL_ACCESS {
            assert!(Role::Admin.permits(*operation));
            assert!(Role::Founder.permits(*operation));
        }
    }

    #[test]
    fn members_hold_no_administrative_capability() {
        assert!(Role::Member.capabilities().is_empty());
        let operator = Operator::new("mbr-7", Role::Member);
        match operator.authorize(Operation::ViewSubscriptions) {
            Err(MembershipError::Forbidden { role, operation }) => {
                assert_eq!(role, Role::Member);
                assert_eq!(operation, Operation::ViewSubscriptions);
            }
            other => panic!("expected forbidden, got {other:?}"),
        }
    }

    #[test]
    fn technical_directors_cannot_touch_billing() {
        assert!(Role::TechnicalDirector.permits(Operation::ApproveRequest));
        assert!(!Role::TechnicalDirector.permits(Operation::SetPaidFlag));
        assert!(!Role::TechnicalDirector.permits(Operation::GenerateInvoice));
        assert!(Role::NationalDirector.permits(Operation::GenerateInvoice));
        assert!(!Role::NationalDirector.permits(Operation::RecordPayment));
        assert!(!Role::NationalDirector.permits(Operation::CreateMember));
    }

    #[test]
    fn parse_accepts_wire_and_english_names() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.label()), Some(role));
        }
        assert_eq!(Role::parse(" Technical_Director "), Some(Role::TechnicalDirector));
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn roles_serialize_to_wire_names() {
        let json = serde_json::to_string(&Role::NationalDirector).expect("serializes");
        assert_eq!(json, "\"directeur_national\"");
        let parsed: Role = serde_json::from_str("\"instructor\"").expect("alias parses");
        assert_eq!(parsed, Role::Instructor);
    }
}
