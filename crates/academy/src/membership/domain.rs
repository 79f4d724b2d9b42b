use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::MembershipError;
use super::requests::RequestId;
use super::roles::Role;

macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, ::serde::Serialize, ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(::uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

pub(crate) use string_identifier;

string_identifier!(
    /// Identifier wrapper for member accounts.
    MemberId
);

string_identifier!(
    /// Identifier of the administrator performing an operator action.
    AdminId
);

/// Ordered rank describing a member's technical level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BeltGrade {
    #[default]
    White,
    Yellow,
    Orange,
    Green,
    Blue,
    Brown,
    Black,
}

impl BeltGrade {
    pub const fn label(self) -> &'static str {
        match self {
            BeltGrade::White => "Ceinture Blanche",
            BeltGrade::Yellow => "Ceinture Jaune",
            BeltGrade::Orange => "Ceinture Orange",
            BeltGrade::Green => "Ceinture Verte",
            BeltGrade::Blue => "Ceinture Bleue",
            BeltGrade::Brown => "Ceinture Marron",
            BeltGrade::Black => "Ceinture Noire",
        }
    }
}

/// Membership category purchased by the member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipType {
    #[default]
    Standard,
    Premium,
    Vip,
}

impl MembershipType {
    pub const fn label(self) -> &'static str {
        match self {
            MembershipType::Standard => "standard",
            MembershipType::Premium => "premium",
            MembershipType::Vip => "vip",
        }
    }
}

/// Contact and locale fields captured at intake and copied onto the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl ContactDetails {
    /// Trims every field, blanks out empty optionals, and requires a name and a plausible e-mail.
    pub fn normalized(mut self) -> Result<Self, MembershipError> {
        self.full_name = self.full_name.trim().to_string();
        self.email = self.email.trim().to_string();

        if self.full_name.is_empty() {
            return Err(MembershipError::validation("full name is required"));
        }
        if !looks_like_email(&self.email) {
            return Err(MembershipError::validation(format!(
                "'{}' is not a valid e-mail address",
                self.email
            )));
        }

        self.phone = non_blank(self.phone);
        self.city = non_blank(self.city);
        self.country = non_blank(self.country);
        Ok(self)
    }
}

/// Organizational references; each one is optional and single-valued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affiliations {
    #[serde(default)]
    pub club_id: Option<String>,
    #[serde(default)]
    pub instructor_id: Option<String>,
    #[serde(default)]
    pub technical_director_id: Option<String>,
}

/// Member account as owned by the subscription ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub contact: ContactDetails,
    pub role: Role,
    pub affiliations: Affiliations,
    pub belt_grade: BeltGrade,
    pub membership_type: MembershipType,
    /// Request this account was provisioned from, if any.
    pub source_request: Option<RequestId>,
    #[serde(skip_serializing, default)]
    pub credential_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Member {
    /// Case-insensitive substring match against the member's name and e-mail.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        self.contact.full_name.to_lowercase().contains(&needle)
            || self.contact.email.to_lowercase().contains(&needle)
    }
}

/// Account created directly by an administrator, outside the request flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMember {
    pub contact: ContactDetails,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    pub affiliations: Affiliations,
    #[serde(default)]
    pub belt_grade: BeltGrade,
    #[serde(default)]
    pub membership_type: MembershipType,
}

fn default_role() -> Role {
    Role::Member
}

impl NewMember {
    pub fn into_member(
        self,
        id: MemberId,
        created_at: DateTime<Utc>,
    ) -> Result<Member, MembershipError> {
        Ok(Member {
            id,
            contact: self.contact.normalized()?,
            role: self.role,
            affiliations: self.affiliations,
            belt_grade: self.belt_grade,
            membership_type: self.membership_type,
            source_request: None,
            credential_hash: None,
            created_at,
        })
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

pub(crate) fn looks_like_email(raw: &str) -> bool {
    let mut parts = raw.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !raw.chars().any(char::is_whitespace)
        }
        _ => false,
    }
}
