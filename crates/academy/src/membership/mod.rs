//! Membership lifecycle and billing: intake, approval, subscription facts, and invoices.

pub mod collaborators;
pub mod console;
pub mod domain;
mod error;
pub mod invoices;
pub mod ledger;
pub mod memory;
pub mod requests;
pub mod roles;
pub mod router;
mod settings;
pub mod status;

#[cfg(test)]
mod tests;

pub use collaborators::{
    call_with_timeout, CollaboratorError, CredentialNotice, NotificationError, NotificationSender,
};
pub use console::{Collaborators, MembershipConsole, MembershipStores};
pub use domain::{
    AdminId, Affiliations, BeltGrade, ContactDetails, Member, MemberId, MembershipType, NewMember,
};
pub use error::{ErrorKind, MembershipError, RepositoryError};
pub use roles::{Operation, Operator, Role};
pub use router::console_router;
pub use settings::MembershipSettings;
pub use status::{DerivedStatus, SubscriptionStatus};
