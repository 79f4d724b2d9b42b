//! Pending membership requests and the approve/reject state machine.

pub mod credentials;
pub mod domain;
pub mod repository;
pub mod service;

pub use domain::{Decision, MembershipApplication, PendingRequest, RequestId, RequestStatus};
pub use repository::PendingRequestRepository;
pub use service::{ApprovalOutcome, ApprovalWarning, PendingRequestService};
