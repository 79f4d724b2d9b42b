use axum::http::StatusCode;

use super::collaborators::CollaboratorError;
use super::domain::MemberId;
use super::invoices::InvoiceId;
use super::requests::credentials::CredentialError;
use super::requests::{RequestId, RequestStatus};
use super::roles::{Operation, Role};

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Coarse classification used by callers to pick a user-facing message or status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidStateTransition,
    AlreadyProcessed,
    Validation,
    Forbidden,
    CollaboratorUnavailable,
    Internal,
}

impl ErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidStateTransition => "invalid_state_transition",
            ErrorKind::AlreadyProcessed => "already_processed",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::CollaboratorUnavailable => "collaborator_unavailable",
            ErrorKind::Internal => "internal",
        }
    }

    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidStateTransition | ErrorKind::AlreadyProcessed => {
                StatusCode::CONFLICT
            }
            ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::CollaboratorUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error raised by every membership command.
#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    #[error("membership request {0} not found")]
    RequestNotFound(RequestId),
    #[error("member {0} not found")]
    MemberNotFound(MemberId),
    #[error("invoice {0} not found")]
    InvoiceNotFound(InvoiceId),
    #[error("a request cannot move from {from} to {to}")]
    InvalidStateTransition {
        from: RequestStatus,
        to: RequestStatus,
    },
    #[error("request {request_id} was already processed by another administrator ({status})")]
    AlreadyProcessed {
        request_id: RequestId,
        status: RequestStatus,
    },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("role {role} is not permitted to {operation}")]
    Forbidden { role: Role, operation: Operation },
    #[error(transparent)]
    CollaboratorUnavailable(#[from] CollaboratorError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl MembershipError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MembershipError::RequestNotFound(_)
            | MembershipError::MemberNotFound(_)
            | MembershipError::InvoiceNotFound(_) => ErrorKind::NotFound,
            MembershipError::InvalidStateTransition { .. } => ErrorKind::InvalidStateTransition,
            MembershipError::AlreadyProcessed { .. } => ErrorKind::AlreadyProcessed,
            MembershipError::Validation(_) => ErrorKind::Validation,
            MembershipError::Forbidden { .. } => ErrorKind::Forbidden,
            MembershipError::CollaboratorUnavailable(_) => ErrorKind::CollaboratorUnavailable,
            MembershipError::Credential(_) | MembershipError::Repository(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
