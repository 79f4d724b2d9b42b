use super::domain::{Decision, PendingRequest, RequestId, RequestStatus};
use crate::membership::error::RepositoryError;

/// Storage abstraction for membership requests. Requests are never deleted.
pub trait PendingRequestRepository: Send + Sync {
    fn insert(&self, request: PendingRequest) -> Result<PendingRequest, RepositoryError>;
    fn fetch(&self, id: &RequestId) -> Result<Option<PendingRequest>, RepositoryError>;
    fn list(&self, status: Option<RequestStatus>) -> Result<Vec<PendingRequest>, RepositoryError>;
    /// Persists a terminal decision as a single check-and-write.
    ///
    /// Must return [`RepositoryError::Conflict`] when the stored request is no longer pending and
    /// [`RepositoryError::NotFound`] when it does not exist.
    fn record_decision(
        &self,
        id: &RequestId,
        decision: &Decision,
    ) -> Result<PendingRequest, RepositoryError>;
}
