use super::domain::{Invoice, InvoiceId};
use crate::membership::domain::MemberId;
use crate::membership::error::RepositoryError;

/// Append-only invoice storage. There is no update or delete.
pub trait InvoiceRepository: Send + Sync {
    /// Refuses with [`RepositoryError::Conflict`] when the id or the number already exists.
    fn append(&self, invoice: Invoice) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError>;
    fn for_member(&self, member_id: &MemberId) -> Result<Vec<Invoice>, RepositoryError>;
    /// Number of invoices whose issue date falls in `year`.
    fn count_issued_in(&self, year: i32) -> Result<u64, RepositoryError>;
}
