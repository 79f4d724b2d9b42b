//! In-memory adapters for every storage and collaborator contract.
//!
//! Used by the API binary until durable adapters are wired in, and by the test suites.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Datelike;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use super::collaborators::{CredentialNotice, NotificationError, NotificationSender};
use super::domain::{Member, MemberId};
use super::error::RepositoryError;
use super::invoices::{Invoice, InvoiceId, InvoiceRepository};
use super::ledger::{
    MemberRepository, PaymentSourceError, PaymentStatus, PaymentStatusSource, SubscriptionFact,
    SubscriptionRepository,
};
use super::requests::{Decision, PendingRequest, PendingRequestRepository, RequestId, RequestStatus};

fn guard<T>(store: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    store
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

#[derive(Default, Clone)]
pub struct InMemoryRequestRepository {
    records: Arc<Mutex<HashMap<RequestId, PendingRequest>>>,
}

impl PendingRequestRepository for InMemoryRequestRepository {
    fn insert(&self, request: PendingRequest) -> Result<PendingRequest, RepositoryError> {
        let mut records = guard(&self.records)?;
        if records.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        records.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<PendingRequest>, RepositoryError> {
        Ok(guard(&self.records)?.get(id).cloned())
    }

    fn list(&self, status: Option<RequestStatus>) -> Result<Vec<PendingRequest>, RepositoryError> {
        Ok(guard(&self.records)?
            .values()
            .filter(|request| status.map_or(true, |wanted| request.status == wanted))
            .cloned()
            .collect())
    }

    fn record_decision(
        &self,
        id: &RequestId,
        decision: &Decision,
    ) -> Result<PendingRequest, RepositoryError> {
        let mut records = guard(&self.records)?;
        let request = records.get_mut(id).ok_or(RepositoryError::NotFound)?;
        request
            .apply(decision)
            .map_err(|_| RepositoryError::Conflict)?;
        Ok(request.clone())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryMemberRepository {
    records: Arc<Mutex<HashMap<MemberId, Member>>>,
}

impl MemberRepository for InMemoryMemberRepository {
    fn insert(&self, member: Member) -> Result<Member, RepositoryError> {
        let mut records = guard(&self.records)?;
        let source_taken = member.source_request.as_ref().is_some_and(|source| {
            records
                .values()
                .any(|existing| existing.source_request.as_ref() == Some(source))
        });
        if source_taken || records.contains_key(&member.id) {
            return Err(RepositoryError::Conflict);
        }
        records.insert(member.id.clone(), member.clone());
        Ok(member)
    }

    fn fetch(&self, id: &MemberId) -> Result<Option<Member>, RepositoryError> {
        Ok(guard(&self.records)?.get(id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<Member>, RepositoryError> {
        let email = email.trim().to_lowercase();
        Ok(guard(&self.records)?
            .values()
            .find(|member| member.contact.email.to_lowercase() == email)
            .cloned())
    }

    fn remove(&self, id: &MemberId) -> Result<(), RepositoryError> {
        guard(&self.records)?.remove(id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<Member>, RepositoryError> {
        Ok(guard(&self.records)?.values().cloned().collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemorySubscriptionRepository {
    records: Arc<Mutex<HashMap<MemberId, SubscriptionFact>>>,
}

impl SubscriptionRepository for InMemorySubscriptionRepository {
    fn fetch(&self, member_id: &MemberId) -> Result<Option<SubscriptionFact>, RepositoryError> {
        Ok(guard(&self.records)?.get(member_id).cloned())
    }

    fn upsert(&self, fact: SubscriptionFact) -> Result<(), RepositoryError> {
        guard(&self.records)?.insert(fact.member_id.clone(), fact);
        Ok(())
    }

    fn remove(&self, member_id: &MemberId) -> Result<(), RepositoryError> {
        guard(&self.records)?.remove(member_id);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryInvoiceRepository {
    records: Arc<Mutex<Vec<Invoice>>>,
}

impl InMemoryInvoiceRepository {
    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl InvoiceRepository for InMemoryInvoiceRepository {
    fn append(&self, invoice: Invoice) -> Result<(), RepositoryError> {
        let mut records = guard(&self.records)?;
        if records
            .iter()
            .any(|existing| existing.id == invoice.id || existing.number == invoice.number)
        {
            return Err(RepositoryError::Conflict);
        }
        records.push(invoice);
        Ok(())
    }

    fn fetch(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
        Ok(guard(&self.records)?
            .iter()
            .find(|invoice| &invoice.id == id)
            .cloned())
    }

    fn for_member(&self, member_id: &MemberId) -> Result<Vec<Invoice>, RepositoryError> {
        Ok(guard(&self.records)?
            .iter()
            .filter(|invoice| &invoice.member_id == member_id)
            .cloned()
            .collect())
    }

    fn count_issued_in(&self, year: i32) -> Result<u64, RepositoryError> {
        let records = guard(&self.records)?;
        let issued = records
            .iter()
            .filter(|invoice| invoice.issued_on.year() == year)
            .count();
        Ok(u64::try_from(issued).unwrap_or(u64::MAX))
    }
}

/// Credential delivery that keeps every notice in memory instead of sending it.
#[derive(Default, Clone)]
pub struct OutboxNotificationSender {
    sent: Arc<Mutex<Vec<(String, SecretString)>>>,
}

impl OutboxNotificationSender {
    pub fn recipients(&self) -> Vec<String> {
        self.sent
            .lock()
            .map(|sent| sent.iter().map(|(email, _)| email.clone()).collect())
            .unwrap_or_default()
    }

    /// Most recent password issued to `email`.
    pub fn password_for(&self, email: &str) -> Option<SecretString> {
        let sent = self.sent.lock().ok()?;
        sent.iter()
            .rev()
            .find(|(recipient, _)| recipient == email)
            .map(|(_, password)| SecretString::from(password.expose_secret().to_string()))
    }
}

impl NotificationSender for OutboxNotificationSender {
    fn send_credentials(&self, notice: &CredentialNotice) -> Result<(), NotificationError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| NotificationError::Transport("outbox poisoned".to_string()))?;
        sent.push((
            notice.email.clone(),
            SecretString::from(notice.password.expose_secret().to_string()),
        ));
        info!(recipient = %notice.email, "credentials queued in outbox");
        Ok(())
    }
}

/// Payment source answering from a fixed table of checkout sessions.
#[derive(Default, Clone)]
pub struct StaticPaymentSource {
    sessions: Arc<Mutex<HashMap<String, PaymentStatus>>>,
}

impl StaticPaymentSource {
    pub fn insert_session(&self, session_id: impl Into<String>, status: PaymentStatus) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(session_id.into(), status);
        }
    }
}

impl PaymentStatusSource for StaticPaymentSource {
    fn get_status(&self, session_id: &str) -> Result<PaymentStatus, PaymentSourceError> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|_| PaymentSourceError::Provider("session table poisoned".to_string()))?;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| PaymentSourceError::UnknownSession(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::invoices::{InvoiceType, RenderedDocument};
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    fn invoice(id: &str, number: &str, issued_on: NaiveDate) -> Invoice {
        Invoice {
            id: InvoiceId::from(id),
            number: number.to_string(),
            member_id: MemberId::from("mbr-1"),
            amount: Decimal::from(35),
            invoice_type: InvoiceType::Membership,
            issued_on,
            created_at: Utc::now(),
            coverage: None,
            document: RenderedDocument {
                bytes: b"%PDF-1.4".to_vec(),
                filename: format!("invoice-{number}.pdf"),
                content_type: "application/pdf".to_string(),
            },
        }
    }

    #[test]
    fn invoice_store_refuses_a_reused_number() {
        let store = InMemoryInvoiceRepository::default();
        let issued = NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date");
        store
            .append(invoice("inv-1", "INV-2025-000001", issued))
            .expect("first append");

        let err = store
            .append(invoice("inv-2", "INV-2025-000001", issued))
            .expect_err("number taken");
        assert!(matches!(err, RepositoryError::Conflict));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn invoices_are_counted_per_issue_year() {
        let store = InMemoryInvoiceRepository::default();
        let day = |year, month, day| NaiveDate::from_ymd_opt(year, month, day).expect("valid date");
        store
            .append(invoice("inv-1", "INV-2025-000001", day(2025, 12, 31)))
            .expect("append");
        store
            .append(invoice("inv-2", "INV-2026-000001", day(2026, 1, 1)))
            .expect("append");

        assert_eq!(store.count_issued_in(2025).expect("count"), 1);
        assert_eq!(store.count_issued_in(2026).expect("count"), 1);
        assert_eq!(store.count_issued_in(2027).expect("count"), 0);
    }
}
