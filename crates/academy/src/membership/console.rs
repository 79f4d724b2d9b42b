//! Operator-facing command surface over the four membership components.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::info;

use super::collaborators::NotificationSender;
use super::domain::{Member, MemberId, NewMember};
use super::error::MembershipError;
use super::invoices::{
    DocumentRenderer, Invoice, InvoiceEngine, InvoiceId, InvoiceRepository, InvoiceSummary,
    InvoiceType, RenderedDocument,
};
use super::ledger::{
    MemberRepository, MemberWithStatus, OverviewQuery, PaymentConfirmation, PaymentReconciler,
    PaymentStatusSource, Reconciliation, SubscriptionLedger, SubscriptionOverview,
    SubscriptionRepository,
};
use super::memory::{
    InMemoryInvoiceRepository, InMemoryMemberRepository, InMemoryRequestRepository,
    InMemorySubscriptionRepository,
};
use super::requests::{
    ApprovalOutcome, MembershipApplication, PendingRequest, PendingRequestRepository,
    PendingRequestService, RequestId, RequestStatus,
};
use super::roles::{Operation, Operator};
use super::settings::MembershipSettings;

/// Storage adapters backing the console.
#[derive(Clone)]
pub struct MembershipStores {
    pub requests: Arc<dyn PendingRequestRepository>,
    pub members: Arc<dyn MemberRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
}

impl MembershipStores {
    pub fn in_memory() -> Self {
        Self {
            requests: Arc::new(InMemoryRequestRepository::default()),
            members: Arc::new(InMemoryMemberRepository::default()),
            subscriptions: Arc::new(InMemorySubscriptionRepository::default()),
            invoices: Arc::new(InMemoryInvoiceRepository::default()),
        }
    }
}

/// External services the console calls out to.
#[derive(Clone)]
pub struct Collaborators {
    pub notifier: Arc<dyn NotificationSender>,
    pub payments: Arc<dyn PaymentStatusSource>,
    pub renderer: Arc<dyn DocumentRenderer>,
}

pub struct MembershipConsole {
    requests: PendingRequestService,
    ledger: Arc<SubscriptionLedger>,
    invoices: InvoiceEngine,
    payments: PaymentReconciler,
}

impl MembershipConsole {
    pub fn new(
        stores: MembershipStores,
        collaborators: Collaborators,
        settings: MembershipSettings,
    ) -> Self {
        let ledger = Arc::new(SubscriptionLedger::new(stores.members, stores.subscriptions));
        let requests = PendingRequestService::new(
            stores.requests,
            Arc::clone(&ledger),
            collaborators.notifier,
            &settings,
        );
        let invoices = InvoiceEngine::new(
            stores.invoices,
            Arc::clone(&ledger),
            collaborators.renderer,
            &settings,
        );
        let payments = PaymentReconciler::new(
            Arc::clone(&ledger),
            collaborators.payments,
            settings.collaborator_timeout,
            settings.membership_period(),
        );

        Self {
            requests,
            ledger,
            invoices,
            payments,
        }
    }

    /// Public intake; no operator is involved.
    pub fn submit_request(
        &self,
        application: MembershipApplication,
    ) -> Result<PendingRequest, MembershipError> {
        self.requests.submit(application)
    }

    pub fn list_pending_requests(
        &self,
        operator: &Operator,
        status: Option<RequestStatus>,
    ) -> Result<Vec<PendingRequest>, MembershipError> {
        operator.authorize(Operation::ListPendingRequests)?;
        self.requests.list(status)
    }

    pub fn approve_request(
        &self,
        operator: &Operator,
        request_id: &RequestId,
    ) -> Result<ApprovalOutcome, MembershipError> {
        operator.authorize(Operation::ApproveRequest)?;
        self.requests.approve(request_id, &operator.id)
    }

    pub fn reject_request(
        &self,
        operator: &Operator,
        request_id: &RequestId,
        reason: Option<String>,
    ) -> Result<PendingRequest, MembershipError> {
        operator.authorize(Operation::RejectRequest)?;
        self.requests.reject(request_id, &operator.id, reason)
    }

    pub fn create_member(
        &self,
        operator: &Operator,
        draft: NewMember,
    ) -> Result<Member, MembershipError> {
        operator.authorize(Operation::CreateMember)?;
        let member = draft.into_member(MemberId::generate(), Utc::now())?;
        let member = self.ledger.enroll(member)?;
        info!(member_id = %member.id, admin_id = %operator.id, "member created directly");
        Ok(member)
    }

    pub fn subscription_overview(
        &self,
        operator: &Operator,
        query: &OverviewQuery,
        today: NaiveDate,
    ) -> Result<SubscriptionOverview, MembershipError> {
        operator.authorize(Operation::ViewSubscriptions)?;
        self.ledger.list_with_status(query, today)
    }

    pub fn member_subscription(
        &self,
        operator: &Operator,
        member_id: &MemberId,
        today: NaiveDate,
    ) -> Result<MemberWithStatus, MembershipError> {
        operator.authorize(Operation::ViewSubscriptions)?;
        self.ledger.member_with_status(member_id, today)
    }

    /// Toggles the operator override and returns the freshly derived view.
    pub fn set_paid_flag(
        &self,
        operator: &Operator,
        member_id: &MemberId,
        has_paid_flag: bool,
        today: NaiveDate,
    ) -> Result<MemberWithStatus, MembershipError> {
        operator.authorize(Operation::SetPaidFlag)?;
        self.ledger.set_paid_flag(member_id, has_paid_flag)?;
        self.ledger.member_with_status(member_id, today)
    }

    /// Manual renewal: sets the expiry date directly.
    pub fn renew_membership(
        &self,
        operator: &Operator,
        member_id: &MemberId,
        expiry_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<MemberWithStatus, MembershipError> {
        operator.authorize(Operation::RecordPayment)?;
        self.ledger.record_payment(member_id, expiry_date)?;
        self.ledger.member_with_status(member_id, today)
    }

    pub fn reconcile_payment(
        &self,
        operator: &Operator,
        confirmation: &PaymentConfirmation,
        today: NaiveDate,
    ) -> Result<Reconciliation, MembershipError> {
        operator.authorize(Operation::RecordPayment)?;
        self.payments.reconcile(confirmation, today)
    }

    pub fn generate_invoice(
        &self,
        operator: &Operator,
        member_id: &MemberId,
        amount: Option<Decimal>,
        invoice_type: InvoiceType,
        today: NaiveDate,
    ) -> Result<Invoice, MembershipError> {
        operator.authorize(Operation::GenerateInvoice)?;
        self.invoices.generate(member_id, amount, invoice_type, today)
    }

    pub fn fetch_invoice_document(
        &self,
        operator: &Operator,
        invoice_id: &InvoiceId,
    ) -> Result<RenderedDocument, MembershipError> {
        operator.authorize(Operation::FetchInvoiceDocument)?;
        self.invoices.fetch_document(invoice_id)
    }

    pub fn invoices_for_member(
        &self,
        operator: &Operator,
        member_id: &MemberId,
    ) -> Result<Vec<InvoiceSummary>, MembershipError> {
        operator.authorize(Operation::FetchInvoiceDocument)?;
        self.invoices.invoices_for(member_id)
    }
}
