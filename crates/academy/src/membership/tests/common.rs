use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use chrono::{NaiveDate, Utc};
use serde_json::Value;

use crate::membership::collaborators::{CredentialNotice, NotificationError, NotificationSender};
use crate::membership::console::{Collaborators, MembershipConsole, MembershipStores};
use crate::membership::domain::{Affiliations, ContactDetails, Member, MemberId};
use crate::membership::error::RepositoryError;
use crate::membership::invoices::{
    DocumentRenderer, InvoiceFields, PdfInvoiceRenderer, RenderError, RenderedDocument,
};
use crate::membership::ledger::{
    PaymentSourceError, PaymentStatus, PaymentStatusSource, SubscriptionLedger,
};
use crate::membership::memory::{
    InMemoryInvoiceRepository, InMemoryMemberRepository, InMemoryRequestRepository,
    InMemorySubscriptionRepository, OutboxNotificationSender, StaticPaymentSource,
};
use crate::membership::requests::{
    Decision, MembershipApplication, PendingRequest, PendingRequestRepository, RequestId,
    RequestStatus,
};
use crate::membership::roles::{Operator, Role};
use crate::membership::router::{OPERATOR_ID_HEADER, OPERATOR_ROLE_HEADER};
use crate::membership::settings::MembershipSettings;

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn test_settings() -> MembershipSettings {
    MembershipSettings {
        collaborator_timeout: Duration::from_millis(500),
        ..MembershipSettings::default()
    }
}

pub(super) fn admin() -> Operator {
    Operator::new("admin-a", Role::Admin)
}

pub(super) fn contact(name: &str, email: &str) -> ContactDetails {
    ContactDetails {
        full_name: name.to_string(),
        email: email.to_string(),
        phone: Some("+33 6 12 34 56 78".to_string()),
        city: Some("Lyon".to_string()),
        country: Some("France".to_string()),
    }
}

pub(super) fn affiliations() -> Affiliations {
    Affiliations {
        club_id: Some("club-lyon-7".to_string()),
        instructor_id: Some("inst-42".to_string()),
        technical_director_id: None,
    }
}

pub(super) fn application(name: &str, email: &str) -> MembershipApplication {
    MembershipApplication {
        contact: contact(name, email),
        affiliations: affiliations(),
        belt_grade: None,
        membership_type: None,
        motivations: vec![
            "  Self-defence for work ".to_string(),
            "   ".to_string(),
            "Train with my club".to_string(),
        ],
    }
}

pub(super) fn member(name: &str, email: &str) -> Member {
    Member {
        id: MemberId::generate(),
        contact: contact(name, email),
        role: Role::Member,
        affiliations: Affiliations::default(),
        belt_grade: Default::default(),
        membership_type: Default::default(),
        source_request: None,
        credential_hash: None,
        created_at: Utc::now(),
    }
}

pub(super) fn ledger() -> (Arc<SubscriptionLedger>, InMemoryMemberRepository) {
    let members = InMemoryMemberRepository::default();
    let ledger = SubscriptionLedger::new(
        Arc::new(members.clone()),
        Arc::new(InMemorySubscriptionRepository::default()),
    );
    (Arc::new(ledger), members)
}

#[derive(Default)]
pub(super) struct Overrides {
    pub requests: Option<Arc<dyn PendingRequestRepository>>,
    pub notifier: Option<Arc<dyn NotificationSender>>,
    pub renderer: Option<Arc<dyn DocumentRenderer>>,
    pub payments: Option<Arc<dyn PaymentStatusSource>>,
}

/// Console wired to in-memory stores, keeping handles on every store for assertions.
pub(super) struct Fixture {
    pub console: Arc<MembershipConsole>,
    pub requests: InMemoryRequestRepository,
    pub members: InMemoryMemberRepository,
    pub invoices: InMemoryInvoiceRepository,
    pub outbox: OutboxNotificationSender,
    pub payments: StaticPaymentSource,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with(Overrides::default())
    }

    pub fn with(overrides: Overrides) -> Self {
        let requests = InMemoryRequestRepository::default();
        let members = InMemoryMemberRepository::default();
        let invoices = InMemoryInvoiceRepository::default();
        let outbox = OutboxNotificationSender::default();
        let payments = StaticPaymentSource::default();

        let stores = MembershipStores {
            requests: overrides
                .requests
                .unwrap_or_else(|| Arc::new(requests.clone()) as Arc<dyn PendingRequestRepository>),
            members: Arc::new(members.clone()),
            subscriptions: Arc::new(InMemorySubscriptionRepository::default()),
            invoices: Arc::new(invoices.clone()),
        };
        let collaborators = Collaborators {
            notifier: overrides
                .notifier
                .unwrap_or_else(|| Arc::new(outbox.clone()) as Arc<dyn NotificationSender>),
            payments: overrides
                .payments
                .unwrap_or_else(|| Arc::new(payments.clone()) as Arc<dyn PaymentStatusSource>),
            renderer: overrides
                .renderer
                .unwrap_or_else(|| Arc::new(PdfInvoiceRenderer) as Arc<dyn DocumentRenderer>),
        };

        Self {
            console: Arc::new(MembershipConsole::new(stores, collaborators, test_settings())),
            requests,
            members,
            invoices,
            outbox,
            payments,
        }
    }

    pub fn submit(&self, name: &str, email: &str) -> PendingRequest {
        self.console
            .submit_request(application(name, email))
            .expect("submission succeeds")
    }

    /// Submits and approves a request, returning the provisioned member.
    pub fn approved_member(&self, name: &str, email: &str) -> MemberId {
        let request = self.submit(name, email);
        self.console
            .approve_request(&admin(), &request.id)
            .expect("approval succeeds")
            .member_id
    }
}

pub(super) struct FailingNotifier;

impl NotificationSender for FailingNotifier {
    fn send_credentials(&self, _notice: &CredentialNotice) -> Result<(), NotificationError> {
        Err(NotificationError::Transport(
            "smtp relay refused the connection".to_string(),
        ))
    }
}

pub(super) struct StalledNotifier(pub Duration);

impl NotificationSender for StalledNotifier {
    fn send_credentials(&self, _notice: &CredentialNotice) -> Result<(), NotificationError> {
        thread::sleep(self.0);
        Ok(())
    }
}

pub(super) struct FailingRenderer;

impl DocumentRenderer for FailingRenderer {
    fn render(&self, _fields: &InvoiceFields) -> Result<RenderedDocument, RenderError> {
        Err(RenderError::Backend("font cache unavailable".to_string()))
    }
}

pub(super) struct StalledRenderer(pub Duration);

impl DocumentRenderer for StalledRenderer {
    fn render(&self, fields: &InvoiceFields) -> Result<RenderedDocument, RenderError> {
        thread::sleep(self.0);
        PdfInvoiceRenderer.render(fields)
    }
}

pub(super) struct EmptyRenderer;

impl DocumentRenderer for EmptyRenderer {
    fn render(&self, fields: &InvoiceFields) -> Result<RenderedDocument, RenderError> {
        Ok(RenderedDocument {
            bytes: Vec::new(),
            filename: format!("invoice-{}.pdf", fields.number),
            content_type: mime::APPLICATION_PDF.to_string(),
        })
    }
}

/// Fails the first `failures` renders, then lays out a real PDF.
pub(super) struct FlakyRenderer {
    failures: AtomicUsize,
}

impl FlakyRenderer {
    pub fn failing(times: usize) -> Self {
        Self {
            failures: AtomicUsize::new(times),
        }
    }
}

impl DocumentRenderer for FlakyRenderer {
    fn render(&self, fields: &InvoiceFields) -> Result<RenderedDocument, RenderError> {
        let remaining = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        if remaining.is_ok() {
            return Err(RenderError::Backend("template store offline".to_string()));
        }
        PdfInvoiceRenderer.render(fields)
    }
}

/// In-process renderer that remembers which thread laid the document out.
#[derive(Default)]
pub(super) struct ThreadRecordingRenderer {
    pub threads: Mutex<Vec<ThreadId>>,
}

impl DocumentRenderer for ThreadRecordingRenderer {
    fn render(&self, fields: &InvoiceFields) -> Result<RenderedDocument, RenderError> {
        self.threads
            .lock()
            .expect("thread log")
            .push(thread::current().id());
        PdfInvoiceRenderer.render(fields)
    }

    fn in_process(&self) -> bool {
        true
    }
}

/// Returns a PDF under a fixed, caller-chosen filename.
pub(super) struct NamedRenderer(pub &'static str);

impl DocumentRenderer for NamedRenderer {
    fn render(&self, fields: &InvoiceFields) -> Result<RenderedDocument, RenderError> {
        let mut document = PdfInvoiceRenderer.render(fields)?;
        document.filename = self.0.to_string();
        Ok(document)
    }
}

pub(super) struct StalledPaymentSource(pub Duration);

impl PaymentStatusSource for StalledPaymentSource {
    fn get_status(&self, session_id: &str) -> Result<PaymentStatus, PaymentSourceError> {
        thread::sleep(self.0);
        Err(PaymentSourceError::UnknownSession(session_id.to_string()))
    }
}

/// Request store whose decision writes always fail.
#[derive(Default)]
pub(super) struct DecisionOutage {
    pub inner: InMemoryRequestRepository,
}

impl PendingRequestRepository for DecisionOutage {
    fn insert(&self, request: PendingRequest) -> Result<PendingRequest, RepositoryError> {
        self.inner.insert(request)
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<PendingRequest>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn list(&self, status: Option<RequestStatus>) -> Result<Vec<PendingRequest>, RepositoryError> {
        self.inner.list(status)
    }

    fn record_decision(
        &self,
        _id: &RequestId,
        _decision: &Decision,
    ) -> Result<PendingRequest, RepositoryError> {
        Err(RepositoryError::Unavailable("primary is read-only".to_string()))
    }
}

pub(super) fn api_request(
    method: Method,
    uri: &str,
    role: Option<Role>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(role) = role {
        builder = builder
            .header(OPERATOR_ID_HEADER, "admin-http")
            .header(OPERATOR_ROLE_HEADER, role.label());
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json).expect("serializable body"))
        }
        None => Body::empty(),
    };
    builder.body(body).expect("request builds")
}

pub(super) async fn read_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable")
        .to_vec()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    serde_json::from_slice(&read_body(response).await).expect("json body")
}
