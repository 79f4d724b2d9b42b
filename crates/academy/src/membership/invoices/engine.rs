use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::info;

use super::domain::{
    CoveragePeriod, Invoice, InvoiceFields, InvoiceId, InvoiceSummary, InvoiceType,
    RenderedDocument,
};
use super::renderer::{DocumentRenderer, RenderError};
use super::repository::InvoiceRepository;
use crate::membership::collaborators::{call_with_timeout, CollaboratorError};
use crate::membership::domain::MemberId;
use crate::membership::error::MembershipError;
use crate::membership::ledger::SubscriptionLedger;
use crate::membership::settings::MembershipSettings;

const RENDERER: &str = "document renderer";

/// Issues invoices from ledger state. Nothing is stored unless the document rendered.
///
/// Numbers are `INV-<year>-<seq>`, counted per issue year from the repository, so a failed
/// render never consumes one.
pub struct InvoiceEngine {
    invoices: Arc<dyn InvoiceRepository>,
    ledger: Arc<SubscriptionLedger>,
    renderer: Arc<dyn DocumentRenderer>,
    settings: MembershipSettings,
    issuing: Mutex<()>,
}

impl InvoiceEngine {
    pub fn new(
        invoices: Arc<dyn InvoiceRepository>,
        ledger: Arc<SubscriptionLedger>,
        renderer: Arc<dyn DocumentRenderer>,
        settings: &MembershipSettings,
    ) -> Self {
        Self {
            invoices,
            ledger,
            renderer,
            settings: settings.clone(),
            issuing: Mutex::new(()),
        }
    }

    /// Generates and stores an invoice for `member_id`.
    ///
    /// Membership invoices default to the configured fee; other kinds need an explicit amount.
    pub fn generate(
        &self,
        member_id: &MemberId,
        amount: Option<Decimal>,
        invoice_type: InvoiceType,
        today: NaiveDate,
    ) -> Result<Invoice, MembershipError> {
        let amount = match (amount, invoice_type) {
            (Some(amount), _) => amount,
            (None, InvoiceType::Membership) => self.settings.membership_fee,
            (None, other) => {
                return Err(MembershipError::validation(format!(
                    "an amount is required for {other} invoices"
                )))
            }
        };
        if amount <= Decimal::ZERO {
            return Err(MembershipError::validation(format!(
                "invoice amount must be positive, got {amount}"
            )));
        }

        let member = self.ledger.member(member_id)?;
        let fact = self.ledger.fact(member_id)?;
        let coverage = match invoice_type {
            InvoiceType::Membership => Some(
                CoveragePeriod::for_membership(
                    fact.expiry_date,
                    today,
                    self.settings.membership_period(),
                )
                .ok_or_else(|| {
                    MembershipError::validation("coverage period overflows the calendar")
                })?,
            ),
            InvoiceType::Shop | InvoiceType::Other => None,
        };

        let _issuing = self.issuing.lock().unwrap_or_else(PoisonError::into_inner);
        let sequence = self.invoices.count_issued_in(today.year())? + 1;
        let fields = InvoiceFields {
            invoice_id: InvoiceId::generate(),
            number: format!("INV-{}-{sequence:06}", today.year()),
            organization: self.settings.organization_name.clone(),
            issued_on: today,
            member_id: member.id.clone(),
            member_name: member.contact.full_name.clone(),
            member_email: member.contact.email.clone(),
            belt_grade: member.belt_grade,
            membership_type: member.membership_type,
            invoice_type,
            amount,
            coverage,
            subscription_status: fact.derive(today).status,
        };

        let document = self.render(&fields)?;
        if document.bytes.is_empty() {
            return Err(CollaboratorError::Failed {
                collaborator: RENDERER,
                message: "returned an empty document".to_string(),
            }
            .into());
        }

        let invoice = Invoice {
            id: fields.invoice_id,
            number: fields.number,
            member_id: fields.member_id,
            amount,
            invoice_type,
            issued_on: today,
            created_at: Utc::now(),
            coverage,
            document,
        };
        self.invoices.append(invoice.clone())?;

        info!(
            invoice_id = %invoice.id,
            number = %invoice.number,
            member_id = %invoice.member_id,
            amount = %invoice.amount,
            invoice_type = %invoice.invoice_type,
            "invoice generated"
        );
        Ok(invoice)
    }

    pub fn fetch_document(&self, invoice_id: &InvoiceId) -> Result<RenderedDocument, MembershipError> {
        self.invoices
            .fetch(invoice_id)?
            .map(|invoice| invoice.document)
            .ok_or_else(|| MembershipError::InvoiceNotFound(invoice_id.clone()))
    }

    /// Invoices issued to a member, newest first.
    pub fn invoices_for(&self, member_id: &MemberId) -> Result<Vec<InvoiceSummary>, MembershipError> {
        self.ledger.member(member_id)?;
        let mut invoices = self.invoices.for_member(member_id)?;
        invoices.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| right.number.cmp(&left.number))
        });
        Ok(invoices.iter().map(Invoice::summary).collect())
    }

    fn render(&self, fields: &InvoiceFields) -> Result<RenderedDocument, CollaboratorError> {
        let failed = |err: RenderError| CollaboratorError::Failed {
            collaborator: RENDERER,
            message: err.to_string(),
        };
        if self.renderer.in_process() {
            return self.renderer.render(fields).map_err(failed);
        }

        let renderer = Arc::clone(&self.renderer);
        let fields = fields.clone();
        call_with_timeout(RENDERER, self.settings.collaborator_timeout, move || {
            renderer.render(&fields)
        })
    }
}
