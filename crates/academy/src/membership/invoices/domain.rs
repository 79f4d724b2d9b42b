use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::membership::domain::{string_identifier, BeltGrade, MemberId, MembershipType};
use crate::membership::status::SubscriptionStatus;

string_identifier!(
    /// Identifier wrapper for issued invoices.
    InvoiceId
);

/// What an invoice (or a checkout) pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    Membership,
    Shop,
    Other,
}

impl InvoiceType {
    pub const fn label(self) -> &'static str {
        match self {
            InvoiceType::Membership => "membership",
            InvoiceType::Shop => "shop",
            InvoiceType::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "membership" => Some(InvoiceType::Membership),
            "shop" => Some(InvoiceType::Shop),
            "other" => Some(InvoiceType::Other),
            _ => None,
        }
    }
}

impl fmt::Display for InvoiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive date range a membership invoice pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoveragePeriod {
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
}

impl CoveragePeriod {
    /// The cycle ending on the current expiry, or a fresh cycle from `today` when none exists.
    pub fn for_membership(
        expiry_date: Option<NaiveDate>,
        today: NaiveDate,
        period: chrono::Duration,
    ) -> Option<Self> {
        match expiry_date {
            Some(ends_on) => ends_on
                .checked_sub_signed(period)
                .map(|starts_on| Self { starts_on, ends_on }),
            None => today.checked_add_signed(period).map(|ends_on| Self {
                starts_on: today,
                ends_on,
            }),
        }
    }
}

/// Everything the document renderer needs to lay out one invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceFields {
    pub invoice_id: InvoiceId,
    pub number: String,
    pub organization: String,
    pub issued_on: NaiveDate,
    pub member_id: MemberId,
    pub member_name: String,
    pub member_email: String,
    pub belt_grade: BeltGrade,
    pub membership_type: MembershipType,
    pub invoice_type: InvoiceType,
    pub amount: Decimal,
    pub coverage: Option<CoveragePeriod>,
    pub subscription_status: SubscriptionStatus,
}

/// Opaque document bytes plus the metadata needed to serve them.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

impl fmt::Debug for RenderedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedDocument")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// Immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub id: InvoiceId,
    pub number: String,
    pub member_id: MemberId,
    pub amount: Decimal,
    pub invoice_type: InvoiceType,
    pub issued_on: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub coverage: Option<CoveragePeriod>,
    pub document: RenderedDocument,
}

impl Invoice {
    pub fn summary(&self) -> InvoiceSummary {
        InvoiceSummary {
            invoice_id: self.id.clone(),
            number: self.number.clone(),
            member_id: self.member_id.clone(),
            amount: self.amount,
            invoice_type: self.invoice_type,
            issued_on: self.issued_on,
            created_at: self.created_at,
            coverage: self.coverage,
            filename: self.document.filename.clone(),
            size_bytes: self.document.bytes.len(),
        }
    }
}

/// Invoice metadata without the document payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceSummary {
    pub invoice_id: InvoiceId,
    pub number: String,
    pub member_id: MemberId,
    pub amount: Decimal,
    pub invoice_type: InvoiceType,
    pub issued_on: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub coverage: Option<CoveragePeriod>,
    pub filename: String,
    pub size_bytes: usize,
}
