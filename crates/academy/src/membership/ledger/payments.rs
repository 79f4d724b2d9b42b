//! Payment confirmation flowing from the external provider into the ledger.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::service::SubscriptionLedger;
use crate::membership::collaborators::call_with_timeout;
use crate::membership::domain::MemberId;
use crate::membership::error::MembershipError;
use crate::membership::invoices::InvoiceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl PaymentState {
    pub const fn settles(self) -> bool {
        matches!(self, PaymentState::Paid | PaymentState::NoPaymentRequired)
    }
}

/// Checkout session state as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub amount_total: Decimal,
    pub payment_status: PaymentState,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentSourceError {
    #[error("unknown checkout session {0}")]
    UnknownSession(String),
    #[error("payment provider error: {0}")]
    Provider(String),
}

/// Read-only view onto the payment provider.
pub trait PaymentStatusSource: Send + Sync {
    fn get_status(&self, session_id: &str) -> Result<PaymentStatus, PaymentSourceError>;
}

/// Notice that a checkout finished for a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub session_id: String,
    pub member_id: MemberId,
    pub kind: InvoiceType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Reconciliation {
    Recorded {
        member_id: MemberId,
        expiry_date: NaiveDate,
        amount_total: Decimal,
    },
    NotPaid {
        payment_status: PaymentState,
    },
    Ignored {
        kind: InvoiceType,
    },
}

/// Turns settled membership checkouts into ledger payments.
pub struct PaymentReconciler {
    ledger: Arc<SubscriptionLedger>,
    source: Arc<dyn PaymentStatusSource>,
    timeout: Duration,
    period: chrono::Duration,
}

impl PaymentReconciler {
    pub fn new(
        ledger: Arc<SubscriptionLedger>,
        source: Arc<dyn PaymentStatusSource>,
        timeout: Duration,
        period: chrono::Duration,
    ) -> Self {
        Self {
            ledger,
            source,
            timeout,
            period,
        }
    }

    pub fn reconcile(
        &self,
        confirmation: &PaymentConfirmation,
        today: NaiveDate,
    ) -> Result<Reconciliation, MembershipError> {
        if confirmation.kind != InvoiceType::Membership {
            debug!(session_id = %confirmation.session_id, kind = %confirmation.kind, "non-membership payment ignored");
            return Ok(Reconciliation::Ignored {
                kind: confirmation.kind,
            });
        }

        let session_id = confirmation.session_id.trim().to_string();
        if session_id.is_empty() {
            return Err(MembershipError::validation("payment session id is required"));
        }
        self.ledger.member(&confirmation.member_id)?;

        let source = Arc::clone(&self.source);
        let lookup = session_id.clone();
        let status = call_with_timeout("payment status source", self.timeout, move || {
            source.get_status(&lookup)
        })?;

        if !status.payment_status.settles() {
            info!(session_id = %session_id, member_id = %confirmation.member_id, "checkout not paid yet");
            return Ok(Reconciliation::NotPaid {
                payment_status: status.payment_status,
            });
        }

        let expiry_date = today
            .checked_add_signed(self.period)
            .ok_or_else(|| MembershipError::validation("membership period overflows the calendar"))?;
        self.ledger
            .record_payment(&confirmation.member_id, expiry_date)?;

        Ok(Reconciliation::Recorded {
            member_id: confirmation.member_id.clone(),
            expiry_date,
            amount_total: status.amount_total,
        })
    }
}
