use academy::membership::invoices::PdfInvoiceRenderer;
use academy::membership::ledger::{PaymentSourceError, PaymentStatus, PaymentStatusSource};
use academy::membership::{
    Collaborators, CredentialNotice, MembershipConsole, MembershipSettings, MembershipStores,
    NotificationError, NotificationSender,
};
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Logs credential notices instead of e-mailing them. The password never reaches the log.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoggingNotificationSender;

impl NotificationSender for LoggingNotificationSender {
    fn send_credentials(&self, notice: &CredentialNotice) -> Result<(), NotificationError> {
        info!(
            recipient = %notice.email,
            full_name = %notice.full_name,
            "credential notice dispatched"
        );
        Ok(())
    }
}

/// Stand-in until a checkout provider is configured.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct OfflinePaymentSource;

impl PaymentStatusSource for OfflinePaymentSource {
    fn get_status(&self, session_id: &str) -> Result<PaymentStatus, PaymentSourceError> {
        warn!(session_id, "payment lookup attempted without a provider");
        Err(PaymentSourceError::Provider(
            "no payment provider configured".to_string(),
        ))
    }
}

pub(crate) fn build_console(settings: MembershipSettings) -> MembershipConsole {
    MembershipConsole::new(
        MembershipStores::in_memory(),
        Collaborators {
            notifier: Arc::new(LoggingNotificationSender),
            payments: Arc::new(OfflinePaymentSource),
            renderer: Arc::new(PdfInvoiceRenderer),
        },
        settings,
    )
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn deserialize_optional_date<'de, D>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.map(|value| parse_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}
