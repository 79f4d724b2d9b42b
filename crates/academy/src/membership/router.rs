use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::console::MembershipConsole;
use super::domain::{MemberId, NewMember};
use super::error::{ErrorKind, MembershipError};
use super::invoices::{InvoiceId, InvoiceType};
use super::ledger::{OverviewQuery, PaymentConfirmation};
use super::requests::{ApprovalWarning, MembershipApplication, RequestId, RequestStatus};
use super::roles::{Operator, Role};
use super::status::{self, SubscriptionStatus};

pub const OPERATOR_ID_HEADER: &str = "x-operator-id";
pub const OPERATOR_ROLE_HEADER: &str = "x-operator-role";

/// Router builder exposing the membership console over HTTP.
pub fn console_router(console: Arc<MembershipConsole>) -> Router {
    Router::new()
        .route(
            "/api/v1/requests",
            post(submit_handler).get(list_requests_handler),
        )
        .route("/api/v1/requests/:request_id/approve", post(approve_handler))
        .route("/api/v1/requests/:request_id/reject", post(reject_handler))
        .route("/api/v1/members", post(create_member_handler))
        .route("/api/v1/subscriptions", get(overview_handler))
        .route(
            "/api/v1/members/:member_id/subscription",
            get(member_subscription_handler).put(set_paid_flag_handler),
        )
        .route("/api/v1/members/:member_id/renewal", post(renewal_handler))
        .route("/api/v1/members/:member_id/invoices", get(member_invoices_handler))
        .route("/api/v1/invoices", post(generate_invoice_handler))
        .route("/api/v1/invoices/:invoice_id/document", get(document_handler))
        .route("/api/v1/payments/reconcile", post(reconcile_handler))
        .with_state(console)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RequestListParams {
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OverviewParams {
    search: Option<String>,
    status: Option<String>,
    today: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TodayParams {
    today: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RejectBody {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaidFlagBody {
    has_paid_flag: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RenewalBody {
    expiry_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InvoiceRequest {
    member_id: MemberId,
    #[serde(default)]
    amount: Option<Decimal>,
    #[serde(default = "membership_invoice")]
    invoice_type: InvoiceType,
    #[serde(default)]
    today: Option<String>,
}

fn membership_invoice() -> InvoiceType {
    InvoiceType::Membership
}

#[derive(Debug, Serialize)]
struct ApprovalView {
    member_id: MemberId,
    request_id: RequestId,
    status: RequestStatus,
    warnings: Vec<ApprovalWarning>,
}

pub(crate) async fn submit_handler(
    State(console): State<Arc<MembershipConsole>>,
    Json(application): Json<MembershipApplication>,
) -> Response {
    match console.submit_request(application) {
        Ok(request) => (StatusCode::ACCEPTED, Json(request)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn list_requests_handler(
    State(console): State<Arc<MembershipConsole>>,
    headers: HeaderMap,
    Query(params): Query<RequestListParams>,
) -> Response {
    let operator = match operator_from(&headers) {
        Ok(operator) => operator,
        Err(response) => return response,
    };
    let status = match params.status.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
        None => None,
        Some(raw) => match RequestStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return error_response(&MembershipError::validation(format!(
                    "unknown request status '{raw}'"
                )))
            }
        },
    };

    match console.list_pending_requests(&operator, status) {
        Ok(requests) => (StatusCode::OK, Json(requests)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn approve_handler(
    State(console): State<Arc<MembershipConsole>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Response {
    let operator = match operator_from(&headers) {
        Ok(operator) => operator,
        Err(response) => return response,
    };

    match console.approve_request(&operator, &RequestId(request_id)) {
        Ok(outcome) => {
            let view = ApprovalView {
                member_id: outcome.member_id,
                request_id: outcome.request.id,
                status: outcome.request.status,
                warnings: outcome.warnings,
            };
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn reject_handler(
    State(console): State<Arc<MembershipConsole>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
    body: Option<Json<RejectBody>>,
) -> Response {
    let operator = match operator_from(&headers) {
        Ok(operator) => operator,
        Err(response) => return response,
    };
    let reason = body.and_then(|Json(body)| body.reason);

    match console.reject_request(&operator, &RequestId(request_id), reason) {
        Ok(request) => (StatusCode::OK, Json(request)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn create_member_handler(
    State(console): State<Arc<MembershipConsole>>,
    headers: HeaderMap,
    Json(draft): Json<NewMember>,
) -> Response {
    let operator = match operator_from(&headers) {
        Ok(operator) => operator,
        Err(response) => return response,
    };

    match console.create_member(&operator, draft) {
        Ok(member) => (StatusCode::CREATED, Json(member)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn overview_handler(
    State(console): State<Arc<MembershipConsole>>,
    headers: HeaderMap,
    Query(params): Query<OverviewParams>,
) -> Response {
    let operator = match operator_from(&headers) {
        Ok(operator) => operator,
        Err(response) => return response,
    };
    let query = match overview_query(&params) {
        Ok(query) => query,
        Err(err) => return error_response(&err),
    };

    let result = resolve_today(params.today.as_deref())
        .and_then(|today| console.subscription_overview(&operator, &query, today));
    match result {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn member_subscription_handler(
    State(console): State<Arc<MembershipConsole>>,
    headers: HeaderMap,
    Path(member_id): Path<String>,
    Query(params): Query<TodayParams>,
) -> Response {
    let operator = match operator_from(&headers) {
        Ok(operator) => operator,
        Err(response) => return response,
    };

    let result = resolve_today(params.today.as_deref())
        .and_then(|today| console.member_subscription(&operator, &MemberId(member_id), today));
    match result {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn set_paid_flag_handler(
    State(console): State<Arc<MembershipConsole>>,
    headers: HeaderMap,
    Path(member_id): Path<String>,
    Query(params): Query<TodayParams>,
    Json(body): Json<PaidFlagBody>,
) -> Response {
    let operator = match operator_from(&headers) {
        Ok(operator) => operator,
        Err(response) => return response,
    };

    let result = resolve_today(params.today.as_deref()).and_then(|today| {
        console.set_paid_flag(&operator, &MemberId(member_id), body.has_paid_flag, today)
    });
    match result {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn renewal_handler(
    State(console): State<Arc<MembershipConsole>>,
    headers: HeaderMap,
    Path(member_id): Path<String>,
    Query(params): Query<TodayParams>,
    Json(body): Json<RenewalBody>,
) -> Response {
    let operator = match operator_from(&headers) {
        Ok(operator) => operator,
        Err(response) => return response,
    };

    let result = resolve_today(params.today.as_deref()).and_then(|today| {
        console.renew_membership(&operator, &MemberId(member_id), body.expiry_date, today)
    });
    match result {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn generate_invoice_handler(
    State(console): State<Arc<MembershipConsole>>,
    headers: HeaderMap,
    Json(request): Json<InvoiceRequest>,
) -> Response {
    let operator = match operator_from(&headers) {
        Ok(operator) => operator,
        Err(response) => return response,
    };

    let result = resolve_today(request.today.as_deref()).and_then(|today| {
        console.generate_invoice(
            &operator,
            &request.member_id,
            request.amount,
            request.invoice_type,
            today,
        )
    });
    match result {
        Ok(invoice) => (StatusCode::CREATED, Json(invoice.summary())).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn member_invoices_handler(
    State(console): State<Arc<MembershipConsole>>,
    headers: HeaderMap,
    Path(member_id): Path<String>,
) -> Response {
    let operator = match operator_from(&headers) {
        Ok(operator) => operator,
        Err(response) => return response,
    };

    match console.invoices_for_member(&operator, &MemberId(member_id)) {
        Ok(invoices) => (StatusCode::OK, Json(invoices)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn document_handler(
    State(console): State<Arc<MembershipConsole>>,
    headers: HeaderMap,
    Path(invoice_id): Path<String>,
) -> Response {
    let operator = match operator_from(&headers) {
        Ok(operator) => operator,
        Err(response) => return response,
    };

    match console.fetch_invoice_document(&operator, &InvoiceId(invoice_id)) {
        Ok(document) => {
            let content_type = if document.content_type.is_empty() {
                mime::APPLICATION_OCTET_STREAM.to_string()
            } else {
                document.content_type
            };
            let disposition = attachment_disposition(&document.filename);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                document.bytes,
            )
                .into_response()
        }
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn reconcile_handler(
    State(console): State<Arc<MembershipConsole>>,
    headers: HeaderMap,
    Query(params): Query<TodayParams>,
    Json(confirmation): Json<PaymentConfirmation>,
) -> Response {
    let operator = match operator_from(&headers) {
        Ok(operator) => operator,
        Err(response) => return response,
    };

    let result = resolve_today(params.today.as_deref())
        .and_then(|today| console.reconcile_payment(&operator, &confirmation, today));
    match result {
        Ok(reconciliation) => (StatusCode::OK, Json(reconciliation)).into_response(),
        Err(err) => error_response(&err),
    }
}

/// Quoted-string safe `Content-Disposition`; anything outside `[A-Za-z0-9._-]` becomes `_`.
fn attachment_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let safe = if safe.trim_matches(|ch| ch == '.' || ch == '_').is_empty() {
        "document".to_string()
    } else {
        safe
    };
    format!("attachment; filename=\"{safe}\"")
}

/// Maps a membership error onto its status code and a `{error, message}` body.
pub fn error_response(err: &MembershipError) -> Response {
    let kind = err.kind();
    if kind == ErrorKind::Internal {
        error!(error = %err, "membership command failed");
    }
    let payload = json!({
        "error": kind.label(),
        "message": err.to_string(),
    });
    (kind.status_code(), Json(payload)).into_response()
}

fn operator_from(headers: &HeaderMap) -> Result<Operator, Response> {
    let id = headers
        .get(OPERATOR_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let role = headers
        .get(OPERATOR_ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(Role::parse);

    match (id, role) {
        (Some(id), Some(role)) => Ok(Operator::new(id, role)),
        _ => {
            let payload = json!({
                "error": "unauthenticated",
                "message": format!(
                    "requests must carry {OPERATOR_ID_HEADER} and a known {OPERATOR_ROLE_HEADER}"
                ),
            });
            Err((StatusCode::UNAUTHORIZED, Json(payload)).into_response())
        }
    }
}

fn overview_query(params: &OverviewParams) -> Result<OverviewQuery, MembershipError> {
    let status = match params.status.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
        None => None,
        Some(raw) => Some(SubscriptionStatus::parse(raw).ok_or_else(|| {
            MembershipError::validation(format!("unknown subscription status '{raw}'"))
        })?),
    };
    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(str::to_string);

    Ok(OverviewQuery { search, status })
}

fn resolve_today(raw: Option<&str>) -> Result<NaiveDate, MembershipError> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok(status::today()),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            MembershipError::validation(format!("'{raw}' is not a date, expected YYYY-MM-DD"))
        }),
    }
}
