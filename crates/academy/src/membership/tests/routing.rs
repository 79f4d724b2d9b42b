use std::sync::Arc;

use axum::http::{header, Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use super::common::*;
use crate::membership::collaborators::CollaboratorError;
use crate::membership::domain::MemberId;
use crate::membership::error::MembershipError;
use crate::membership::invoices::InvoiceType;
use crate::membership::ledger::{PaymentState, PaymentStatus};
use crate::membership::requests::{RequestId, RequestStatus};
use crate::membership::roles::{Operation, Role};
use crate::membership::router::{console_router, error_response};

fn submission_body(name: &str, email: &str) -> serde_json::Value {
    json!({
        "contact": { "full_name": name, "email": email, "city": "Lyon" },
        "affiliations": { "club_id": "club-lyon-7" },
        "belt_grade": "orange",
        "motivations": ["Competition", "  "],
    })
}

#[tokio::test]
async fn intake_is_public_and_returns_accepted() {
    let fixture = Fixture::new();
    let router = console_router(Arc::clone(&fixture.console));

    let response = router
        .oneshot(api_request(
            Method::POST,
            "/api/v1/requests",
            None,
            Some(submission_body("Camille Durand", "camille@dojo.fr")),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "pending");
    assert_eq!(payload["belt_grade"], "orange");
    assert_eq!(payload["motivations"], json!(["Competition"]));
}

#[tokio::test]
async fn invalid_intake_is_unprocessable() {
    let fixture = Fixture::new();
    let router = console_router(Arc::clone(&fixture.console));

    let response = router
        .oneshot(api_request(
            Method::POST,
            "/api/v1/requests",
            None,
            Some(submission_body("Camille Durand", "not-an-email")),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "validation_error");
}

#[tokio::test]
async fn operator_headers_are_required_and_roles_enforced() {
    let fixture = Fixture::new();
    let router = console_router(Arc::clone(&fixture.console));

    let anonymous = router
        .clone()
        .oneshot(api_request(Method::GET, "/api/v1/requests", None, None))
        .await
        .expect("route executes");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let mut unknown_role = api_request(Method::GET, "/api/v1/requests", Some(Role::Admin), None);
    unknown_role.headers_mut().insert(
        "x-operator-role",
        header::HeaderValue::from_static("superuser"),
    );
    let response = router
        .clone()
        .oneshot(unknown_role)
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let member = router
        .oneshot(api_request(Method::GET, "/api/v1/requests", Some(Role::Member), None))
        .await
        .expect("route executes");
    assert_eq!(member.status(), StatusCode::FORBIDDEN);
    let payload = read_json_body(member).await;
    assert_eq!(payload["error"], "forbidden");
}

#[tokio::test]
async fn approving_twice_over_http_conflicts() {
    let fixture = Fixture::new();
    let request = fixture.submit("Camille Durand", "camille@dojo.fr");
    let router = console_router(Arc::clone(&fixture.console));
    let uri = format!("/api/v1/requests/{}/approve", request.id);

    let first = router
        .clone()
        .oneshot(api_request(Method::POST, &uri, Some(Role::TechnicalDirector), None))
        .await
        .expect("route executes");
    assert_eq!(first.status(), StatusCode::OK);
    let payload = read_json_body(first).await;
    assert_eq!(payload["status"], "approved");
    assert_eq!(payload["warnings"], json!([]));
    assert!(payload["member_id"].is_string());

    let second = router
        .oneshot(api_request(Method::POST, &uri, Some(Role::Admin), None))
        .await
        .expect("route executes");
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let payload = read_json_body(second).await;
    assert_eq!(payload["error"], "already_processed");
}

#[tokio::test]
async fn rejection_accepts_an_optional_reason() {
    let fixture = Fixture::new();
    let with_reason = fixture.submit("Camille Durand", "camille@dojo.fr");
    let without_body = fixture.submit("Noah Petit", "noah@dojo.fr");
    let router = console_router(Arc::clone(&fixture.console));

    let response = router
        .clone()
        .oneshot(api_request(
            Method::POST,
            &format!("/api/v1/requests/{}/reject", with_reason.id),
            Some(Role::Admin),
            Some(json!({ "reason": "missing medical certificate" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "rejected");
    assert_eq!(payload["admin_note"], "missing medical certificate");

    let response = router
        .oneshot(api_request(
            Method::POST,
            &format!("/api/v1/requests/{}/reject", without_body.id),
            Some(Role::Admin),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["admin_note"], serde_json::Value::Null);
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let fixture = Fixture::new();
    let router = console_router(Arc::clone(&fixture.console));

    let response = router
        .oneshot(api_request(
            Method::POST,
            "/api/v1/requests/req-missing/approve",
            Some(Role::Admin),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn overview_derives_status_for_the_requested_day() {
    let fixture = Fixture::new();
    let member_id = fixture.approved_member("Camille Durand", "camille@dojo.fr");
    fixture.approved_member("Noah Petit", "noah@dojo.fr");
    fixture
        .console
        .renew_membership(&admin(), &member_id, date(2025, 1, 10), date(2025, 1, 1))
        .expect("renewed");
    let router = console_router(Arc::clone(&fixture.console));

    let response = router
        .clone()
        .oneshot(api_request(
            Method::GET,
            "/api/v1/subscriptions?status=active&today=2025-01-10",
            Some(Role::Instructor),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["members"].as_array().map(Vec::len), Some(1));
    assert_eq!(payload["members"][0]["days_remaining"], 0);
    assert_eq!(payload["stats"]["total"], 2);
    assert_eq!(payload["stats"]["never_paid"], 1);

    let response = router
        .clone()
        .oneshot(api_request(
            Method::GET,
            "/api/v1/subscriptions?search=CAMILLE&today=2025-01-11",
            Some(Role::Instructor),
            None,
        ))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload["members"][0]["status"], "expired");

    let response = router
        .oneshot(api_request(
            Method::GET,
            "/api/v1/subscriptions?status=lapsed",
            Some(Role::Admin),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn paid_flag_toggle_keeps_never_paid_members_never_paid() {
    let fixture = Fixture::new();
    let member_id = fixture.approved_member("Camille Durand", "camille@dojo.fr");
    let router = console_router(Arc::clone(&fixture.console));

    let response = router
        .clone()
        .oneshot(api_request(
            Method::PUT,
            &format!("/api/v1/members/{member_id}/subscription?today=2025-02-01"),
            Some(Role::Admin),
            Some(json!({ "has_paid_flag": true })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["has_paid_flag"], true);
    assert_eq!(payload["status"], "never_paid");
    assert_eq!(payload["expiry_date"], serde_json::Value::Null);

    let response = router
        .oneshot(api_request(
            Method::PUT,
            "/api/v1/members/mbr-ghost/subscription",
            Some(Role::Admin),
            Some(json!({ "has_paid_flag": true })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invoice_document_downloads_as_pdf_attachment() {
    let fixture = Fixture::new();
    let member_id = fixture.approved_member("Camille Durand", "camille@dojo.fr");
    let router = console_router(Arc::clone(&fixture.console));

    let response = router
        .clone()
        .oneshot(api_request(
            Method::POST,
            "/api/v1/invoices",
            Some(Role::NationalDirector),
            Some(json!({
                "member_id": member_id,
                "amount": "35",
                "invoice_type": "membership",
                "today": "2025-03-01",
            })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let summary = read_json_body(response).await;
    let invoice_id = summary["invoice_id"].as_str().expect("invoice id").to_string();
    assert_eq!(summary["invoice_type"], "membership");

    let response = router
        .clone()
        .oneshot(api_request(
            Method::GET,
            &format!("/api/v1/invoices/{invoice_id}/document"),
            Some(Role::NationalDirector),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        mime::APPLICATION_PDF.as_ref()
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .expect("ascii header")
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"invoice-INV-2025-"));
    let bytes = read_body(response).await;
    assert!(bytes.starts_with(b"%PDF"));

    let response = router
        .clone()
        .oneshot(api_request(
            Method::GET,
            &format!("/api/v1/members/{member_id}/invoices"),
            Some(Role::Admin),
            None,
        ))
        .await
        .expect("route executes");
    let listed = read_json_body(response).await;
    assert_eq!(listed[0]["invoice_id"], invoice_id.as_str());

    let response = router
        .oneshot(api_request(
            Method::GET,
            "/api/v1/invoices/inv-missing/document",
            Some(Role::Admin),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn document_filenames_are_sanitised_in_the_attachment_header() {
    let fixture = Fixture::with(Overrides {
        renderer: Some(Arc::new(NamedRenderer("Rapport \"final\"\r\n été.pdf"))),
        ..Overrides::default()
    });
    let member_id = fixture.approved_member("Camille Durand", "camille@dojo.fr");
    let invoice = fixture
        .console
        .generate_invoice(&admin(), &member_id, None, InvoiceType::Membership, date(2025, 3, 1))
        .expect("invoice generated");

    let response = console_router(Arc::clone(&fixture.console))
        .oneshot(api_request(
            Method::GET,
            &format!("/api/v1/invoices/{}/document", invoice.id),
            Some(Role::Admin),
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Rapport__final_____t_.pdf\""
    );
}

#[tokio::test]
async fn negative_invoice_amount_is_unprocessable() {
    let fixture = Fixture::new();
    let member_id = fixture.approved_member("Camille Durand", "camille@dojo.fr");
    let router = console_router(Arc::clone(&fixture.console));

    let response = router
        .oneshot(api_request(
            Method::POST,
            "/api/v1/invoices",
            Some(Role::Admin),
            Some(json!({ "member_id": member_id, "amount": -35 })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(fixture.invoices.is_empty());
}

#[tokio::test]
async fn reconcile_route_records_settled_payments() {
    let fixture = Fixture::new();
    let member_id = fixture.approved_member("Camille Durand", "camille@dojo.fr");
    fixture.payments.insert_session(
        "cs_live_9",
        PaymentStatus {
            amount_total: 35.into(),
            payment_status: PaymentState::Paid,
        },
    );
    let router = console_router(Arc::clone(&fixture.console));

    let response = router
        .oneshot(api_request(
            Method::POST,
            "/api/v1/payments/reconcile?today=2025-02-01",
            Some(Role::Admin),
            Some(json!({
                "session_id": "cs_live_9",
                "member_id": member_id,
                "kind": "membership",
            })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["outcome"], "recorded");
    assert_eq!(payload["expiry_date"], "2026-02-01");
}

#[tokio::test]
async fn error_kinds_map_to_status_codes() {
    let cases = [
        (
            MembershipError::MemberNotFound(MemberId::from("mbr-1")),
            StatusCode::NOT_FOUND,
        ),
        (
            MembershipError::InvalidStateTransition {
                from: RequestStatus::Approved,
                to: RequestStatus::Rejected,
            },
            StatusCode::CONFLICT,
        ),
        (
            MembershipError::AlreadyProcessed {
                request_id: RequestId::from("req-1"),
                status: RequestStatus::Approved,
            },
            StatusCode::CONFLICT,
        ),
        (
            MembershipError::validation("bad amount"),
            StatusCode::UNPROCESSABLE_ENTITY,
        ),
        (
            MembershipError::Forbidden {
                role: Role::Member,
                operation: Operation::ApproveRequest,
            },
            StatusCode::FORBIDDEN,
        ),
        (
            MembershipError::CollaboratorUnavailable(CollaboratorError::Failed {
                collaborator: "document renderer",
                message: "down".to_string(),
            }),
            StatusCode::SERVICE_UNAVAILABLE,
        ),
    ];

    for (err, status) in cases {
        let response = error_response(&err);
        assert_eq!(response.status(), status);
        let payload = read_json_body(response).await;
        assert_eq!(payload["error"], err.kind().label());
        assert_eq!(payload["message"], err.to_string());
    }
}
