use academy::error::AppError;
use academy::membership::invoices::{InvoiceType, PdfInvoiceRenderer};
use academy::membership::ledger::{
    OverviewQuery, PaymentConfirmation, PaymentState, PaymentStatus, Reconciliation,
    SubscriptionOverview,
};
use academy::membership::memory::{OutboxNotificationSender, StaticPaymentSource};
use academy::membership::requests::{ApprovalWarning, MembershipApplication, RequestStatus};
use academy::membership::status;
use academy::membership::{
    Affiliations, BeltGrade, Collaborators, ContactDetails, MembershipConsole, MembershipSettings,
    MembershipStores, MembershipType, Operator, Role,
};
use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_SESSION: &str = "cs_demo_membership";

#[derive(Args, Debug)]
pub(crate) struct StatusArgs {
    /// Stored expiry date (YYYY-MM-DD). Omit for a member who never paid.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) expiry: Option<NaiveDate>,
    /// Evaluation date (defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Treat the manual paid flag as set
    #[arg(long)]
    pub(crate) paid: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the demo date (defaults to today).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Write the generated invoice document to this path.
    #[arg(long)]
    pub(crate) invoice_out: Option<PathBuf>,
}

pub(crate) fn run_status(args: StatusArgs) -> Result<(), AppError> {
    let StatusArgs {
        expiry,
        today,
        paid,
    } = args;

    let today = today.unwrap_or_else(status::today);
    let derived = status::derive(paid, expiry, today);

    println!("Subscription status as of {today}");
    match expiry {
        Some(expiry) => println!("- Expiry date: {expiry}"),
        None => println!("- Expiry date: none recorded"),
    }
    println!("- Paid flag: {}", if paid { "set" } else { "unset" });
    println!("- Status: {}", derived.status);
    if let Some(days) = derived.days_remaining {
        println!("- Days remaining: {days}");
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { today, invoice_out } = args;
    let today = today.unwrap_or_else(status::today);

    let settings = MembershipSettings::default();
    let outbox = OutboxNotificationSender::default();
    let payments = StaticPaymentSource::default();
    payments.insert_session(
        DEMO_SESSION,
        PaymentStatus {
            amount_total: settings.membership_fee,
            payment_status: PaymentState::Paid,
        },
    );
    let console = MembershipConsole::new(
        MembershipStores::in_memory(),
        Collaborators {
            notifier: Arc::new(outbox.clone()),
            payments: Arc::new(payments),
            renderer: Arc::new(PdfInvoiceRenderer),
        },
        settings.clone(),
    );

    let admin = Operator::new("demo-admin", Role::Admin);
    let instructor = Operator::new("demo-instructor", Role::Instructor);

    println!("Membership lifecycle demo ({})", settings.organization_name);
    println!("Evaluation date: {today}");

    let request = console.submit_request(demo_application())?;
    println!("\nRequest submitted");
    println!("- Request id: {}", request.id);
    println!("- Applicant: {} <{}>", request.contact.full_name, request.contact.email);
    println!("- Status: {}", request.status);

    let pending = console.list_pending_requests(&admin, Some(RequestStatus::Pending))?;
    println!("- Pending requests in queue: {}", pending.len());

    println!("\nApproval");
    match console.approve_request(&instructor, &request.id) {
        Ok(_) => println!("- Instructor approval unexpectedly succeeded"),
        Err(err) => println!("- Instructor attempt refused: {err}"),
    }
    let outcome = console.approve_request(&admin, &request.id)?;
    println!("- Approved by {} as member {}", admin.id, outcome.member_id);
    for warning in &outcome.warnings {
        match warning {
            ApprovalWarning::CredentialsNotDelivered { message } => {
                println!("- Warning: credentials not delivered ({message})")
            }
        }
    }
    println!("- Credential notices sent: {}", outbox.recipients().join(", "));
    if let Err(err) = console.approve_request(&admin, &request.id) {
        println!("- Second approval rejected: {err}");
    }

    let member_id = outcome.member_id;
    println!("\nSubscription overview before payment");
    print_overview(&console.subscription_overview(&admin, &OverviewQuery::default(), today)?);

    let flagged = console.set_paid_flag(&admin, &member_id, true, today)?;
    println!(
        "- Paid flag set; status stays {} until a payment is recorded",
        flagged.status
    );

    println!("\nPayment reconciliation");
    let confirmation = PaymentConfirmation {
        session_id: DEMO_SESSION.to_string(),
        member_id: member_id.clone(),
        kind: InvoiceType::Membership,
    };
    match console.reconcile_payment(&admin, &confirmation, today)? {
        Reconciliation::Recorded {
            expiry_date,
            amount_total,
            ..
        } => println!("- Recorded {amount_total:.2} payment, membership runs until {expiry_date}"),
        Reconciliation::NotPaid { payment_status } => {
            println!("- Checkout not settled ({payment_status:?})")
        }
        Reconciliation::Ignored { kind } => println!("- Ignored {kind} payment"),
    }
    print_overview(&console.subscription_overview(&admin, &OverviewQuery::default(), today)?);

    println!("\nInvoice");
    let invoice = console.generate_invoice(&admin, &member_id, None, InvoiceType::Membership, today)?;
    println!("- Number: {}", invoice.number);
    println!("- Amount: {:.2}", invoice.amount);
    if let Some(coverage) = invoice.coverage {
        println!("- Coverage: {} to {}", coverage.starts_on, coverage.ends_on);
    }
    println!(
        "- Document: {} ({} bytes)",
        invoice.document.filename,
        invoice.document.bytes.len()
    );
    if let Some(path) = invoice_out {
        let document = console.fetch_invoice_document(&admin, &invoice.id)?;
        std::fs::write(&path, &document.bytes)?;
        println!("- Written to {}", path.display());
    }

    let shop_attempt = console.generate_invoice(
        &admin,
        &member_id,
        Some(Decimal::ZERO),
        InvoiceType::Shop,
        today,
    );
    if let Err(err) = shop_attempt {
        println!("- Zero-amount shop invoice refused: {err}");
    }

    Ok(())
}

fn print_overview(overview: &SubscriptionOverview) {
    let stats = &overview.stats;
    println!(
        "- Members: {} (active {}, expired {}, never paid {})",
        stats.total, stats.active, stats.expired, stats.never_paid
    );
    for member in &overview.members {
        let days = member
            .days_remaining
            .map(|days| format!(", {days} days remaining"))
            .unwrap_or_default();
        println!("  {} [{}{days}]", member.full_name, member.status);
    }
}

fn demo_application() -> MembershipApplication {
    MembershipApplication {
        contact: ContactDetails {
            full_name: "Camille Durand".to_string(),
            email: "camille.durand@example.org".to_string(),
            phone: Some("+33 6 12 34 56 78".to_string()),
            city: Some("Lyon".to_string()),
            country: Some("France".to_string()),
        },
        affiliations: Affiliations {
            club_id: Some("club-lyon-centre".to_string()),
            ..Affiliations::default()
        },
        belt_grade: Some(BeltGrade::Yellow),
        membership_type: Some(MembershipType::Standard),
        motivations: vec!["Self-defence".to_string(), "Fitness".to_string()],
    }
}
