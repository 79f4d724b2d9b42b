//! Member accounts and the subscription facts they carry.

pub mod payments;
pub mod repository;
pub mod service;

pub use payments::{
    PaymentConfirmation, PaymentReconciler, PaymentSourceError, PaymentState, PaymentStatus,
    PaymentStatusSource, Reconciliation,
};
pub use repository::{MemberRepository, SubscriptionFact, SubscriptionRepository};
pub use service::{
    MemberWithStatus, OverviewQuery, SubscriptionLedger, SubscriptionOverview, SubscriptionStats,
};
