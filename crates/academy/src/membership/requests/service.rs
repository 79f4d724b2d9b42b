use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use secrecy::SecretString;
use serde::Serialize;
use tracing::{info, warn};

use super::credentials::{generate_password, hash_password};
use super::domain::{Decision, MembershipApplication, PendingRequest, RequestId, RequestStatus};
use super::repository::PendingRequestRepository;
use crate::membership::collaborators::{call_with_timeout, CredentialNotice, NotificationSender};
use crate::membership::domain::{AdminId, Member, MemberId};
use crate::membership::error::{MembershipError, RepositoryError};
use crate::membership::ledger::SubscriptionLedger;
use crate::membership::settings::MembershipSettings;

/// Non-fatal problem raised while completing an approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApprovalWarning {
    CredentialsNotDelivered { message: String },
}

/// Result of a successful approval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalOutcome {
    pub member_id: MemberId,
    pub request: PendingRequest,
    pub warnings: Vec<ApprovalWarning>,
}

/// Drives requests from intake to a terminal decision.
pub struct PendingRequestService {
    requests: Arc<dyn PendingRequestRepository>,
    ledger: Arc<SubscriptionLedger>,
    notifier: Arc<dyn NotificationSender>,
    locks: RequestLocks,
    collaborator_timeout: Duration,
    password_length: usize,
}

impl PendingRequestService {
    pub fn new(
        requests: Arc<dyn PendingRequestRepository>,
        ledger: Arc<SubscriptionLedger>,
        notifier: Arc<dyn NotificationSender>,
        settings: &MembershipSettings,
    ) -> Self {
        Self {
            requests,
            ledger,
            notifier,
            locks: RequestLocks::default(),
            collaborator_timeout: settings.collaborator_timeout,
            password_length: settings.password_length,
        }
    }

    pub fn submit(
        &self,
        application: MembershipApplication,
    ) -> Result<PendingRequest, MembershipError> {
        let application = application.normalized()?;
        let request = PendingRequest::new(RequestId::generate(), application, Utc::now());
        let stored = self.requests.insert(request)?;

        info!(request_id = %stored.id, "membership request received");
        Ok(stored)
    }

    pub fn get(&self, request_id: &RequestId) -> Result<PendingRequest, MembershipError> {
        self.requests
            .fetch(request_id)?
            .ok_or_else(|| MembershipError::RequestNotFound(request_id.clone()))
    }

    /// Requests with the given status (all when `None`), newest first.
    pub fn list(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<PendingRequest>, MembershipError> {
        let mut requests = self.requests.list(status)?;
        requests.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(requests)
    }

    /// Approves a pending request and provisions the member account.
    ///
    /// Exactly one of any number of concurrent approvals for the same request succeeds; the others
    /// get [`MembershipError::AlreadyProcessed`]. A failed credential delivery does not undo the
    /// approval and surfaces as a warning instead.
    pub fn approve(
        &self,
        request_id: &RequestId,
        admin: &AdminId,
    ) -> Result<ApprovalOutcome, MembershipError> {
        let (request, member, password) = self.locks.run(request_id, || {
            let pending = self.pending(request_id)?;

            let password = generate_password(self.password_length);
            let credential_hash = hash_password(&password)?;
            let member = pending.provision_member(MemberId::generate(), credential_hash, Utc::now());
            let member = self.ledger.enroll(member).map_err(|err| match err {
                MembershipError::Repository(RepositoryError::Conflict) => {
                    self.already_processed(request_id)
                }
                other => other,
            })?;

            let decision = Decision::approved(admin.clone(), Utc::now(), member.id.clone());
            match self.requests.record_decision(request_id, &decision) {
                Ok(decided) => Ok((decided, member, password)),
                Err(err) => {
                    if let Err(rollback) = self.ledger.revoke_enrollment(&member.id) {
                        warn!(
                            request_id = %request_id,
                            member_id = %member.id,
                            error = %rollback,
                            "failed to roll back enrollment"
                        );
                    }
                    Err(self.decision_failure(request_id, err))
                }
            }
        })?;

        info!(
            request_id = %request_id,
            member_id = %member.id,
            admin_id = %admin,
            "membership request approved"
        );

        let warnings = self.deliver_credentials(&member, password);
        Ok(ApprovalOutcome {
            member_id: member.id,
            request,
            warnings,
        })
    }

    /// Rejects a pending request. No account is created.
    pub fn reject(
        &self,
        request_id: &RequestId,
        admin: &AdminId,
        reason: Option<String>,
    ) -> Result<PendingRequest, MembershipError> {
        let reason = reason
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty());

        let decided = self.locks.run(request_id, move || {
            self.pending(request_id)?;
            let decision = Decision::rejected(admin.clone(), Utc::now(), reason);
            self.requests
                .record_decision(request_id, &decision)
                .map_err(|err| self.decision_failure(request_id, err))
        })?;

        info!(request_id = %request_id, admin_id = %admin, "membership request rejected");
        Ok(decided)
    }

    fn pending(&self, request_id: &RequestId) -> Result<PendingRequest, MembershipError> {
        let request = self.get(request_id)?;
        if request.status.is_terminal() {
            return Err(MembershipError::AlreadyProcessed {
                request_id: request_id.clone(),
                status: request.status,
            });
        }
        Ok(request)
    }

    fn already_processed(&self, request_id: &RequestId) -> MembershipError {
        match self.requests.fetch(request_id) {
            Ok(Some(request)) => MembershipError::AlreadyProcessed {
                request_id: request_id.clone(),
                status: request.status,
            },
            Ok(None) => MembershipError::RequestNotFound(request_id.clone()),
            Err(err) => err.into(),
        }
    }

    fn decision_failure(&self, request_id: &RequestId, err: RepositoryError) -> MembershipError {
        match err {
            RepositoryError::Conflict => self.already_processed(request_id),
            RepositoryError::NotFound => MembershipError::RequestNotFound(request_id.clone()),
            other => other.into(),
        }
    }

    fn deliver_credentials(&self, member: &Member, password: SecretString) -> Vec<ApprovalWarning> {
        let notice = CredentialNotice {
            email: member.contact.email.clone(),
            full_name: member.contact.full_name.clone(),
            password,
        };
        let notifier = Arc::clone(&self.notifier);

        match call_with_timeout("notification sender", self.collaborator_timeout, move || {
            notifier.send_credentials(&notice)
        }) {
            Ok(()) => Vec::new(),
            Err(err) => {
                warn!(
                    member_id = %member.id,
                    collaborator = err.collaborator(),
                    error = %err,
                    "credentials not delivered"
                );
                vec![ApprovalWarning::CredentialsNotDelivered {
                    message: err.to_string(),
                }]
            }
        }
    }
}

/// One mutex per request id, created on demand and dropped once nobody waits on it.
#[derive(Default)]
struct RequestLocks {
    slots: Mutex<HashMap<RequestId, Arc<Mutex<()>>>>,
}

impl RequestLocks {
    fn run<T>(&self, request_id: &RequestId, work: impl FnOnce() -> T) -> T {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(request_id.clone()).or_default())
        };

        let result = {
            let _exclusive = slot.lock().unwrap_or_else(PoisonError::into_inner);
            work()
        };

        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&slot) == 2 {
            slots.remove(request_id);
        }
        result
    }
}
