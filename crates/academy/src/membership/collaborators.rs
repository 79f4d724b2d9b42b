//! Outbound collaborator contracts and the deadline wrapper every call goes through.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use secrecy::SecretString;
use tracing::warn;

/// Failure of an external dependency, either by error or by missing its deadline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{collaborator} did not answer within {}ms", timeout.as_millis())]
    TimedOut {
        collaborator: &'static str,
        timeout: Duration,
    },
    #[error("{collaborator} unavailable: {message}")]
    Failed {
        collaborator: &'static str,
        message: String,
    },
}

impl CollaboratorError {
    pub fn collaborator(&self) -> &'static str {
        match self {
            CollaboratorError::TimedOut { collaborator, .. }
            | CollaboratorError::Failed { collaborator, .. } => collaborator,
        }
    }
}

/// Runs a blocking collaborator call on its own thread and stops waiting after `timeout`.
///
/// A call that misses the deadline keeps running in the background; its result is discarded.
pub fn call_with_timeout<T, E, F>(
    collaborator: &'static str,
    timeout: Duration,
    call: F,
) -> Result<T, CollaboratorError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let (sender, receiver) = mpsc::sync_channel(1);

    thread::Builder::new()
        .name(format!("{collaborator}-call"))
        .spawn(move || {
            let _ = sender.send(call());
        })
        .map_err(|err| CollaboratorError::Failed {
            collaborator,
            message: format!("could not start call: {err}"),
        })?;

    match receiver.recv_timeout(timeout) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(CollaboratorError::Failed {
            collaborator,
            message: err.to_string(),
        }),
        Err(RecvTimeoutError::Timeout) => {
            warn!(collaborator, timeout_ms = timeout.as_millis() as u64, "collaborator call timed out");
            Err(CollaboratorError::TimedOut {
                collaborator,
                timeout,
            })
        }
        Err(RecvTimeoutError::Disconnected) => Err(CollaboratorError::Failed {
            collaborator,
            message: "call aborted before returning".to_string(),
        }),
    }
}

/// Credentials issued to a freshly provisioned account.
#[derive(Debug)]
pub struct CredentialNotice {
    pub email: String,
    pub full_name: String,
    pub password: SecretString,
}

/// Outbound credential delivery (e-mail adapters and the like).
pub trait NotificationSender: Send + Sync {
    fn send_credentials(&self, notice: &CredentialNotice) -> Result<(), NotificationError>;
}

/// Credential delivery error.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("recipient rejected: {0}")]
    Rejected(String),
}
