use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::RegistrationStatusRecord;
use super::gateway::{AdmissionsGateway, GatewayError};
use super::guardians::{GuardianRoster, GuardianSyncEngine, GuardianSyncError, SyncReport};
use super::navigation::NavigationLock;
use super::sequencer::StepSequencer;

/// Process-local wizard progress.
#[derive(Debug, Clone, Default)]
pub struct RegistrationState {
    pub sequencer: StepSequencer,
    pub submitted: bool,
}

/// Where the host routes once the success screen has been shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostSubmitRoute {
    ApplicantDashboard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostSubmission {
    pub display_for: Duration,
    pub route: PostSubmitRoute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub status: RegistrationStatusRecord,
    pub guardians: SyncReport,
    pub redirect: PostSubmission,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("registration has already been submitted")]
    AlreadySubmitted,
    #[error(transparent)]
    Guardians(#[from] GuardianSyncError),
    /// Guardian data is already saved; finalize may be retried.
    #[error("guardian details were saved but the registration was not submitted: {}", .0.user_message())]
    Submit(#[source] GatewayError),
}

impl SubmissionError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SubmissionError::AlreadySubmitted)
    }
}

/// Orchestrates the final step: guardians, then the irreversible submit.
#[derive(Debug, Clone)]
pub struct SubmissionCoordinator {
    engine: GuardianSyncEngine,
    redirect_after: Duration,
}

impl SubmissionCoordinator {
    pub fn new(redirect_after: Duration) -> Self {
        Self {
            engine: GuardianSyncEngine,
            redirect_after,
        }
    }

    pub fn finalize<G>(
        &self,
        gateway: &G,
        roster: &mut GuardianRoster,
        state: &mut RegistrationState,
        lock: &mut NavigationLock,
    ) -> Result<SubmissionReceipt, SubmissionError>
    where
        G: AdmissionsGateway + ?Sized,
    {
        if state.submitted {
            return Err(SubmissionError::AlreadySubmitted);
        }

        lock.begin_finalize();

        let guardians = match self.engine.sync(gateway, roster) {
            Ok(report) => report,
            Err(err) => {
                lock.abort_finalize();
                return Err(err.into());
            }
        };

        let status = match gateway.submit_registration() {
            Ok(status) => status,
            Err(err) => {
                warn!(error = %err, writes = guardians.writes(), "registration submit failed after guardian sync");
                lock.abort_finalize();
                return Err(SubmissionError::Submit(err));
            }
        };

        state.submitted = true;
        lock.release();
        info!(
            status = status.status.label(),
            registration_number = status.registration_number.as_deref().unwrap_or("-"),
            "registration submitted"
        );

        Ok(SubmissionReceipt {
            status,
            guardians,
            redirect: PostSubmission {
                display_for: self.redirect_after,
                route: PostSubmitRoute::ApplicantDashboard,
            },
        })
    }
}
