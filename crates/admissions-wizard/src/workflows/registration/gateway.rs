use std::fmt::Debug;

use super::domain::{
    City, Guardian, GuardianId, GuardianPayload, Profile, Province, RegionId,
    RegistrationStatusRecord,
};

/// Failure of a single remote call. Every variant carries something a user can read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("{resource} not found")]
    NotFound { resource: String },
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("network unavailable: {0}")]
    Transport(String),
    #[error("unexpected response from server: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Text shown in the host's alert. Backend validation messages pass through verbatim.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::Rejected { message, .. } => message.clone(),
            GatewayError::Transport(_) => {
                "Unable to reach the admissions server. Check your connection and try again."
                    .to_string()
            }
            other => other.to_string(),
        }
    }

    /// Transport and server faults may succeed on a manual retry; rejections will not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport(_) | GatewayError::Server { .. }
        )
    }
}

/// Remote profile store: every backend operation the registration core consumes.
///
/// Implementations resolve with data or reject with a [`GatewayError`]; bearer
/// tokens and transport details stay behind this seam.
pub trait AdmissionsGateway: Debug + Send + Sync {
    fn provinces(&self) -> Result<Vec<Province>, GatewayError>;
    fn cities(&self, province_id: &RegionId) -> Result<Vec<City>, GatewayError>;
    /// `Ok(None)` when the applicant has not saved anything yet.
    fn fetch_profile(&self) -> Result<Option<Profile>, GatewayError>;
    fn upsert_profile(&self, profile: &Profile) -> Result<Profile, GatewayError>;
    /// A missing collection is reported as an empty list.
    fn guardians(&self) -> Result<Vec<Guardian>, GatewayError>;
    fn create_guardian(&self, payload: &GuardianPayload) -> Result<Guardian, GatewayError>;
    fn update_guardian(
        &self,
        id: &GuardianId,
        payload: &GuardianPayload,
    ) -> Result<Guardian, GatewayError>;
    fn delete_guardian(&self, id: &GuardianId) -> Result<(), GatewayError>;
    fn submit_registration(&self) -> Result<RegistrationStatusRecord, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_messages_pass_through_verbatim() {
        let err = GatewayError::Rejected {
            status: 422,
            message: "national_id is required".to_string(),
        };
        assert_eq!(err.user_message(), "national_id is required");
        assert!(!err.is_retryable());
    }

    #[test]
    fn transport_failures_are_retryable() {
        let err = GatewayError::Transport("connection refused".to_string());
        assert!(err.is_retryable());
        assert!(err.user_message().contains("try again"));
    }
}
