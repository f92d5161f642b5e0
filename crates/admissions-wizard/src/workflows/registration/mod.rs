//! Five-step applicant registration: Identity, Address, Academic,
//! Achievements, Guardians.
//!
//! Each step is validated locally, written to the backend as a complete
//! record, and only then advanced. The final step reconciles the guardian
//! slots and submits the registration, after which the record is locked.

pub mod domain;
pub mod gateway;
pub mod guardians;
pub mod http;
pub mod navigation;
pub mod regions;
pub mod sandbox;
pub mod sequencer;
pub mod submission;
pub mod validation;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use domain::{
    AcademicSection, Achievement, AchievementLevel, AddressSection, City, DocumentRef, Gender,
    GraduationStatus, Guardian, GuardianDetails, GuardianId, GuardianPayload, IdentitySection,
    Profile, Province, RegionId, RegistrationStatus, RegistrationStatusRecord, Relationship,
};
pub use gateway::{AdmissionsGateway, GatewayError};
pub use guardians::{
    GuardianRoster, GuardianSlot, GuardianSyncEngine, GuardianSyncError, SlotOutcome, SlotResult,
    SyncAction, SyncReport,
};
pub use http::{AccessTokenProvider, HttpAdmissionsGateway, StaticToken};
pub use navigation::{NavigationLock, NavigationTarget, NavigationVerdict, VetoReason};
pub use regions::{CityLoadOutcome, CityPicker, CityRequest, RegionError, RegionResolver};
pub use sandbox::SandboxState;
pub use sequencer::{ProgressSegment, StepSequencer, WizardStep};
pub use submission::{
    PostSubmission, PostSubmitRoute, RegistrationState, SubmissionCoordinator, SubmissionError,
    SubmissionReceipt,
};
pub use validation::{FieldError, FieldProblem, ValidationErrors};
pub use wizard::{BackOutcome, RegistrationWizard, StepOutcome, WizardError};
