use serde::Serialize;
use tracing::info;

use super::sequencer::WizardStep;

/// Durability of a step's data relative to the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPersistence {
    /// Entered but not edited since.
    #[default]
    Clean,
    Dirty,
    Saving,
    Persisted,
}

/// Where a backward gesture would take the applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationTarget {
    PreviousStep,
    ExitWizard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VetoReason {
    UnsavedChanges(WizardStep),
    SaveInFlight(WizardStep),
    SubmissionInFlight,
    RegistrationNotFinalized,
}

impl VetoReason {
    pub fn message(self) -> String {
        match self {
            VetoReason::UnsavedChanges(step) => format!(
                "Your changes on {} have not been saved. Tap Next to save them before going back.",
                step.label()
            ),
            VetoReason::SaveInFlight(step) => format!(
                "{} is still being saved. Please wait a moment.",
                step.label()
            ),
            VetoReason::SubmissionInFlight => {
                "Your registration is being submitted. Please wait.".to_string()
            }
            VetoReason::RegistrationNotFinalized => {
                "Your registration is not complete. Finish all steps and submit before leaving."
                    .to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationVerdict {
    Allow,
    Veto(VetoReason),
}

impl NavigationVerdict {
    pub fn is_allowed(self) -> bool {
        matches!(self, NavigationVerdict::Allow)
    }
}

/// Guard predicate consulted by the host's back gesture.
#[derive(Debug, Clone, Default)]
pub struct NavigationLock {
    steps: [StepPersistence; WizardStep::COUNT],
    finalizing: bool,
    released: bool,
}

impl NavigationLock {
    pub fn state(&self, step: WizardStep) -> StepPersistence {
        self.steps[step.position()]
    }

    pub fn mark_edited(&mut self, step: WizardStep) {
        self.steps[step.position()] = StepPersistence::Dirty;
    }

    pub fn mark_saving(&mut self, step: WizardStep) {
        self.steps[step.position()] = StepPersistence::Saving;
    }

    pub fn mark_persisted(&mut self, step: WizardStep) {
        self.steps[step.position()] = StepPersistence::Persisted;
    }

    /// A rejected save leaves the edits local and unsaved.
    pub fn mark_failed(&mut self, step: WizardStep) {
        self.steps[step.position()] = StepPersistence::Dirty;
    }

    pub fn begin_finalize(&mut self) {
        self.finalizing = true;
    }

    pub fn abort_finalize(&mut self) {
        self.finalizing = false;
    }

    /// Called once the registration is submitted; nothing is blocked afterwards.
    pub fn release(&mut self) {
        self.finalizing = false;
        self.released = true;
        info!("navigation lock released");
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn is_busy(&self) -> bool {
        self.finalizing
            || self
                .steps
                .iter()
                .any(|state| *state == StepPersistence::Saving)
    }

    pub fn can_leave(&self, step: WizardStep, target: NavigationTarget) -> NavigationVerdict {
        if self.released {
            return NavigationVerdict::Allow;
        }
        if self.finalizing {
            return NavigationVerdict::Veto(VetoReason::SubmissionInFlight);
        }

        match (self.state(step), target) {
            (StepPersistence::Saving, _) => NavigationVerdict::Veto(VetoReason::SaveInFlight(step)),
            (StepPersistence::Dirty, _) => {
                NavigationVerdict::Veto(VetoReason::UnsavedChanges(step))
            }
            (_, NavigationTarget::ExitWizard) => {
                NavigationVerdict::Veto(VetoReason::RegistrationNotFinalized)
            }
            (_, NavigationTarget::PreviousStep) => NavigationVerdict::Allow,
        }
    }
}
