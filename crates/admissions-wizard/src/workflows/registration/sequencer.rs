use std::fmt;

use serde::{Deserialize, Serialize};

/// The five data-entry steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Identity,
    Address,
    Academic,
    Achievements,
    Guardians,
}

impl WizardStep {
    pub const COUNT: usize = 5;

    pub const fn ordered() -> [Self; Self::COUNT] {
        [
            Self::Identity,
            Self::Address,
            Self::Academic,
            Self::Achievements,
            Self::Guardians,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Identity => "Identity",
            Self::Address => "Address",
            Self::Academic => "Academic",
            Self::Achievements => "Achievements",
            Self::Guardians => "Guardians",
        }
    }

    /// One-based position shown to the applicant.
    pub const fn number(self) -> usize {
        self.position() + 1
    }

    pub(crate) const fn position(self) -> usize {
        match self {
            Self::Identity => 0,
            Self::Address => 1,
            Self::Academic => 2,
            Self::Achievements => 3,
            Self::Guardians => 4,
        }
    }

    pub fn next(self) -> Option<Self> {
        Self::ordered().get(self.position() + 1).copied()
    }

    pub fn previous(self) -> Option<Self> {
        self.position()
            .checked_sub(1)
            .map(|position| Self::ordered()[position])
    }

    pub const fn is_final(self) -> bool {
        matches!(self, Self::Guardians)
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({})", self.number(), self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    #[error("already on the final step; finish the registration instead")]
    AtFinalStep,
}

/// One segment of the progress indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSegment {
    pub step: WizardStep,
    pub active: bool,
}

/// Tracks the active step. Only moves forward through the public API; backward
/// motion goes through the navigation lock in the wizard facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSequencer {
    current: WizardStep,
    furthest: WizardStep,
}

impl Default for StepSequencer {
    fn default() -> Self {
        Self {
            current: WizardStep::Identity,
            furthest: WizardStep::Identity,
        }
    }
}

impl StepSequencer {
    pub fn current(&self) -> WizardStep {
        self.current
    }

    /// Highest step ever reached; never decreases.
    pub fn furthest(&self) -> WizardStep {
        self.furthest
    }

    pub fn advance(&mut self) -> Result<WizardStep, SequenceError> {
        let next = self.current.next().ok_or(SequenceError::AtFinalStep)?;
        self.current = next;
        self.furthest = self.furthest.max(next);
        Ok(next)
    }

    pub(crate) fn step_back(&mut self) -> Option<WizardStep> {
        let previous = self.current.previous()?;
        self.current = previous;
        Some(previous)
    }

    pub fn progress(&self) -> [ProgressSegment; WizardStep::COUNT] {
        WizardStep::ordered().map(|step| ProgressSegment {
            step,
            active: step <= self.current,
        })
    }
}
