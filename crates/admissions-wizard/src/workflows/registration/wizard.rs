use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use super::domain::{
    AcademicSection, Achievement, AddressSection, GuardianDetails, IdentitySection, Profile,
    RegionId, Relationship,
};
use super::gateway::{AdmissionsGateway, GatewayError};
use super::guardians::{GuardianRoster, GuardianSyncEngine, SyncAction};
use super::navigation::{NavigationLock, NavigationTarget, NavigationVerdict, VetoReason};
use super::regions::{non_blank, CityLoadOutcome, CityPicker, RegionError, RegionResolver};
use super::sequencer::{ProgressSegment, SequenceError, WizardStep};
use super::submission::{
    RegistrationState, SubmissionCoordinator, SubmissionError, SubmissionReceipt,
};
use super::validation::{validate_step, ValidationErrors};
use crate::config::WizardSettings;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("please fix the highlighted fields: {0}")]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Remote(#[from] GatewayError),
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error("registration is locked after submission")]
    Locked,
    #[error("{requested} is not the active step ({current} is)")]
    NotCurrentStep {
        requested: WizardStep,
        current: WizardStep,
    },
}

impl WizardError {
    /// Text for the host's inline error or alert.
    pub fn user_message(&self) -> String {
        match self {
            WizardError::Remote(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced(WizardStep),
    Submitted(SubmissionReceipt),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOutcome {
    Moved(WizardStep),
    /// Back from the first step, permitted only once the registration is final.
    LeaveWizard,
    Vetoed(VetoReason),
}

/// Applicant-facing registration flow over a remote profile store.
///
/// Every operation takes `&mut self`, so a host cannot fire a second Next while
/// one is in flight.
#[derive(Debug)]
pub struct RegistrationWizard<G> {
    gateway: Arc<G>,
    accepted: Profile,
    draft: Profile,
    regions: RegionResolver,
    guardians: GuardianRoster,
    state: RegistrationState,
    lock: NavigationLock,
    coordinator: SubmissionCoordinator,
}

impl<G> RegistrationWizard<G>
where
    G: AdmissionsGateway + 'static,
{
    /// Opens the wizard, loading whatever the applicant saved before. A missing
    /// profile or guardian collection starts empty.
    pub fn resume(gateway: Arc<G>, settings: &WizardSettings) -> Result<Self, WizardError> {
        let accepted = gateway.fetch_profile()?.unwrap_or_default();
        let guardians = GuardianRoster::from_remote(&gateway.guardians()?);

        let mut wizard = Self {
            gateway,
            draft: accepted.clone(),
            accepted,
            regions: RegionResolver::default(),
            guardians,
            state: RegistrationState::default(),
            lock: NavigationLock::default(),
            coordinator: SubmissionCoordinator::new(settings.redirect_after),
        };

        if wizard.accepted.status.is_locked() {
            info!(status = wizard.accepted.status.label(), "registration already finalized");
            wizard.state.submitted = true;
            wizard.lock.release();
        }

        Ok(wizard)
    }

    pub fn current_step(&self) -> WizardStep {
        self.state.sequencer.current()
    }

    pub fn progress(&self) -> [ProgressSegment; WizardStep::COUNT] {
        self.state.sequencer.progress()
    }

    pub fn is_submitted(&self) -> bool {
        self.state.submitted
    }

    pub fn is_busy(&self) -> bool {
        self.lock.is_busy()
    }

    /// The record as last accepted by the backend.
    pub fn profile(&self) -> &Profile {
        &self.accepted
    }

    pub fn draft(&self) -> &Profile {
        &self.draft
    }

    pub fn guardians(&self) -> &GuardianRoster {
        &self.guardians
    }

    pub fn regions(&self) -> &RegionResolver {
        &self.regions
    }

    pub fn navigation(&self) -> &NavigationLock {
        &self.lock
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    fn ensure_editable(&self, step: WizardStep) -> Result<(), WizardError> {
        if self.state.submitted {
            return Err(WizardError::Locked);
        }
        let current = self.current_step();
        if step != current {
            return Err(WizardError::NotCurrentStep {
                requested: step,
                current,
            });
        }
        Ok(())
    }

    fn begin_edit(&mut self, step: WizardStep) -> Result<(), WizardError> {
        self.ensure_editable(step)?;
        self.lock.mark_edited(step);
        Ok(())
    }

    pub fn edit_identity(
        &mut self,
        edit: impl FnOnce(&mut IdentitySection),
    ) -> Result<(), WizardError> {
        self.begin_edit(WizardStep::Identity)?;
        edit(&mut self.draft.identity);
        Ok(())
    }

    /// Edits the non-region address fields; region fields go through the resolver methods.
    pub fn edit_address(
        &mut self,
        edit: impl FnOnce(&mut AddressSection),
    ) -> Result<(), WizardError> {
        self.begin_edit(WizardStep::Address)?;
        edit(&mut self.draft.address);
        Ok(())
    }

    pub fn edit_academic(
        &mut self,
        edit: impl FnOnce(&mut AcademicSection),
    ) -> Result<(), WizardError> {
        self.begin_edit(WizardStep::Academic)?;
        edit(&mut self.draft.academic);
        Ok(())
    }

    pub fn edit_achievements(
        &mut self,
        edit: impl FnOnce(&mut Vec<Achievement>),
    ) -> Result<(), WizardError> {
        self.begin_edit(WizardStep::Achievements)?;
        edit(&mut self.draft.achievements);
        Ok(())
    }

    pub fn edit_guardian(
        &mut self,
        relationship: Relationship,
        edit: impl FnOnce(&mut GuardianDetails),
    ) -> Result<(), WizardError> {
        self.begin_edit(WizardStep::Guardians)?;
        edit(&mut self.guardians.slot_mut(relationship).details);
        Ok(())
    }

    /// Loads provinces on Address mount and re-selects a saved region.
    pub fn enter_address(&mut self) -> Result<(), WizardError> {
        if self.regions.provinces().is_empty() {
            self.regions.load_provinces(self.gateway.as_ref())?;
            self.regions
                .restore(self.gateway.as_ref(), &self.draft.address)?;
        }
        Ok(())
    }

    pub fn select_province(
        &mut self,
        province_id: &RegionId,
    ) -> Result<CityLoadOutcome, WizardError> {
        self.ensure_editable(WizardStep::Address)?;
        let Some(request) = self.regions.select_province(province_id)? else {
            return Ok(match self.regions.city_picker() {
                CityPicker::Ready(cities) => CityLoadOutcome::Applied {
                    count: cities.len(),
                },
                CityPicker::Failed(message) => CityLoadOutcome::Failed(message.to_string()),
                _ => CityLoadOutcome::Empty,
            });
        };
        self.lock.mark_edited(WizardStep::Address);
        Ok(self.regions.load_cities(self.gateway.as_ref(), request))
    }

    pub fn retry_cities(&mut self) -> Option<CityLoadOutcome> {
        let request = self.regions.retry_cities()?;
        Some(self.regions.load_cities(self.gateway.as_ref(), request))
    }

    pub fn select_city(&mut self, city_id: &RegionId) -> Result<(), WizardError> {
        self.ensure_editable(WizardStep::Address)?;
        self.regions.select_city(city_id)?;
        self.lock.mark_edited(WizardStep::Address);
        Ok(())
    }

    /// Also written to the draft so the edit survives when no province is selected.
    pub fn set_sub_district(&mut self, value: impl Into<String>) -> Result<(), WizardError> {
        self.begin_edit(WizardStep::Address)?;
        let value = value.into();
        self.draft.address.sub_district = non_blank(&value);
        self.regions.set_sub_district(value);
        Ok(())
    }

    pub fn set_ward(&mut self, value: impl Into<String>) -> Result<(), WizardError> {
        self.begin_edit(WizardStep::Address)?;
        let value = value.into();
        self.draft.address.ward = non_blank(&value);
        self.regions.set_ward(value);
        Ok(())
    }

    /// Decisions the Finish button would execute, for previews.
    pub fn guardian_plan(&self) -> Vec<(Relationship, SyncAction)> {
        GuardianSyncEngine.plan(&self.guardians)
    }

    /// The payload the next upsert would send: everything already accepted plus
    /// the current step's section from the draft.
    pub fn pending_payload(&self) -> Profile {
        let mut payload = self.accepted.clone();
        match self.current_step() {
            WizardStep::Identity => payload.identity = self.draft.identity.clone(),
            WizardStep::Address => {
                let mut address = self.draft.address.clone();
                if self.regions.selection().province.is_some() {
                    self.regions.apply_to(&mut address);
                }
                payload.address = address;
            }
            WizardStep::Academic => payload.academic = self.draft.academic.clone(),
            WizardStep::Achievements => payload.achievements = self.draft.achievements.clone(),
            WizardStep::Guardians => {}
        }
        payload
    }

    /// Validates the active step, saves it, and advances. On the last step this finalizes.
    pub fn next(&mut self) -> Result<StepOutcome, WizardError> {
        self.next_on(Local::now().date_naive())
    }

    pub fn next_on(&mut self, today: NaiveDate) -> Result<StepOutcome, WizardError> {
        if self.state.submitted {
            return Err(WizardError::Locked);
        }

        let step = self.current_step();
        if step == WizardStep::Address && self.regions.selection().province.is_some() {
            self.regions.apply_to(&mut self.draft.address);
        }
        validate_step(step, &self.draft, &self.guardians, today)?;

        if step.is_final() {
            return self.submit().map(StepOutcome::Submitted);
        }

        let payload = self.pending_payload();
        self.lock.mark_saving(step);
        match self.gateway.upsert_profile(&payload) {
            Ok(saved) => {
                self.accepted = payload;
                self.accepted.status = saved.status;
                self.draft = self.accepted.clone();
                self.lock.mark_persisted(step);
                let next = self.state.sequencer.advance()?;
                info!(saved = step.label(), next = next.label(), "step saved");
                Ok(StepOutcome::Advanced(next))
            }
            Err(err) => {
                warn!(step = step.label(), error = %err, "profile upsert rejected");
                self.lock.mark_failed(step);
                Err(err.into())
            }
        }
    }

    /// Reconciles guardians and submits. Safe to call again after a failure.
    pub fn finalize(&mut self) -> Result<SubmissionReceipt, WizardError> {
        let current = self.current_step();
        if current != WizardStep::Guardians {
            return Err(WizardError::NotCurrentStep {
                requested: WizardStep::Guardians,
                current,
            });
        }
        validate_step(
            current,
            &self.draft,
            &self.guardians,
            Local::now().date_naive(),
        )?;
        self.submit()
    }

    fn submit(&mut self) -> Result<SubmissionReceipt, WizardError> {
        let current = self.current_step();
        let receipt = self.coordinator.finalize(
            self.gateway.as_ref(),
            &mut self.guardians,
            &mut self.state,
            &mut self.lock,
        )?;
        self.lock.mark_persisted(current);
        self.accepted.status = receipt.status.status;
        self.draft.status = receipt.status.status;
        Ok(receipt)
    }

    /// Handles the host's back gesture. A veto leaves the current step unchanged.
    pub fn back(&mut self) -> BackOutcome {
        let step = self.current_step();
        let target = if step.previous().is_some() && !self.state.submitted {
            NavigationTarget::PreviousStep
        } else {
            NavigationTarget::ExitWizard
        };

        match self.lock.can_leave(step, target) {
            NavigationVerdict::Veto(reason) => {
                info!(step = step.label(), ?reason, "back navigation vetoed");
                BackOutcome::Vetoed(reason)
            }
            NavigationVerdict::Allow => match target {
                NavigationTarget::PreviousStep => match self.state.sequencer.step_back() {
                    Some(previous) => {
                        self.draft = self.accepted.clone();
                        BackOutcome::Moved(previous)
                    }
                    None => BackOutcome::LeaveWizard,
                },
                NavigationTarget::ExitWizard => BackOutcome::LeaveWizard,
            },
        }
    }
}
