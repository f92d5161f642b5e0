use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::config::WizardSettings;
use crate::workflows::registration::domain::{
    AcademicSection, AddressSection, City, DocumentRef, Gender, GraduationStatus, Guardian,
    GuardianId, GuardianPayload, IdentitySection, Profile, Province, RegionId,
    RegistrationStatus, RegistrationStatusRecord, Relationship,
};
use crate::workflows::registration::gateway::{AdmissionsGateway, GatewayError};
use crate::workflows::registration::wizard::RegistrationWizard;

/// Every backend call the wizard made, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Call {
    Provinces,
    Cities(RegionId),
    FetchProfile,
    Upsert(Profile),
    Guardians,
    Create(GuardianPayload),
    Update(GuardianId, GuardianPayload),
    Delete(GuardianId),
    Submit,
}

/// Operations that can be scripted to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) enum Op {
    Upsert,
    Create,
    Update,
    Delete,
    Submit,
    Cities,
}

#[derive(Debug, Default)]
struct Remote {
    profile: Option<Profile>,
    guardians: Vec<Guardian>,
    next_id: u64,
    submitted: bool,
}

#[derive(Debug, Default)]
pub(super) struct RecordingGateway {
    calls: Mutex<Vec<Call>>,
    remote: Mutex<Remote>,
    failures: Mutex<HashMap<Op, GatewayError>>,
}

impl RecordingGateway {
    pub(super) fn with_guardians(guardians: Vec<Guardian>) -> Self {
        let gateway = Self::default();
        {
            let mut remote = gateway.remote.lock().expect("remote mutex poisoned");
            remote.next_id = 100;
            remote.guardians = guardians;
        }
        gateway
    }

    pub(super) fn with_profile(profile: Profile) -> Self {
        let gateway = Self::default();
        gateway.remote.lock().expect("remote mutex poisoned").profile = Some(profile);
        gateway
    }

    pub(super) fn fail_once(&self, op: Op, error: GatewayError) {
        self.failures
            .lock()
            .expect("failure mutex poisoned")
            .insert(op, error);
    }

    pub(super) fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("call mutex poisoned").clone()
    }

    pub(super) fn clear_calls(&self) {
        self.calls.lock().expect("call mutex poisoned").clear();
    }

    /// Calls that change backend state.
    pub(super) fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| {
                matches!(
                    call,
                    Call::Upsert(_)
                        | Call::Create(_)
                        | Call::Update(..)
                        | Call::Delete(_)
                        | Call::Submit
                )
            })
            .collect()
    }

    pub(super) fn upserts(&self) -> Vec<Profile> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Upsert(profile) => Some(profile),
                _ => None,
            })
            .collect()
    }

    pub(super) fn remote_guardians(&self) -> Vec<Guardian> {
        self.remote
            .lock()
            .expect("remote mutex poisoned")
            .guardians
            .clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("call mutex poisoned").push(call);
    }

    fn scripted(&self, op: Op) -> Result<(), GatewayError> {
        match self.failures.lock().expect("failure mutex poisoned").remove(&op) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl AdmissionsGateway for RecordingGateway {
    fn provinces(&self) -> Result<Vec<Province>, GatewayError> {
        self.record(Call::Provinces);
        Ok(vec![
            province("31", "DKI Jakarta"),
            province("32", "Jawa Barat"),
            province("65", "Kalimantan Utara"),
        ])
    }

    fn cities(&self, province_id: &RegionId) -> Result<Vec<City>, GatewayError> {
        self.record(Call::Cities(province_id.clone()));
        self.scripted(Op::Cities)?;
        Ok(match province_id.0.as_str() {
            "31" => vec![city("3171", "Kota Jakarta Selatan")],
            "32" => vec![city("3273", "Kota Bandung"), city("3201", "Kabupaten Bogor")],
            _ => Vec::new(),
        })
    }

    fn fetch_profile(&self) -> Result<Option<Profile>, GatewayError> {
        self.record(Call::FetchProfile);
        Ok(self.remote.lock().expect("remote mutex poisoned").profile.clone())
    }

    fn upsert_profile(&self, profile: &Profile) -> Result<Profile, GatewayError> {
        self.record(Call::Upsert(profile.clone()));
        self.scripted(Op::Upsert)?;
        let mut remote = self.remote.lock().expect("remote mutex poisoned");
        remote.profile = Some(profile.clone());
        Ok(profile.clone())
    }

    fn guardians(&self) -> Result<Vec<Guardian>, GatewayError> {
        self.record(Call::Guardians);
        Ok(self.remote_guardians())
    }

    fn create_guardian(&self, payload: &GuardianPayload) -> Result<Guardian, GatewayError> {
        self.record(Call::Create(payload.clone()));
        self.scripted(Op::Create)?;
        let mut remote = self.remote.lock().expect("remote mutex poisoned");
        remote.next_id += 1;
        let guardian = payload
            .clone()
            .into_guardian(GuardianId(remote.next_id.to_string()));
        remote.guardians.push(guardian.clone());
        Ok(guardian)
    }

    fn update_guardian(
        &self,
        id: &GuardianId,
        payload: &GuardianPayload,
    ) -> Result<Guardian, GatewayError> {
        self.record(Call::Update(id.clone(), payload.clone()));
        self.scripted(Op::Update)?;
        let mut remote = self.remote.lock().expect("remote mutex poisoned");
        let guardian = payload.clone().into_guardian(id.clone());
        match remote.guardians.iter_mut().find(|existing| &existing.id == id) {
            Some(existing) => *existing = guardian.clone(),
            None => {
                return Err(GatewayError::NotFound {
                    resource: "guardian".to_string(),
                })
            }
        }
        Ok(guardian)
    }

    fn delete_guardian(&self, id: &GuardianId) -> Result<(), GatewayError> {
        self.record(Call::Delete(id.clone()));
        self.scripted(Op::Delete)?;
        let mut remote = self.remote.lock().expect("remote mutex poisoned");
        let before = remote.guardians.len();
        remote.guardians.retain(|guardian| &guardian.id != id);
        if remote.guardians.len() == before {
            return Err(GatewayError::NotFound {
                resource: "guardian".to_string(),
            });
        }
        Ok(())
    }

    fn submit_registration(&self) -> Result<RegistrationStatusRecord, GatewayError> {
        self.record(Call::Submit);
        self.scripted(Op::Submit)?;
        let mut remote = self.remote.lock().expect("remote mutex poisoned");
        if remote.submitted {
            return Err(GatewayError::Rejected {
                status: 409,
                message: "registration has already been submitted".to_string(),
            });
        }
        remote.submitted = true;
        Ok(RegistrationStatusRecord {
            status: RegistrationStatus::UnderReview,
            registration_number: Some("REG-2025-00001".to_string()),
            submitted_at: None,
        })
    }
}

pub(super) fn province(id: &str, name: &str) -> Province {
    Province {
        id: RegionId(id.to_string()),
        name: name.to_string(),
    }
}

pub(super) fn city(id: &str, name: &str) -> City {
    City {
        id: RegionId(id.to_string()),
        province_id: None,
        name: name.to_string(),
    }
}

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date")
}

pub(super) fn identity() -> IdentitySection {
    IdentitySection {
        full_name: Some("Siti Rahma".to_string()),
        gender: Some(Gender::Female),
        national_id: Some("3273014501070001".to_string()),
        birth_place: Some("Bandung".to_string()),
        birth_date: NaiveDate::from_ymd_opt(2007, 1, 5),
        email: Some("siti@example.com".to_string()),
        phone: Some("081234567890".to_string()),
        first_choice_program: Some("informatics".to_string()),
        second_choice_program: Some("mathematics".to_string()),
    }
}

pub(super) fn address_details(address: &mut AddressSection) {
    address.postal_code = Some("40132".to_string());
    address.address_line = Some("Jl. Dago No. 12".to_string());
}

pub(super) fn academic() -> AcademicSection {
    AcademicSection {
        origin_school: Some("SMA Negeri 3 Bandung".to_string()),
        graduation_status: Some(GraduationStatus::Graduated),
        diploma_type: Some("SMA".to_string()),
        graduation_year: Some(2024),
        photo_document: Some(DocumentRef("uploads/photo.jpg".to_string())),
        diploma_document: Some(DocumentRef("uploads/diploma.pdf".to_string())),
        report_card_document: None,
    }
}

pub(super) fn guardian(id: &str, relationship: Relationship, name: &str) -> Guardian {
    Guardian {
        id: GuardianId(id.to_string()),
        relationship,
        full_name: name.to_string(),
        address: None,
        phone: None,
        occupation: None,
        last_education: None,
        income_bracket: None,
    }
}

pub(super) fn open_wizard(
    gateway: RecordingGateway,
) -> (Arc<RecordingGateway>, RegistrationWizard<RecordingGateway>) {
    let gateway = Arc::new(gateway);
    let wizard = RegistrationWizard::resume(gateway.clone(), &WizardSettings::default())
        .expect("wizard resumes");
    (gateway, wizard)
}

/// Drives Identity, Address, Academic and Achievements through to the Guardians step.
pub(super) fn complete_first_four_steps(wizard: &mut RegistrationWizard<RecordingGateway>) {
    wizard
        .edit_identity(|section| *section = identity())
        .expect("identity editable");
    wizard.next_on(today()).expect("identity saved");

    wizard.enter_address().expect("provinces load");
    wizard
        .select_province(&RegionId("32".to_string()))
        .expect("province selectable");
    wizard
        .select_city(&RegionId("3273".to_string()))
        .expect("city selectable");
    wizard.set_sub_district("Coblong").expect("sub-district");
    wizard.set_ward("Dago").expect("ward");
    wizard
        .edit_address(address_details)
        .expect("address editable");
    wizard.next_on(today()).expect("address saved");

    wizard
        .edit_academic(|section| *section = academic())
        .expect("academic editable");
    wizard.next_on(today()).expect("academic saved");

    wizard.next_on(today()).expect("achievements saved");
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
