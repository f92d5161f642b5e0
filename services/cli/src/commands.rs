use crate::infra::{build_gateway, AddressAnswers, RegistrationAnswers};
use admissions_wizard::config::AppConfig;
use admissions_wizard::error::AppError;
use admissions_wizard::telemetry;
use admissions_wizard::workflows::registration::validation::{
    validate_academic, validate_achievements, validate_address, validate_guardians,
    validate_identity, ValidationErrors,
};
use admissions_wizard::workflows::registration::{
    AddressSection, AdmissionsGateway, CityLoadOutcome, CityPicker, GuardianDetails, GuardianRoster,
    GuardianSyncEngine, Province, RegionId, RegistrationWizard, Relationship, StepOutcome,
    SyncAction, WizardStep,
};
use chrono::Local;
use clap::Args;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct RegionsArgs {
    /// List the cities of this province id instead of the provinces
    #[arg(long)]
    pub(crate) province: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct RegisterArgs {
    /// JSON answers file with identity, address, academic, achievements and guardians
    pub(crate) answers: PathBuf,
    /// Validate locally and print the guardian plan without writing anything
    #[arg(long)]
    pub(crate) dry_run: bool,
}

fn load_config() -> Result<AppConfig, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    Ok(config)
}

pub(crate) fn run_regions(args: RegionsArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let gateway = build_gateway(&config)?;

    match args.province {
        None => {
            let provinces = gateway.provinces()?;
            println!("Provinces ({})", provinces.len());
            for province in provinces {
                println!("  {:>4}  {}", province.id, province.name);
            }
        }
        Some(province_id) => {
            let cities = gateway.cities(&RegionId(province_id.clone()))?;
            if cities.is_empty() {
                println!("No cities recorded for province {province_id}");
            } else {
                println!("Cities in province {province_id} ({})", cities.len());
                for city in cities {
                    println!("  {:>4}  {}", city.id, city.name);
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn run_status() -> Result<(), AppError> {
    let config = load_config()?;
    let gateway = build_gateway(&config)?;

    match gateway.fetch_profile()? {
        Some(profile) => {
            println!("Registration status: {}", profile.status.label());
            println!(
                "Applicant: {}",
                profile.identity.full_name.as_deref().unwrap_or("(not provided)")
            );
        }
        None => println!("No registration started yet"),
    }

    let roster = GuardianRoster::from_remote(&gateway.guardians()?);
    println!("Guardians:");
    for slot in roster.slots() {
        let name = if slot.details.is_blank() {
            "(empty)"
        } else {
            slot.details.full_name.as_str()
        };
        match &slot.remote_id {
            Some(id) => println!("  {:<8} {} [id {}]", slot.relationship.label(), name, id),
            None => println!("  {:<8} {}", slot.relationship.label(), name),
        }
    }
    Ok(())
}

pub(crate) fn run_register(args: RegisterArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let answers = RegistrationAnswers::from_path(&args.answers)?;
    let gateway = Arc::new(build_gateway(&config)?);

    if args.dry_run {
        return dry_run(gateway.as_ref(), &answers);
    }

    let mut wizard = RegistrationWizard::resume(gateway, &config.wizard)?;
    if wizard.is_submitted() {
        println!(
            "Registration already finalized ({})",
            wizard.profile().status.label()
        );
        return Ok(());
    }

    loop {
        let step = wizard.current_step();
        fill_step(&mut wizard, step, &answers)?;
        match wizard.next() {
            Ok(StepOutcome::Advanced(next)) => println!("Saved {step}; now on {next}"),
            Ok(StepOutcome::Submitted(receipt)) => {
                println!("Registration submitted");
                println!("{}", serde_json::to_string_pretty(&receipt)?);
                return Ok(());
            }
            Err(err) => {
                println!("Could not save {step}: {}", err.user_message());
                return Err(err.into());
            }
        }
    }
}

fn fill_step<G>(
    wizard: &mut RegistrationWizard<G>,
    step: WizardStep,
    answers: &RegistrationAnswers,
) -> Result<(), AppError>
where
    G: AdmissionsGateway + 'static,
{
    match step {
        WizardStep::Identity => {
            wizard.edit_identity(|section| *section = answers.identity.clone())?;
        }
        WizardStep::Address => fill_address(wizard, &answers.address)?,
        WizardStep::Academic => {
            wizard.edit_academic(|section| *section = answers.academic.clone())?;
        }
        WizardStep::Achievements => {
            wizard.edit_achievements(|list| *list = answers.achievements.clone())?;
        }
        WizardStep::Guardians => {
            for (relationship, details) in guardian_answers(answers)? {
                wizard.edit_guardian(relationship, |slot| *slot = details)?;
            }
        }
    }
    Ok(())
}

fn guardian_answers(
    answers: &RegistrationAnswers,
) -> Result<Vec<(Relationship, GuardianDetails)>, AppError> {
    answers
        .guardian_slots()
        .map_err(|err| AppError::Io(io::Error::new(io::ErrorKind::InvalidData, err.to_string())))
}

fn find_province<'a>(provinces: &'a [Province], wanted: &str) -> Option<&'a Province> {
    provinces
        .iter()
        .find(|province| province.id.0 == wanted || province.name.eq_ignore_ascii_case(wanted))
}

fn fill_address<G>(
    wizard: &mut RegistrationWizard<G>,
    address: &AddressAnswers,
) -> Result<(), AppError>
where
    G: AdmissionsGateway + 'static,
{
    wizard.enter_address()?;

    if let Some(province_id) =
        find_province(wizard.regions().provinces(), &address.province).map(|p| p.id.clone())
    {
        if let CityLoadOutcome::Failed(message) = wizard.select_province(&province_id)? {
            println!("City list unavailable: {message}");
        }
        let city_id = match wizard.regions().city_picker() {
            CityPicker::Ready(cities) => cities
                .iter()
                .find(|city| {
                    city.id.0 == address.city || city.name.eq_ignore_ascii_case(&address.city)
                })
                .map(|city| city.id.clone()),
            _ => None,
        };
        if let Some(city_id) = city_id {
            wizard.select_city(&city_id)?;
        }
    }

    wizard.set_sub_district(address.sub_district.clone())?;
    wizard.set_ward(address.ward.clone())?;
    wizard.edit_address(|section| {
        section.postal_code = address.postal_code.clone();
        section.hamlet = address.hamlet.clone();
        section.address_line = address.address_line.clone();
    })?;
    Ok(())
}

/// Validates every step locally and prints what Finish would do to the guardians.
fn dry_run<G>(gateway: &G, answers: &RegistrationAnswers) -> Result<(), AppError>
where
    G: AdmissionsGateway + ?Sized,
{
    let today = Local::now().date_naive();
    let provinces = gateway.provinces()?;
    let mut address = AddressSection {
        sub_district: Some(answers.address.sub_district.clone()).filter(|v| !v.trim().is_empty()),
        ward: Some(answers.address.ward.clone()).filter(|v| !v.trim().is_empty()),
        postal_code: answers.address.postal_code.clone(),
        hamlet: answers.address.hamlet.clone(),
        address_line: answers.address.address_line.clone(),
        ..AddressSection::default()
    };
    if let Some(province) = find_province(&provinces, &answers.address.province) {
        address.province = Some(province.name.clone());
        address.city = gateway
            .cities(&province.id)?
            .into_iter()
            .find(|city| {
                city.id.0 == answers.address.city
                    || city.name.eq_ignore_ascii_case(&answers.address.city)
            })
            .map(|city| city.name);
    }

    let mut roster = GuardianRoster::from_remote(&gateway.guardians()?);
    for (relationship, details) in guardian_answers(answers)? {
        roster.slot_mut(relationship).details = details;
    }

    let checks: [(WizardStep, Result<(), ValidationErrors>); 5] = [
        (WizardStep::Identity, validate_identity(&answers.identity, today)),
        (WizardStep::Address, validate_address(&address)),
        (WizardStep::Academic, validate_academic(&answers.academic, today)),
        (
            WizardStep::Achievements,
            validate_achievements(&answers.achievements, today),
        ),
        (WizardStep::Guardians, validate_guardians(&roster)),
    ];
    let mut failures = 0;
    for (step, result) in checks {
        match result {
            Ok(()) => println!("{step}: ok"),
            Err(errors) => {
                failures += 1;
                println!("{step}: {errors}");
            }
        }
    }

    println!("Guardian plan:");
    for (relationship, action) in GuardianSyncEngine.plan(&roster) {
        println!("  {:<8} {}", relationship.label(), describe(relationship, &action));
    }

    if failures > 0 {
        println!("{failures} step(s) need attention before registering");
    }
    Ok(())
}

fn describe(relationship: Relationship, action: &SyncAction) -> String {
    match action {
        SyncAction::NoOp => "no change".to_string(),
        SyncAction::Create(payload) => {
            format!("create {} ({})", payload.full_name, relationship.wire_value())
        }
        SyncAction::Update(id, payload) => format!("update {} -> {}", id, payload.full_name),
        SyncAction::Delete(id) => format!("delete {}", id),
    }
}
