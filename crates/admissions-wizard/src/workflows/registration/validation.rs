use std::fmt;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use super::domain::{
    AcademicSection, Achievement, AddressSection, GraduationStatus, IdentitySection, Profile,
};
use super::guardians::GuardianRoster;
use super::sequencer::WizardStep;

const EARLIEST_YEAR: i32 = 1950;

/// Profile keys the backend requires once a step has been saved.
pub const fn required_fields(step: WizardStep) -> &'static [&'static str] {
    match step {
        WizardStep::Identity => &[
            "full_name",
            "gender",
            "national_id",
            "birth_place",
            "birth_date",
            "email",
            "phone",
            "first_choice_program",
        ],
        WizardStep::Address => &[
            "province",
            "city",
            "sub_district",
            "ward",
            "postal_code",
            "address_line",
        ],
        WizardStep::Academic => &[
            "origin_school",
            "graduation_status",
            "diploma_type",
            "photo_document",
        ],
        WizardStep::Achievements | WizardStep::Guardians => &[],
    }
}

fn pattern(cell: &'static OnceLock<Regex>, source: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("static pattern compiles"))
}

fn national_id_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    pattern(&CELL, r"^\d{16}$")
}

fn phone_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    pattern(&CELL, r"^\+?\d{10,15}$")
}

fn email_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    pattern(&CELL, r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
}

fn postal_code_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    pattern(&CELL, r"^\d{5}$")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldProblem {
    Required,
    Format(&'static str),
    InFuture,
    OutOfRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub problem: FieldProblem,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.problem {
            FieldProblem::Required => write!(f, "{} is required", self.field),
            FieldProblem::Format(expected) => write!(f, "{} must be {}", self.field, expected),
            FieldProblem::InFuture => write!(f, "{} cannot be in the future", self.field),
            FieldProblem::OutOfRange => write!(f, "{} is out of range", self.field),
        }
    }
}

/// Every local problem found on a step, surfaced together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }

    fn push(&mut self, field: impl Into<String>, problem: FieldProblem) {
        self.errors.push(FieldError {
            field: field.into(),
            problem,
        });
    }

    fn require(&mut self, field: &'static str, value: Option<&str>) -> Option<String> {
        match value.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => Some(value.to_string()),
            None => {
                self.push(field, FieldProblem::Required);
                None
            }
        }
    }

    fn require_present<T>(&mut self, field: &'static str, value: Option<&T>) -> bool {
        if value.is_none() {
            self.push(field, FieldProblem::Required);
        }
        value.is_some()
    }

    fn check_format(
        &mut self,
        field: impl Into<String>,
        value: &str,
        pattern: &Regex,
        expected: &'static str,
    ) {
        if !pattern.is_match(value) {
            self.push(field, FieldProblem::Format(expected));
        }
    }

    fn check_year(&mut self, field: impl Into<String>, year: u16, today: NaiveDate) {
        let field = field.into();
        let year = i32::from(year);
        if year > today.year() {
            self.push(field, FieldProblem::InFuture);
        } else if year < EARLIEST_YEAR {
            self.push(field, FieldProblem::OutOfRange);
        }
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

pub fn validate_identity(
    identity: &IdentitySection,
    today: NaiveDate,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    errors.require("full_name", identity.full_name.as_deref());
    errors.require_present("gender", identity.gender.as_ref());
    if let Some(national_id) = errors.require("national_id", identity.national_id.as_deref()) {
        errors.check_format(
            "national_id",
            &national_id,
            national_id_pattern(),
            "16 digits",
        );
    }
    errors.require("birth_place", identity.birth_place.as_deref());
    if errors.require_present("birth_date", identity.birth_date.as_ref()) {
        if let Some(birth_date) = identity.birth_date {
            if birth_date > today {
                errors.push("birth_date", FieldProblem::InFuture);
            }
        }
    }
    if let Some(email) = errors.require("email", identity.email.as_deref()) {
        errors.check_format("email", &email, email_pattern(), "a valid email address");
    }
    if let Some(phone) = errors.require("phone", identity.phone.as_deref()) {
        errors.check_format("phone", &phone, phone_pattern(), "10-15 digits");
    }
    errors.require(
        "first_choice_program",
        identity.first_choice_program.as_deref(),
    );

    errors.into_result()
}

pub fn validate_address(address: &AddressSection) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    errors.require("province", address.province.as_deref());
    errors.require("city", address.city.as_deref());
    errors.require("sub_district", address.sub_district.as_deref());
    errors.require("ward", address.ward.as_deref());
    if let Some(postal_code) = errors.require("postal_code", address.postal_code.as_deref()) {
        errors.check_format("postal_code", &postal_code, postal_code_pattern(), "5 digits");
    }
    errors.require("address_line", address.address_line.as_deref());

    errors.into_result()
}

pub fn validate_academic(
    academic: &AcademicSection,
    today: NaiveDate,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    errors.require("origin_school", academic.origin_school.as_deref());
    errors.require_present("graduation_status", academic.graduation_status.as_ref());
    errors.require("diploma_type", academic.diploma_type.as_deref());
    errors.require_present("photo_document", academic.photo_document.as_ref());

    if academic.graduation_status == Some(GraduationStatus::Graduated) {
        if errors.require_present("graduation_year", academic.graduation_year.as_ref()) {
            if let Some(year) = academic.graduation_year {
                errors.check_year("graduation_year", year, today);
            }
        }
        errors.require_present("diploma_document", academic.diploma_document.as_ref());
    }

    errors.into_result()
}

pub fn validate_achievements(
    achievements: &[Achievement],
    today: NaiveDate,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    for (index, achievement) in achievements.iter().enumerate() {
        if achievement.title.trim().is_empty() {
            errors.push(format!("achievements[{index}].title"), FieldProblem::Required);
        }
        errors.check_year(format!("achievements[{index}].year"), achievement.year, today);
    }

    errors.into_result()
}

pub fn validate_guardians(roster: &GuardianRoster) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    for slot in roster.slots() {
        if slot.details.is_blank() {
            continue;
        }
        let phone = slot.details.phone.trim();
        if !phone.is_empty() {
            errors.check_format(
                format!("{}.phone", slot.relationship.wire_value()),
                phone,
                phone_pattern(),
                "10-15 digits",
            );
        }
    }

    errors.into_result()
}

/// Runs the checks for `step` against the local draft.
pub fn validate_step(
    step: WizardStep,
    draft: &Profile,
    guardians: &GuardianRoster,
    today: NaiveDate,
) -> Result<(), ValidationErrors> {
    match step {
        WizardStep::Identity => validate_identity(&draft.identity, today),
        WizardStep::Address => validate_address(&draft.address),
        WizardStep::Academic => validate_academic(&draft.academic, today),
        WizardStep::Achievements => validate_achievements(&draft.achievements, today),
        WizardStep::Guardians => validate_guardians(guardians),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::registration::domain::{DocumentRef, Gender, Relationship};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date")
    }

    fn identity() -> IdentitySection {
        IdentitySection {
            full_name: Some("Siti Rahma".to_string()),
            gender: Some(Gender::Female),
            national_id: Some("3273014501070001".to_string()),
            birth_place: Some("Bandung".to_string()),
            birth_date: NaiveDate::from_ymd_opt(2007, 1, 5),
            email: Some("siti@example.com".to_string()),
            phone: Some("081234567890".to_string()),
            first_choice_program: Some("informatics".to_string()),
            second_choice_program: None,
        }
    }

    #[test]
    fn complete_identity_passes() {
        assert_eq!(validate_identity(&identity(), today()), Ok(()));
    }

    #[test]
    fn identity_collects_every_problem() {
        let mut identity = identity();
        identity.full_name = Some("   ".to_string());
        identity.national_id = Some("12345".to_string());
        identity.phone = Some("08-12".to_string());
        identity.birth_date = NaiveDate::from_ymd_opt(2030, 1, 1);

        let errors = validate_identity(&identity, today()).expect_err("invalid identity");
        assert!(errors.has_field("full_name"));
        assert!(errors.has_field("national_id"));
        assert!(errors.has_field("phone"));
        assert!(errors.has_field("birth_date"));
        assert!(errors.to_string().contains("national_id must be 16 digits"));
    }

    #[test]
    fn same_program_may_fill_both_choices() {
        let mut identity = identity();
        identity.second_choice_program = identity.first_choice_program.clone();
        assert_eq!(validate_identity(&identity, today()), Ok(()));
    }

    #[test]
    fn address_requires_region_and_postal_code_shape() {
        let address = AddressSection {
            province: Some("Jawa Barat".to_string()),
            city: None,
            sub_district: Some("Coblong".to_string()),
            ward: Some("Dago".to_string()),
            postal_code: Some("4013".to_string()),
            hamlet: None,
            address_line: Some("Jl. Ir. H. Juanda 10".to_string()),
        };
        let errors = validate_address(&address).expect_err("missing city");
        assert!(errors.has_field("city"));
        assert!(errors.has_field("postal_code"));
        assert!(!errors.has_field("hamlet"));
    }

    #[test]
    fn graduated_applicants_need_year_and_diploma() {
        let academic = AcademicSection {
            origin_school: Some("SMAN 3 Bandung".to_string()),
            graduation_status: Some(GraduationStatus::Graduated),
            diploma_type: Some("SMA".to_string()),
            graduation_year: Some(2031),
            photo_document: Some(DocumentRef("file-photo".to_string())),
            diploma_document: None,
            report_card_document: None,
        };
        let errors = validate_academic(&academic, today()).expect_err("incomplete");
        assert!(errors.has_field("graduation_year"));
        assert!(errors.has_field("diploma_document"));

        let pending = AcademicSection {
            graduation_status: Some(GraduationStatus::NotGraduated),
            graduation_year: None,
            ..academic
        };
        assert_eq!(validate_academic(&pending, today()), Ok(()));
    }

    #[test]
    fn achievements_are_optional_but_checked() {
        assert_eq!(validate_achievements(&[], today()), Ok(()));
        let errors = validate_achievements(
            &[Achievement {
                title: " ".to_string(),
                level: crate::workflows::registration::domain::AchievementLevel::National,
                year: 1890,
            }],
            today(),
        )
        .expect_err("bad entry");
        assert!(errors.has_field("achievements[0].title"));
        assert!(errors.has_field("achievements[0].year"));
    }

    #[test]
    fn blank_roster_passes_and_named_phones_are_checked() {
        assert_eq!(validate_guardians(&GuardianRoster::default()), Ok(()));

        let mut roster = GuardianRoster::default();
        let mother = roster.slot_mut(Relationship::Mother);
        mother.details.full_name = "Jane Doe".to_string();
        mother.details.phone = "12".to_string();
        let errors = validate_guardians(&roster).expect_err("bad phone");
        assert!(errors.has_field("mother.phone"));
    }
}
