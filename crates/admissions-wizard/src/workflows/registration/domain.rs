use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Backend identifiers arrive as either JSON strings or numbers; both are kept as text.
fn id_from_wire<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Text(value) => Ok(value),
        RawId::Number(value) => Ok(value.to_string()),
    }
}

/// Identifier of a province or city node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(#[serde(deserialize_with = "id_from_wire")] pub String);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote identifier of a guardian record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuardianId(#[serde(deserialize_with = "id_from_wire")] pub String);

impl fmt::Display for GuardianId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Province {
    pub id: RegionId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: RegionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province_id: Option<RegionId>,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraduationStatus {
    Graduated,
    NotGraduated,
}

/// Opaque handle to a document uploaded by the host's file picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRef(pub String);

/// Lifecycle of the registration as reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    #[default]
    Draft,
    Submitted,
    UnderReview,
    Accepted,
    Rejected,
}

impl RegistrationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RegistrationStatus::Draft => "draft",
            RegistrationStatus::Submitted => "submitted",
            RegistrationStatus::UnderReview => "under_review",
            RegistrationStatus::Accepted => "accepted",
            RegistrationStatus::Rejected => "rejected",
        }
    }

    /// Everything past `Draft` has been finalized and can no longer be edited.
    pub const fn is_locked(self) -> bool {
        !matches!(self, RegistrationStatus::Draft)
    }
}

/// Fields collected on the Identity step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_choice_program: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_choice_program: Option<String>,
}

/// Fields collected on the Address step. Province and city carry display names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ward: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hamlet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line: Option<String>,
}

/// Fields collected on the Academic step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcademicSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_school: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graduation_status: Option<GraduationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diploma_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graduation_year: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_document: Option<DocumentRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diploma_document: Option<DocumentRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_card_document: Option<DocumentRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementLevel {
    School,
    Regional,
    National,
    International,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub title: String,
    pub level: AchievementLevel,
    pub year: u16,
}

/// The applicant's single registration record.
///
/// Sections flatten into one JSON object because the backend validates the
/// whole record on every write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(flatten)]
    pub identity: IdentitySection,
    #[serde(flatten)]
    pub address: AddressSection,
    #[serde(flatten)]
    pub academic: AcademicSection,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
    /// Owned by the backend; never written back.
    #[serde(default, skip_serializing)]
    pub status: RegistrationStatus,
}

/// Status record returned by the finalize call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationStatusRecord {
    pub status: RegistrationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Guardian relationship slots, in the fixed order they are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Father,
    Mother,
    Guardian,
}

/// Display label and wire value per relationship. The single source for both directions.
const RELATIONSHIP_LABELS: [(Relationship, &str, &str); 3] = [
    (Relationship::Father, "Father", "father"),
    (Relationship::Mother, "Mother", "mother"),
    (Relationship::Guardian, "Guardian", "guardian"),
];

impl Relationship {
    pub const fn ordered() -> [Self; 3] {
        [Self::Father, Self::Mother, Self::Guardian]
    }

    pub const fn index(self) -> usize {
        match self {
            Self::Father => 0,
            Self::Mother => 1,
            Self::Guardian => 2,
        }
    }

    pub fn label(self) -> &'static str {
        RELATIONSHIP_LABELS[self.index()].1
    }

    pub fn wire_value(self) -> &'static str {
        RELATIONSHIP_LABELS[self.index()].2
    }

    /// Accepts either the display label or the wire value, case-insensitively.
    pub fn from_label(raw: &str) -> Option<Self> {
        let needle = raw.trim();
        RELATIONSHIP_LABELS
            .iter()
            .find(|(_, label, wire)| {
                label.eq_ignore_ascii_case(needle) || wire.eq_ignore_ascii_case(needle)
            })
            .map(|(relationship, _, _)| *relationship)
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Editable guardian fields as the applicant sees them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardianDetails {
    pub full_name: String,
    pub address: String,
    pub phone: String,
    pub occupation: String,
    pub last_education: String,
    pub income_bracket: String,
}

impl GuardianDetails {
    pub fn is_blank(&self) -> bool {
        self.full_name.trim().is_empty()
    }
}

/// Guardian record as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guardian {
    pub id: GuardianId,
    pub relationship: Relationship,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_education: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income_bracket: Option<String>,
}

impl Guardian {
    pub fn details(&self) -> GuardianDetails {
        GuardianDetails {
            full_name: self.full_name.clone(),
            address: self.address.clone().unwrap_or_default(),
            phone: self.phone.clone().unwrap_or_default(),
            occupation: self.occupation.clone().unwrap_or_default(),
            last_education: self.last_education.clone().unwrap_or_default(),
            income_bracket: self.income_bracket.clone().unwrap_or_default(),
        }
    }
}

/// Body of a guardian create or update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianPayload {
    pub relationship: Relationship,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_education: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income_bracket: Option<String>,
}

impl GuardianPayload {
    pub fn into_guardian(self, id: GuardianId) -> Guardian {
        Guardian {
            id,
            relationship: self.relationship,
            full_name: self.full_name,
            address: self.address,
            phone: self.phone,
            occupation: self.occupation,
            last_education: self.last_education,
            income_bracket: self.income_bracket,
        }
    }
}
