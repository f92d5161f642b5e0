use admissions_wizard::config::AppConfig;
use admissions_wizard::error::AppError;
use admissions_wizard::workflows::registration::{
    AcademicSection, Achievement, GuardianDetails, HttpAdmissionsGateway, IdentitySection,
    Relationship, StaticToken,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn build_gateway(config: &AppConfig) -> Result<HttpAdmissionsGateway, AppError> {
    let tokens = Arc::new(StaticToken::new(config.api.token.clone()));
    Ok(HttpAdmissionsGateway::from_config(&config.api, tokens)?)
}

/// Address answers. Province and city may be given by id or by name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AddressAnswers {
    pub(crate) province: String,
    pub(crate) city: String,
    pub(crate) sub_district: String,
    pub(crate) ward: String,
    pub(crate) postal_code: Option<String>,
    pub(crate) hamlet: Option<String>,
    pub(crate) address_line: Option<String>,
}

/// Everything the `register` command types into the wizard.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RegistrationAnswers {
    pub(crate) identity: IdentitySection,
    pub(crate) address: AddressAnswers,
    pub(crate) academic: AcademicSection,
    pub(crate) achievements: Vec<Achievement>,
    /// Keyed by relationship label or wire value. Omitted slots keep their saved data.
    pub(crate) guardians: BTreeMap<String, GuardianDetails>,
}

impl RegistrationAnswers {
    pub(crate) fn from_path(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Guardian answers in Father, Mother, Guardian order. Unknown keys are reported.
    pub(crate) fn guardian_slots(
        &self,
    ) -> Result<Vec<(Relationship, GuardianDetails)>, UnknownRelationship> {
        let mut slots = self
            .guardians
            .iter()
            .map(|(label, details)| {
                Relationship::from_label(label)
                    .map(|relationship| (relationship, details.clone()))
                    .ok_or_else(|| UnknownRelationship(label.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        slots.sort_by_key(|(relationship, _)| *relationship);
        Ok(slots)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UnknownRelationship(pub(crate) String);

impl std::fmt::Display for UnknownRelationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown guardian relationship '{}' (expected Father, Mother or Guardian)",
            self.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn answers_file_parses_with_labels() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{
                "identity": {{ "full_name": "Siti Rahma", "gender": "female" }},
                "address": {{ "province": "Jawa Barat", "city": "3273", "ward": "Dago" }},
                "guardians": {{
                    "Mother": {{ "full_name": "Jane Doe" }},
                    "father": {{ "full_name": "" }}
                }}
            }}"#
        )
        .expect("write answers");

        let answers = RegistrationAnswers::from_path(file.path()).expect("answers parse");
        assert_eq!(answers.identity.full_name.as_deref(), Some("Siti Rahma"));
        assert_eq!(answers.address.city, "3273");
        assert!(answers.achievements.is_empty());

        let slots = answers.guardian_slots().expect("labels resolve");
        assert_eq!(slots[0].0, Relationship::Father);
        assert!(slots[0].1.is_blank());
        assert_eq!(slots[1].0, Relationship::Mother);
        assert_eq!(slots[1].1.full_name, "Jane Doe");
    }

    #[test]
    fn unknown_relationship_is_reported() {
        let mut answers = RegistrationAnswers::default();
        answers
            .guardians
            .insert("Uncle".to_string(), GuardianDetails::default());
        assert_eq!(
            answers.guardian_slots(),
            Err(UnknownRelationship("Uncle".to_string()))
        );
    }

    #[test]
    fn malformed_answers_are_decode_errors() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{ not json").expect("write answers");
        match RegistrationAnswers::from_path(file.path()) {
            Err(AppError::Decode(_)) => {}
            other => panic!("expected decode error, got {other:?}"),
        }
    }
}
