//! In-memory admissions backend serving the same routes as the production API.
//!
//! The sandbox keeps one applicant's registration. It rejects a profile write
//! that drops required fields of any step already saved, which is what forces
//! the wizard to send complete records.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::domain::{
    City, Guardian, GuardianId, GuardianPayload, Profile, Province, RegionId,
    RegistrationStatus, RegistrationStatusRecord,
};
use super::sequencer::WizardStep;
use super::validation::required_fields;

#[derive(Debug, Default)]
struct SandboxStore {
    provinces: Vec<Province>,
    cities: BTreeMap<RegionId, Vec<City>>,
    profile: Option<Map<String, Value>>,
    status: RegistrationStatus,
    guardians: BTreeMap<u64, Guardian>,
    next_guardian_id: u64,
    submissions: u32,
}

/// Shared handle to the sandbox data; clones see the same store.
#[derive(Debug, Clone, Default)]
pub struct SandboxState {
    store: Arc<Mutex<SandboxStore>>,
    token: Option<Arc<str>>,
}

impl SandboxState {
    /// Provinces and cities for a handful of regions. Kalimantan Utara has no
    /// cities so the empty picker can be exercised.
    pub fn seeded() -> Self {
        let provinces = [
            ("11", "Aceh"),
            ("31", "DKI Jakarta"),
            ("32", "Jawa Barat"),
            ("35", "Jawa Timur"),
            ("65", "Kalimantan Utara"),
        ];
        let cities: [(&str, &str, &str); 7] = [
            ("11", "1171", "Kota Banda Aceh"),
            ("31", "3171", "Kota Jakarta Selatan"),
            ("31", "3172", "Kota Jakarta Timur"),
            ("32", "3201", "Kabupaten Bogor"),
            ("32", "3273", "Kota Bandung"),
            ("35", "3507", "Kabupaten Malang"),
            ("35", "3578", "Kota Surabaya"),
        ];

        let mut store = SandboxStore {
            provinces: provinces
                .iter()
                .map(|(id, name)| Province {
                    id: RegionId((*id).to_string()),
                    name: (*name).to_string(),
                })
                .collect(),
            next_guardian_id: 1,
            ..SandboxStore::default()
        };
        for province in &store.provinces {
            store.cities.insert(province.id.clone(), Vec::new());
        }
        for (province_id, id, name) in cities {
            let province_id = RegionId(province_id.to_string());
            store
                .cities
                .entry(province_id.clone())
                .or_default()
                .push(City {
                    id: RegionId(id.to_string()),
                    province_id: Some(province_id),
                    name: name.to_string(),
                });
        }

        Self {
            store: Arc::new(Mutex::new(store)),
            token: None,
        }
    }

    /// Requires `Authorization: Bearer <token>` on every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(Arc::from(token.into()));
        self
    }

    /// Pre-loads a saved profile, e.g. to resume a registration.
    pub fn with_profile(self, profile: &Profile, status: RegistrationStatus) -> Self {
        if let Ok(mut store) = self.store.lock() {
            if let Ok(Value::Object(map)) = serde_json::to_value(profile) {
                store.profile = Some(map);
            }
            store.status = status;
        }
        self
    }

    /// Pre-loads a guardian record under a fixed numeric id.
    pub fn with_guardian(self, id: u64, payload: GuardianPayload) -> Self {
        if let Ok(mut store) = self.store.lock() {
            store
                .guardians
                .insert(id, payload.into_guardian(GuardianId(id.to_string())));
            store.next_guardian_id = store.next_guardian_id.max(id + 1);
        }
        self
    }

    pub fn guardians(&self) -> Vec<Guardian> {
        self.store
            .lock()
            .map(|store| store.guardians.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn stored_profile(&self) -> Option<Map<String, Value>> {
        self.store
            .lock()
            .ok()
            .and_then(|store| store.profile.clone())
    }

    pub fn status(&self) -> RegistrationStatus {
        self.store
            .lock()
            .map(|store| store.status)
            .unwrap_or_default()
    }

    pub fn submissions(&self) -> u32 {
        self.store
            .lock()
            .map(|store| store.submissions)
            .unwrap_or_default()
    }
}

/// Router exposing the admissions API under `/api`.
pub fn router(state: SandboxState) -> Router {
    Router::new()
        .route("/api/provinces", get(provinces_handler))
        .route("/api/cities", get(cities_handler))
        .route(
            "/api/profile",
            get(profile_handler).put(upsert_profile_handler),
        )
        .route(
            "/api/guardians",
            get(guardians_handler).post(create_guardian_handler),
        )
        .route(
            "/api/guardians/:guardian_id",
            put(update_guardian_handler).delete(delete_guardian_handler),
        )
        .route("/api/registration/submit", post(submit_handler))
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "message": message.into() }))).into_response()
}

/// Checks the bearer token and locks the store.
fn open<'a>(
    state: &'a SandboxState,
    headers: &HeaderMap,
) -> Result<MutexGuard<'a, SandboxStore>, Response> {
    if let Some(expected) = state.token.as_deref() {
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        if presented != Some(expected) {
            return Err(error_response(
                StatusCode::UNAUTHORIZED,
                "authentication required",
            ));
        }
    }

    state.store.lock().map_err(|_| {
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "sandbox store unavailable")
    })
}

fn profile_body(store: &SandboxStore, profile: &Map<String, Value>) -> Value {
    let mut body = profile.clone();
    body.insert("status".to_string(), json!(store.status));
    Value::Object(body)
}

pub(crate) async fn provinces_handler(
    State(state): State<SandboxState>,
    headers: HeaderMap,
) -> Response {
    match open(&state, &headers) {
        Ok(store) => (StatusCode::OK, Json(store.provinces.clone())).into_response(),
        Err(response) => response,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CityQuery {
    province_id: String,
}

pub(crate) async fn cities_handler(
    State(state): State<SandboxState>,
    headers: HeaderMap,
    Query(query): Query<CityQuery>,
) -> Response {
    let store = match open(&state, &headers) {
        Ok(store) => store,
        Err(response) => return response,
    };
    match store.cities.get(&RegionId(query.province_id)) {
        Some(cities) => (StatusCode::OK, Json(cities.clone())).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "province not found"),
    }
}

pub(crate) async fn profile_handler(
    State(state): State<SandboxState>,
    headers: HeaderMap,
) -> Response {
    let store = match open(&state, &headers) {
        Ok(store) => store,
        Err(response) => return response,
    };
    match &store.profile {
        Some(profile) => (StatusCode::OK, Json(profile_body(&store, profile))).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "profile not found"),
    }
}

fn has_value(record: &Map<String, Value>, key: &str) -> bool {
    match record.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(_) => true,
    }
}

/// Every step that has any required field, in the stored record or the
/// incoming one, must carry all of its required fields in the incoming one.
fn missing_required(
    stored: Option<&Map<String, Value>>,
    incoming: &Map<String, Value>,
) -> Option<&'static str> {
    WizardStep::ordered().into_iter().find_map(|step| {
        let fields = required_fields(step);
        let touched = fields.iter().any(|field| {
            has_value(incoming, field) || stored.is_some_and(|record| has_value(record, field))
        });
        if !touched {
            return None;
        }
        fields
            .iter()
            .copied()
            .find(|field| !has_value(incoming, field))
    })
}

pub(crate) async fn upsert_profile_handler(
    State(state): State<SandboxState>,
    headers: HeaderMap,
    Json(mut incoming): Json<Map<String, Value>>,
) -> Response {
    let mut store = match open(&state, &headers) {
        Ok(store) => store,
        Err(response) => return response,
    };
    if store.status.is_locked() {
        return error_response(
            StatusCode::CONFLICT,
            "registration has already been submitted",
        );
    }

    incoming.remove("status");
    if let Err(err) = serde_json::from_value::<Profile>(Value::Object(incoming.clone())) {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, err.to_string());
    }
    if let Some(field) = missing_required(store.profile.as_ref(), &incoming) {
        debug!(field, "sandbox rejected incomplete profile");
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("{field} is required"),
        );
    }

    let body = profile_body(&store, &incoming);
    // No server-side merge: the incoming record replaces the stored one.
    store.profile = Some(incoming);
    (StatusCode::OK, Json(body)).into_response()
}

pub(crate) async fn guardians_handler(
    State(state): State<SandboxState>,
    headers: HeaderMap,
) -> Response {
    let store = match open(&state, &headers) {
        Ok(store) => store,
        Err(response) => return response,
    };
    if store.guardians.is_empty() {
        // The production API answers an empty collection with 404.
        return error_response(StatusCode::NOT_FOUND, "no guardians recorded");
    }
    let guardians: Vec<Guardian> = store.guardians.values().cloned().collect();
    (StatusCode::OK, Json(guardians)).into_response()
}

fn check_guardian_write(
    store: &SandboxStore,
    payload: &GuardianPayload,
    except: Option<u64>,
) -> Result<(), Response> {
    if store.status.is_locked() {
        return Err(error_response(
            StatusCode::CONFLICT,
            "registration has already been submitted",
        ));
    }
    if payload.full_name.trim().is_empty() {
        return Err(error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "full_name is required",
        ));
    }
    let taken = store
        .guardians
        .iter()
        .any(|(id, guardian)| Some(*id) != except && guardian.relationship == payload.relationship);
    if taken {
        return Err(error_response(
            StatusCode::CONFLICT,
            format!("a {} record already exists", payload.relationship.wire_value()),
        ));
    }
    Ok(())
}

pub(crate) async fn create_guardian_handler(
    State(state): State<SandboxState>,
    headers: HeaderMap,
    Json(payload): Json<GuardianPayload>,
) -> Response {
    let mut store = match open(&state, &headers) {
        Ok(store) => store,
        Err(response) => return response,
    };
    if let Err(response) = check_guardian_write(&store, &payload, None) {
        return response;
    }

    let id = store.next_guardian_id;
    store.next_guardian_id += 1;
    let guardian = payload.into_guardian(GuardianId(id.to_string()));
    store.guardians.insert(id, guardian.clone());
    (StatusCode::CREATED, Json(guardian)).into_response()
}

pub(crate) async fn update_guardian_handler(
    State(state): State<SandboxState>,
    headers: HeaderMap,
    Path(guardian_id): Path<u64>,
    Json(payload): Json<GuardianPayload>,
) -> Response {
    let mut store = match open(&state, &headers) {
        Ok(store) => store,
        Err(response) => return response,
    };
    if !store.guardians.contains_key(&guardian_id) {
        return error_response(StatusCode::NOT_FOUND, "guardian not found");
    }
    if let Err(response) = check_guardian_write(&store, &payload, Some(guardian_id)) {
        return response;
    }

    let guardian = payload.into_guardian(GuardianId(guardian_id.to_string()));
    store.guardians.insert(guardian_id, guardian.clone());
    (StatusCode::OK, Json(guardian)).into_response()
}

pub(crate) async fn delete_guardian_handler(
    State(state): State<SandboxState>,
    headers: HeaderMap,
    Path(guardian_id): Path<u64>,
) -> Response {
    let mut store = match open(&state, &headers) {
        Ok(store) => store,
        Err(response) => return response,
    };
    if store.status.is_locked() {
        return error_response(
            StatusCode::CONFLICT,
            "registration has already been submitted",
        );
    }
    match store.guardians.remove(&guardian_id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => error_response(StatusCode::NOT_FOUND, "guardian not found"),
    }
}

pub(crate) async fn submit_handler(
    State(state): State<SandboxState>,
    headers: HeaderMap,
) -> Response {
    let mut store = match open(&state, &headers) {
        Ok(store) => store,
        Err(response) => return response,
    };
    if store.status.is_locked() {
        return error_response(
            StatusCode::CONFLICT,
            "registration has already been submitted",
        );
    }
    let Some(profile) = store.profile.as_ref() else {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, "profile is incomplete");
    };
    let incomplete = [WizardStep::Identity, WizardStep::Address, WizardStep::Academic]
        .into_iter()
        .flat_map(required_fields)
        .copied()
        .find(|field| !has_value(profile, field));
    if let Some(field) = incomplete {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("{field} is required"),
        );
    }
    if store.guardians.is_empty() {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "at least one parent or guardian is required",
        );
    }

    store.submissions += 1;
    let submitted_at = Utc::now();
    let record = RegistrationStatusRecord {
        status: RegistrationStatus::UnderReview,
        registration_number: Some(format!(
            "REG-{}-{:05}",
            submitted_at.year(),
            store.submissions
        )),
        submitted_at: Some(submitted_at),
    };
    store.status = record.status;
    info!(
        registration_number = record.registration_number.as_deref().unwrap_or("-"),
        "sandbox registration submitted"
    );
    (StatusCode::OK, Json(record)).into_response()
}
