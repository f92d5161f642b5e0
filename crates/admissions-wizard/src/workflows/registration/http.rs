use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use super::domain::{
    City, Guardian, GuardianId, GuardianPayload, Profile, Province, RegionId,
    RegistrationStatusRecord,
};
use super::gateway::{AdmissionsGateway, GatewayError};
use crate::config::ApiConfig;

/// Request-layer capability supplying the session's bearer token.
pub trait AccessTokenProvider: Debug + Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Token fixed at construction, e.g. read from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token)
    }
}

impl AccessTokenProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// REST client for the admissions backend.
///
/// The host drives the wizard synchronously, so each call blocks on a private
/// runtime. Do not call it from inside another Tokio runtime.
pub struct HttpAdmissionsGateway {
    client: Client,
    base_url: String,
    tokens: Arc<dyn AccessTokenProvider>,
    runtime: Runtime,
}

impl HttpAdmissionsGateway {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Option<Duration>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self, GatewayError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(Self::map_error)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| GatewayError::Transport(format!("runtime unavailable: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            runtime,
        })
    }

    pub fn from_config(
        config: &ApiConfig,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self, GatewayError> {
        Self::new(config.base_url.clone(), config.timeout, tokens)
    }

    fn map_error(err: reqwest::Error) -> GatewayError {
        GatewayError::Transport(err.to_string())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        match self.tokens.bearer_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends the request and returns the raw body of a 2xx response.
    fn execute(&self, resource: &str, request: RequestBuilder) -> Result<String, GatewayError> {
        let (status, body) = self.runtime.block_on(async {
            let response = request.send().await.map_err(Self::map_error)?;
            let status = response.status();
            let body = response.text().await.map_err(Self::map_error)?;
            Ok::<_, GatewayError>((status, body))
        })?;

        debug!(resource, status = status.as_u16(), "admissions api responded");

        if status.is_success() {
            return Ok(body);
        }

        let message = error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

        let error = if status == StatusCode::NOT_FOUND {
            GatewayError::NotFound {
                resource: resource.to_string(),
            }
        } else if status.is_server_error() {
            GatewayError::Server {
                status: status.as_u16(),
                message,
            }
        } else {
            GatewayError::Rejected {
                status: status.as_u16(),
                message,
            }
        };

        warn!(resource, status = status.as_u16(), error = %error, "admissions api call failed");
        Err(error)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        request: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let body = self.execute(resource, request)?;
        decode(&body)
    }

    fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        resource: &str,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let request = self.request(method, path).json(body);
        self.get_json(resource, request)
    }
}

impl Debug for HttpAdmissionsGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAdmissionsGateway")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, GatewayError> {
    serde_json::from_str(body).map_err(|err| GatewayError::Decode(err.to_string()))
}

/// Pulls `message` or `error` out of a JSON error body; falls back to short plain text.
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => ["message", "error"]
            .iter()
            .find_map(|key| value.get(*key).and_then(|field| field.as_str()))
            .map(str::to_string),
        Err(_) if trimmed.len() <= 200 => Some(trimmed.to_string()),
        Err(_) => None,
    }
}

impl AdmissionsGateway for HttpAdmissionsGateway {
    fn provinces(&self) -> Result<Vec<Province>, GatewayError> {
        self.get_json("provinces", self.request(Method::GET, "/provinces"))
    }

    fn cities(&self, province_id: &RegionId) -> Result<Vec<City>, GatewayError> {
        let request = self
            .request(Method::GET, "/cities")
            .query(&[("province_id", province_id.0.as_str())]);
        self.get_json("cities", request)
    }

    fn fetch_profile(&self) -> Result<Option<Profile>, GatewayError> {
        match self.get_json("profile", self.request(Method::GET, "/profile")) {
            Ok(profile) => Ok(Some(profile)),
            Err(GatewayError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn upsert_profile(&self, profile: &Profile) -> Result<Profile, GatewayError> {
        self.send_json("profile", Method::PUT, "/profile", profile)
    }

    fn guardians(&self) -> Result<Vec<Guardian>, GatewayError> {
        match self.get_json("guardians", self.request(Method::GET, "/guardians")) {
            Ok(guardians) => Ok(guardians),
            Err(GatewayError::NotFound { .. }) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    fn create_guardian(&self, payload: &GuardianPayload) -> Result<Guardian, GatewayError> {
        self.send_json("guardian", Method::POST, "/guardians", payload)
    }

    fn update_guardian(
        &self,
        id: &GuardianId,
        payload: &GuardianPayload,
    ) -> Result<Guardian, GatewayError> {
        let path = format!("/guardians/{}", id.0);
        self.send_json("guardian", Method::PUT, &path, payload)
    }

    fn delete_guardian(&self, id: &GuardianId) -> Result<(), GatewayError> {
        let path = format!("/guardians/{}", id.0);
        self.execute("guardian", self.request(Method::DELETE, &path))
            .map(|_| ())
    }

    fn submit_registration(&self) -> Result<RegistrationStatusRecord, GatewayError> {
        self.get_json(
            "registration",
            self.request(Method::POST, "/registration/submit"),
        )
    }
}
