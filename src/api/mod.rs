//! Typed client for the study backend REST API.

pub mod models;

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Url};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::config::AppConfig;

pub use models::{
    LoginRecord, LoginRequest, NewSite, NewStudy, NewSubject, RegisterRequest, Site, Study,
    Subject,
};

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const STUDIES_LIST_PATH: &str = "/studies/getstudy";
const STUDIES_PATH: &str = "/studies";
const SITES_LIST_PATH: &str = "/api/sites";
const SITES_PATH: &str = "/sites";
const SCREENINGS_PATH: &str = "/api/screenings";

/// Failure modes of a backend call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend answered with a non-2xx status.
    #[error("backend rejected the request with status {status}")]
    Rejected {
        status: u16,
        message: Option<String>,
        field_errors: BTreeMap<String, String>,
    },

    #[error("request to backend failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response from backend: {0}")]
    Malformed(String),

    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Message supplied by the backend in a rejection body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Rejected { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            ApiError::Rejected { field_errors, .. } if !field_errors.is_empty() => {
                Some(field_errors)
            }
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Rejected { status: 401, .. })
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, ApiError::Rejected { .. })
    }

    /// User-facing text: the server message for rejections, `fallback` otherwise.
    pub fn user_message(&self, fallback: &str) -> String {
        self.server_message()
            .filter(|message| !message.trim().is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    subjects_endpoint: String,
}

impl ApiClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.api_timeout)
            .build()
            .context("failed to build backend HTTP client")?;

        Ok(Self {
            http,
            base_url: config.api_url.clone(),
            subjects_endpoint: config.subjects_endpoint.clone(),
        })
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginRecord, ApiError> {
        let url = self.endpoint(LOGIN_PATH, None)?;
        let body = self.send(self.http.post(url).json(request)).await?;
        serde_json::from_value(body)
            .map_err(|err| ApiError::Malformed(format!("login response: {err}")))
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<(), ApiError> {
        let url = self.endpoint(REGISTER_PATH, None)?;
        self.send(self.http.post(url).json(request)).await?;
        Ok(())
    }

    pub async fn list_studies(&self, token: &str) -> Result<Vec<Study>, ApiError> {
        let url = self.endpoint(STUDIES_LIST_PATH, None)?;
        let body = self.send(self.http.get(url).bearer_auth(token)).await?;
        Ok(collection(body, "studies"))
    }

    pub async fn create_study(&self, token: &str, study: &NewStudy) -> Result<(), ApiError> {
        self.post_authenticated(STUDIES_PATH, token, study).await?;
        Ok(())
    }

    pub async fn list_sites(&self, token: &str, study_id: &str) -> Result<Vec<Site>, ApiError> {
        let url = self.endpoint(SITES_LIST_PATH, Some(study_id))?;
        let body = self.send(self.http.get(url).bearer_auth(token)).await?;
        Ok(collection(body, "sites"))
    }

    pub async fn create_site(&self, token: &str, site: &NewSite) -> Result<(), ApiError> {
        self.post_authenticated(SITES_PATH, token, site).await?;
        Ok(())
    }

    pub async fn list_subjects(
        &self,
        token: &str,
        site_id: &str,
    ) -> Result<Vec<Subject>, ApiError> {
        let url = self.endpoint(&self.subjects_endpoint, Some(site_id))?;
        let body = self.send(self.http.get(url).bearer_auth(token)).await?;
        Ok(collection(body, "subjects"))
    }

    /// Returns the created subject when the backend echoes it back as `{subject}`.
    pub async fn create_subject(
        &self,
        token: &str,
        subject: &NewSubject,
    ) -> Result<Option<Subject>, ApiError> {
        let body = self
            .post_authenticated(&self.subjects_endpoint, token, subject)
            .await?;
        Ok(body
            .get("subject")
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok()))
    }

    pub async fn submit_screening(&self, token: &str, payload: &Value) -> Result<(), ApiError> {
        self.post_authenticated(SCREENINGS_PATH, token, payload)
            .await?;
        Ok(())
    }

    async fn post_authenticated<B: Serialize + ?Sized>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<Value, ApiError> {
        let url = self.endpoint(path, None)?;
        self.send(self.http.post(url).bearer_auth(token).json(body))
            .await
    }

    fn endpoint(&self, path: &str, segment: Option<&str>) -> Result<Url, ApiError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|err| ApiError::InvalidUrl(format!("{path}: {err}")))?;
        if let Some(segment) = segment {
            url.path_segments_mut()
                .map_err(|_| ApiError::InvalidUrl(format!("{path} cannot take segments")))?
                .push(segment);
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => value,
                Err(err) if status.is_success() => {
                    return Err(ApiError::Malformed(format!("response is not JSON: {err}")));
                }
                Err(_) => Value::Null,
            }
        };

        if !status.is_success() {
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message: body
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string),
                field_errors: field_errors(&body),
            });
        }

        Ok(body)
    }
}

fn field_errors(body: &Value) -> BTreeMap<String, String> {
    let Some(errors) = body.get("errors").and_then(|e| e.as_object()) else {
        return BTreeMap::new();
    };

    errors
        .iter()
        .filter_map(|(field, message)| {
            let text = match message {
                Value::String(s) => s.clone(),
                Value::Object(obj) => obj.get("message")?.as_str()?.to_string(),
                _ => return None,
            };
            Some((field.clone(), text))
        })
        .collect()
}

/// Decodes a collection body. Anything other than an array yields an empty list, and
/// entries that fail to decode are skipped.
fn collection<T: DeserializeOwned>(body: Value, what: &str) -> Vec<T> {
    let Value::Array(items) = body else {
        warn!(what, "backend returned a non-array collection; treating as empty");
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(?err, what, "skipping malformed collection entry");
                None
            }
        })
        .collect()
}
