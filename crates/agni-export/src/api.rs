//! Authenticated client for the AGNI REST API.
//!
//! All `/api/*` endpoints take a JSON POST body carrying `orgID` and
//! answer with a `data` envelope plus an optional `error` field. The
//! session established by `login` lives in a cookie jar shared by every
//! subsequent call.

use std::time::Duration;

use agni_common::{Record, TimeWindow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

/// Login endpoint path (outside the `/api/` namespace).
const KEY_LOGIN_PATH: &str = "/cvcue/keyLogin";

/// RADIUS input attribute holding the switch port for a session.
const NAS_PORT_ATTR: &str = "Radius:IETF:NAS-Port-Id";

/// Errors from AGNI API calls.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status: {0}")]
    Status(StatusCode),

    #[error("API returned error: {0}")]
    Api(String),

    #[error("Segment '{0}' not found in configuration")]
    SegmentNotFound(String),
}

/// Filter criteria for a `session.list` query.
#[derive(Debug, Clone)]
pub struct SessionFilter {
    /// Resolved segment id to filter on.
    pub segment_id: String,
    /// Session type; network_access for device auth sessions.
    pub session_type: String,
    /// Optional status filter (e.g. "failed").
    pub status: Option<String>,
}

/// The paginated session source driven by the window scan.
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Lists sessions matching `filter` inside one time window, up to
    /// `limit` records. The server truncates silently beyond its cap.
    async fn list_sessions(
        &self,
        window: &TimeWindow,
        filter: &SessionFilter,
        limit: usize,
    ) -> Result<Vec<Record>, ApiError>;
}

/// The three enrichment lookups. Every method degrades to `None` on any
/// failure; a lookup must never abort the device or the batch.
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    /// Extended client identity for a MAC. May carry nested
    /// `attributes` and `certificate` objects.
    async fn client_identity(&self, mac: &str) -> Option<Record>;

    /// Display name of a network access device (switch) by id.
    async fn nad_name(&self, nad_id: &str) -> Option<String>;

    /// Switch port (NAS-Port-Id) for an authentication request id.
    async fn session_port(&self, auth_req_id: &str) -> Option<String>;
}

/// AGNI API client. Cheap to share behind an `Arc`.
pub struct AgniClient {
    http: Client,
    base_url: String,
    org_id: String,
}

impl AgniClient {
    /// Creates a client with a cookie store and per-call timeout.
    pub fn new(base_url: &str, org_id: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            org_id: org_id.to_string(),
        })
    }

    /// Authenticates with an API key pair, establishing the session
    /// cookie. Failure here is fatal to the run.
    pub async fn login(&self, key_id: &str, key_value: &str) -> Result<(), ApiError> {
        let url = format!("{}{}", self.base_url, KEY_LOGIN_PATH);
        let resp = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .query(&[("keyID", key_id), ("keyValue", key_value)])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status()));
        }

        info!("Login successful to {}", self.base_url);
        Ok(())
    }

    /// Resolves a segment name to its id via `config.segment.list`.
    pub async fn resolve_segment_id(&self, segment_name: &str) -> Result<String, ApiError> {
        let data = self
            .post_api("config.segment.list", json!({ "orgID": self.org_id }))
            .await?;

        find_segment_id(&data, segment_name)
            .ok_or_else(|| ApiError::SegmentNotFound(segment_name.to_string()))
    }

    /// Issues one `/api/{method}` call and unwraps the `data` envelope.
    async fn post_api(&self, method: &str, body: Value) -> Result<Value, ApiError> {
        let url = format!("{}/api/{}", self.base_url, method);
        let resp = self.http.post(&url).json(&body).send().await?;

        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status()));
        }

        let body: Value = resp.json().await?;
        envelope_data(body)
    }
}

/// Unwraps the `data` envelope, treating a non-empty `error` field as a
/// failed call.
fn envelope_data(mut body: Value) -> Result<Value, ApiError> {
    if let Some(err) = body.get("error") {
        let failed = match err {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        };
        if failed {
            return Err(ApiError::Api(err.to_string()));
        }
    }

    Ok(body
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null))
}

/// Finds a segment id by name in a `config.segment.list` response body.
/// The record list key is capitalized (`Records`) on this endpoint.
fn find_segment_id(data: &Value, segment_name: &str) -> Option<String> {
    let records = data.get("Records")?.as_array()?;
    records
        .iter()
        .find(|rec| rec.get("name").and_then(Value::as_str) == Some(segment_name))
        .and_then(|rec| rec.get("id"))
        .and_then(id_to_string)
}

/// Ids show up as strings or numbers depending on the endpoint.
fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl SessionSource for AgniClient {
    async fn list_sessions(
        &self,
        window: &TimeWindow,
        filter: &SessionFilter,
        limit: usize,
    ) -> Result<Vec<Record>, ApiError> {
        let mut payload = json!({
            "orgID": self.org_id,
            "fromTimestamp": window.from.to_rfc3339_opts(SecondsFormat::Secs, true),
            "toTimestamp": window.to.to_rfc3339_opts(SecondsFormat::Secs, true),
            "sessionType": filter.session_type,
            "filters": [
                { "field": "segment_id", "value": filter.segment_id }
            ],
            "limit": limit,
        });
        if let Some(status) = &filter.status {
            payload["status"] = json!(status);
        }

        let data = self.post_api("session.list", payload).await?;

        let records = data
            .get("records")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_object().cloned())
                    .collect::<Vec<Record>>()
            })
            .unwrap_or_default();

        Ok(records)
    }
}

#[async_trait]
impl DirectoryApi for AgniClient {
    async fn client_identity(&self, mac: &str) -> Option<Record> {
        let payload = json!({ "orgID": self.org_id, "mac": mac });
        match self.post_api("identity.client.get", payload).await {
            Ok(Value::Object(identity)) if !identity.is_empty() => Some(identity),
            Ok(_) => None,
            Err(e) => {
                debug!("Identity lookup failed for {}: {}", mac, e);
                None
            }
        }
    }

    async fn nad_name(&self, nad_id: &str) -> Option<String> {
        let payload = json!({ "orgID": self.org_id, "id": nad_id });
        match self.post_api("config.nad.get", payload).await {
            Ok(data) => data.get("name").and_then(Value::as_str).map(String::from),
            Err(e) => {
                debug!("NAD lookup failed for {}: {}", nad_id, e);
                None
            }
        }
    }

    async fn session_port(&self, auth_req_id: &str) -> Option<String> {
        let payload = json!({ "orgID": self.org_id, "authReqID": auth_req_id });
        match self.post_api("session.details.get", payload).await {
            Ok(data) => data
                .get("inputAttrs")
                .and_then(|attrs| attrs.get(NAS_PORT_ATTR))
                .and_then(Value::as_str)
                .map(String::from),
            Err(e) => {
                debug!("Session detail lookup failed for {}: {}", auth_req_id, e);
                None
            }
        }
    }
}
