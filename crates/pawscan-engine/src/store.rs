use std::time::Duration;

use pawscan_contracts::error::StoreError;
use pawscan_contracts::pet::Dni;
use pawscan_contracts::records::{
    Clinic, ClinicMedication, CreatedHistory, HistoryDraft, HistoryRecord, Specialty, UserRecord,
};
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::providers::reqwest_error_text;

/// Remote users, histories and clinic catalogue. Every call is one attempt.
pub trait RecordStore: Send + Sync {
    /// `Ok(None)` when the store reports the DNI as unknown. An unavailable
    /// store is an error, never an unknown user.
    fn find_user(&self, dni: &Dni) -> Result<Option<UserRecord>, StoreError>;
    fn create_user(&self, user: &UserRecord) -> Result<(), StoreError>;
    fn create_history(&self, draft: &HistoryDraft) -> Result<CreatedHistory, StoreError>;
    fn get_history(&self, code: &str, dni: &Dni) -> Result<HistoryRecord, StoreError>;
    fn list_histories(&self, dni: &Dni) -> Result<Vec<HistoryRecord>, StoreError>;
    fn list_clinics(&self) -> Result<Vec<Clinic>, StoreError>;
    fn list_specialties(&self, clinic_id: &str) -> Result<Vec<Specialty>, StoreError>;
    fn list_medications(&self, clinic_id: &str) -> Result<Vec<ClinicMedication>, StoreError>;
}

pub struct HttpRecordStore {
    api_url: String,
    timeout: Duration,
    http: HttpClient,
}

impl HttpRecordStore {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_client(config, HttpClient::new())
    }

    fn with_client(config: &EngineConfig, http: HttpClient) -> Self {
        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
            http,
        }
    }

    /// `{api}/api/v1/<segments>`, each segment percent-encoded on its own.
    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let invalid = || {
            StoreError::Transport(format!("invalid record store URL: {}", self.api_url))
        };
        let mut url = Url::parse(&format!("{}/api/v1", self.api_url)).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send(&self, request: RequestBuilder) -> Result<(u16, String), StoreError> {
        let response = request
            .timeout(self.timeout)
            .send()
            .map_err(|err| StoreError::Transport(reqwest_error_text(&err)))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| StoreError::Transport(reqwest_error_text(&err)))?;
        Ok((status, body))
    }

    fn get_payload<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        key: &str,
    ) -> Result<T, StoreError> {
        let (status, body) = self.send(self.http.get(self.url(segments)?))?;
        payload_from_envelope(status, &body, key)
    }
}

impl RecordStore for HttpRecordStore {
    fn find_user(&self, dni: &Dni) -> Result<Option<UserRecord>, StoreError> {
        let dni = dni.as_number().to_string();
        match self.get_payload(&["users", &dni], "user") {
            Ok(user) => Ok(Some(user)),
            Err(StoreError::Rejected(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn create_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        let (status, body) = self.send(self.http.post(self.url(&["users"])?).json(user))?;
        let envelope = read_envelope(status, &body)?;
        envelope_status(&envelope)
    }

    fn create_history(&self, draft: &HistoryDraft) -> Result<CreatedHistory, StoreError> {
        let (status, body) = self.send(self.http.post(self.url(&["histories"])?).json(draft))?;
        created_history_from_body(status, &body)
    }

    fn get_history(&self, code: &str, dni: &Dni) -> Result<HistoryRecord, StoreError> {
        let dni = dni.as_number().to_string();
        self.get_payload(&["histories", code.trim(), "user", &dni], "history")
    }

    fn list_histories(&self, dni: &Dni) -> Result<Vec<HistoryRecord>, StoreError> {
        let dni = dni.as_number().to_string();
        self.get_payload(&["histories", "user", &dni], "history")
    }

    fn list_clinics(&self) -> Result<Vec<Clinic>, StoreError> {
        self.get_payload(&["stores"], "store")
    }

    fn list_specialties(&self, clinic_id: &str) -> Result<Vec<Specialty>, StoreError> {
        self.get_payload(&["stores", clinic_id.trim(), "specialties"], "specialty")
    }

    fn list_medications(&self, clinic_id: &str) -> Result<Vec<ClinicMedication>, StoreError> {
        self.get_payload(&["stores", clinic_id.trim(), "medications"], "medication")
    }
}

/// Parses a `{meta: {status, message}, ...}` body. Only a 404 or a parsed
/// envelope can reject a request. 5xx answers and failures without an
/// envelope mean the store is unavailable.
fn read_envelope(status: u16, body: &str) -> Result<Map<String, Value>, StoreError> {
    if status >= 500 {
        return Err(unavailable(status, body));
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(object)) => Ok(object),
        _ if status == 404 => Err(StoreError::Rejected(
            "record store has no such resource (HTTP 404)".to_string(),
        )),
        _ if !is_success(status) => Err(unavailable(status, body)),
        Ok(_) => Err(StoreError::InvalidPayload(
            "expected a JSON object".to_string(),
        )),
        Err(err) => Err(StoreError::InvalidPayload(err.to_string())),
    }
}

fn unavailable(status: u16, body: &str) -> StoreError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.as_object().and_then(error_message));
    StoreError::Unavailable(match message {
        Some(message) => format!("HTTP {status}: {message}"),
        None => format!("HTTP {status}"),
    })
}

fn envelope_status(envelope: &Map<String, Value>) -> Result<(), StoreError> {
    let meta = envelope.get("meta").and_then(Value::as_object);
    let ok = meta
        .and_then(|meta| meta.get("status"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if ok {
        return Ok(());
    }
    Err(StoreError::Rejected(
        error_message(envelope).unwrap_or_else(|| "record store rejected the request".to_string()),
    ))
}

/// `meta.message`, then top-level `message`, then `error`.
fn error_message(body: &Map<String, Value>) -> Option<String> {
    let meta_message = body
        .get("meta")
        .and_then(|meta| meta.get("message"))
        .and_then(Value::as_str);
    meta_message
        .or_else(|| body.get("message").and_then(Value::as_str))
        .or_else(|| body.get("error").and_then(Value::as_str))
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

fn payload_from_envelope<T: DeserializeOwned>(
    status: u16,
    body: &str,
    key: &str,
) -> Result<T, StoreError> {
    let mut envelope = read_envelope(status, body)?;
    envelope_status(&envelope)?;
    let payload = envelope
        .remove(key)
        .ok_or_else(|| StoreError::InvalidPayload(format!("response has no `{key}` field")))?;
    serde_json::from_value(payload)
        .map_err(|err| StoreError::InvalidPayload(format!("`{key}`: {err}")))
}

/// The history endpoint answers with the bare record on success and with
/// `{error}` or an envelope on failure.
fn created_history_from_body(status: u16, body: &str) -> Result<CreatedHistory, StoreError> {
    if status >= 500 {
        return Err(unavailable(status, body));
    }
    if !is_success(status) {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|value| value.as_object().and_then(error_message))
            .unwrap_or_else(|| format!("failed to create history (HTTP {status})"));
        return Err(StoreError::Rejected(message));
    }
    if body.trim().is_empty() {
        return Ok(CreatedHistory::default());
    }
    let value: Value =
        serde_json::from_str(body).map_err(|err| StoreError::InvalidPayload(err.to_string()))?;
    let Value::Object(object) = value else {
        return Err(StoreError::InvalidPayload(
            "expected a JSON object".to_string(),
        ));
    };
    if object.contains_key("meta") {
        envelope_status(&object)?;
    }
    let record = object
        .get("history")
        .and_then(Value::as_object)
        .unwrap_or(&object);
    Ok(CreatedHistory {
        code: scalar_text(record.get("code")),
        created_on: scalar_text(record.get("createdOn")),
    })
}

/// Codes may come back as strings or numbers. Blank means absent.
fn scalar_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}
