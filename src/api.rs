use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::models::{hardware_incidents_from_payload, AlertItem, HardwareIncident};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const GENERIC_FAILURE: &str = "Error en la solicitud";
const INVALID_RESPONSE: &str = "Respuesta inválida del servidor";
const OFFLINE: &str = "Sin conexión - revisa tu internet";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `{ success, data, message }` wrapper used by every endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    pub message: Option<String>,
}

/// Collapses status, parse and `success` checks into one outcome.
pub fn decode_envelope(status: StatusCode, body: &str) -> Result<Envelope, ApiError> {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let server_message = parsed
        .as_ref()
        .and_then(|value| value.get("message"))
        .and_then(Value::as_str)
        .filter(|message| !message.trim().is_empty())
        .map(str::to_string);

    if !status.is_success() {
        return Err(ApiError::RequestFailed(
            server_message.unwrap_or_else(|| format!("{GENERIC_FAILURE} (HTTP {})", status.as_u16())),
        ));
    }

    let Some(parsed) = parsed else {
        return Err(ApiError::RequestFailed(INVALID_RESPONSE.to_string()));
    };
    let envelope: Envelope = serde_json::from_value(parsed)
        .map_err(|_| ApiError::RequestFailed(INVALID_RESPONSE.to_string()))?;
    if !envelope.success {
        return Err(ApiError::RequestFailed(
            server_message.unwrap_or_else(|| GENERIC_FAILURE.to_string()),
        ));
    }
    Ok(envelope)
}

/// Like [`decode_envelope`] for endpoints that may answer with a bare payload.
/// Only an explicit `success: false` counts as a failed body.
pub fn decode_payload(status: StatusCode, body: &str) -> Result<Value, ApiError> {
    let parsed = serde_json::from_str::<Value>(body).ok();
    if !status.is_success() {
        let message = parsed
            .as_ref()
            .and_then(|value| value.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{GENERIC_FAILURE} (HTTP {})", status.as_u16()));
        return Err(ApiError::RequestFailed(message));
    }
    let Some(parsed) = parsed else {
        return Err(ApiError::RequestFailed(INVALID_RESPONSE.to_string()));
    };
    if matches!(parsed.get("success"), Some(Value::Bool(false))) {
        let message = parsed
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(GENERIC_FAILURE)
            .to_string();
        return Err(ApiError::RequestFailed(message));
    }
    Ok(parsed)
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|token| !token.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, method: Method, path: &str) -> Result<(StatusCode, String), ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header("Content-Type", "application/json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let res = request.send().await.map_err(|e| {
            tracing::debug!(%method, %url, error = %e, "request failed");
            ApiError::RequestFailed(OFFLINE.to_string())
        })?;
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        tracing::trace!(%method, %url, status = status.as_u16(), "response received");
        Ok((status, body))
    }

    /// Active alerts for one company, newest first as served.
    pub async fn active_alerts(
        &self,
        empresa_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<AlertItem>, ApiError> {
        let path = format!(
            "/api/mqtt-alerts/empresa/{}/active-by-sede?limit={}&offset={}",
            empresa_id, limit, offset
        );
        let (status, body) = self.send(Method::GET, &path).await?;
        let envelope = decode_envelope(status, &body)?;
        Ok(envelope
            .data
            .as_array()
            .map(|items| items.iter().map(AlertItem::from_raw).collect())
            .unwrap_or_default())
    }

    pub async fn hardware_incidents(&self) -> Result<Vec<HardwareIncident>, ApiError> {
        let (status, body) = self
            .send(Method::POST, "/api/hardware/physical-status/check")
            .await?;
        let payload = decode_payload(status, &body)?;
        Ok(hardware_incidents_from_payload(&payload))
    }

    /// Raw records of a list endpoint, read from `data` or `fallback_key`.
    pub async fn list_records(
        &self,
        path: &str,
        fallback_key: Option<&str>,
    ) -> Result<Vec<Value>, ApiError> {
        let (status, body) = self.send(Method::GET, path).await?;
        let envelope = decode_envelope(status, &body)?;
        if let Some(items) = envelope.data.as_array() {
            return Ok(items.clone());
        }
        let fallback = fallback_key.and_then(|key| {
            serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|value| value.get(key).and_then(Value::as_array).cloned())
        });
        Ok(fallback.unwrap_or_default())
    }
}
