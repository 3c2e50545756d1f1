//! HTTP executor for the ERP query endpoint
//!
//! `POST {base_url}{query_path}` with `{"query": text, "params": []}` and the
//! request's bearer credential. A success body looks like
//! `{"data": [...], "rowCount": n}`; failures carry an envelope with
//! `message`, `error` and/or `sqlMessage`.

use crate::config::UpstreamConfig;
use crate::core::credential::CredentialContext;
use crate::core::error::{ConfigError, GatewayError, GatewayResult, UpstreamError, truncate_chars};
use crate::query::QueryText;
use crate::upstream::{QueryExecutor, UpstreamRow};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Characters of query text kept in debug logs
const LOGGED_QUERY_CHARS: usize = 200;

/// How one attempt failed
enum Failure {
    /// Nothing came back: connect error, reset or timeout before a response
    NoResponse(UpstreamError),
    /// The upstream answered; never retried
    Answered(GatewayError),
}

/// Executor backed by one shared `reqwest::Client`
#[derive(Clone)]
pub struct HttpQueryExecutor {
    http: reqwest::Client,
    endpoint: String,
    retry_transient: bool,
}

impl HttpQueryExecutor {
    pub fn new(config: &UpstreamConfig) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ConfigError::Invalid {
                key: "upstream".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self::with_client(http, config))
    }

    /// Use an existing client; its timeout applies instead of `timeout_ms`
    pub fn with_client(http: reqwest::Client, config: &UpstreamConfig) -> Self {
        Self {
            http,
            endpoint: config.endpoint(),
            retry_transient: config.retry_transient,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(
        &self,
        query: &QueryText,
        credential: &CredentialContext,
    ) -> Result<Vec<UpstreamRow>, Failure> {
        let started = Instant::now();
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(credential.token())
            .json(&serde_json::json!({ "query": query.as_str(), "params": [] }))
            .send()
            .await
            .map_err(|e| Failure::NoResponse(transport_error(&e, started)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Failure::Answered(transport_error(&e, started).into()))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Failure::Answered(
                UpstreamError::Rejected {
                    status: status.as_u16(),
                }
                .into(),
            ));
        }
        if !status.is_success() {
            return Err(Failure::Answered(failure_from_status(status, &body).into()));
        }

        parse_rows(status, &body).map_err(|e| Failure::Answered(e.into()))
    }
}

#[async_trait]
impl QueryExecutor for HttpQueryExecutor {
    async fn execute(
        &self,
        query: &QueryText,
        credential: &CredentialContext,
    ) -> GatewayResult<Vec<UpstreamRow>> {
        credential.ensure_usable(Utc::now())?;

        tracing::debug!(
            query = %truncate_chars(query.as_str(), LOGGED_QUERY_CHARS),
            "sending upstream query"
        );
        let started = Instant::now();

        let outcome = match self.send(query, credential).await {
            Err(Failure::NoResponse(err)) if self.retry_transient => {
                tracing::warn!(error = %err, "transient upstream failure, retrying once");
                self.send(query, credential).await
            }
            other => other,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(rows) => {
                tracing::debug!(rows = rows.len(), elapsed_ms, "upstream query completed");
                Ok(rows)
            }
            Err(Failure::NoResponse(err)) => {
                tracing::error!(error = %err, elapsed_ms, "upstream unreachable");
                Err(err.into())
            }
            Err(Failure::Answered(err)) => {
                tracing::warn!(code = err.error_code(), elapsed_ms, "upstream query failed");
                Err(err)
            }
        }
    }
}

fn transport_error(err: &reqwest::Error, started: Instant) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout {
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    } else if err.is_connect() {
        UpstreamError::Unavailable {
            message: format!("connection failed: {}", err),
        }
    } else {
        UpstreamError::Unavailable {
            message: err.to_string(),
        }
    }
}

/// Pull the diagnostic text out of an upstream error envelope
fn diagnostic(envelope: &Value) -> Option<String> {
    if let Value::String(text) = envelope {
        let text = text.trim();
        return (!text.is_empty()).then(|| text.to_string());
    }
    let parts: Vec<String> = ["message", "error", "sqlMessage"]
        .iter()
        .filter_map(|key| envelope.get(key))
        .filter_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Null | Value::String(_) => None,
            other => Some(other.to_string()),
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join(" | "))
}

fn failure_from_status(status: StatusCode, body: &str) -> UpstreamError {
    let envelope = serde_json::from_str::<Value>(body)
        .unwrap_or_else(|_| Value::String(body.to_string()));

    match diagnostic(&envelope) {
        Some(text) => UpstreamError::query_failed(Some(status.as_u16()), &text),
        None if matches!(
            status,
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
        ) =>
        {
            UpstreamError::Unavailable {
                message: format!("HTTP {}", status.as_u16()),
            }
        }
        None => UpstreamError::query_failed(Some(status.as_u16()), &format!("HTTP {}", status)),
    }
}

fn parse_rows(status: StatusCode, body: &str) -> Result<Vec<UpstreamRow>, UpstreamError> {
    let envelope: Value = serde_json::from_str(body).map_err(|e| UpstreamError::InvalidResponse {
        message: e.to_string(),
    })?;

    let data = match envelope.get("data") {
        Some(Value::Array(rows)) => rows,
        Some(Value::Null) | None => {
            if !envelope.is_object() {
                return Err(UpstreamError::InvalidResponse {
                    message: "expected a JSON object".to_string(),
                });
            }
            return match diagnostic(&envelope) {
                Some(text) => Err(UpstreamError::query_failed(Some(status.as_u16()), &text)),
                None => Ok(Vec::new()),
            };
        }
        Some(other) => {
            return Err(UpstreamError::InvalidResponse {
                message: format!("'data' is not an array: {}", truncate_chars(&other.to_string(), 80)),
            });
        }
    };

    data.iter()
        .map(|row| match row {
            Value::Object(cells) => Ok(cells
                .iter()
                .map(|(column, cell)| (column.clone(), trim_cell(cell)))
                .collect()),
            other => Err(UpstreamError::InvalidResponse {
                message: format!("row is not an object: {}", truncate_chars(&other.to_string(), 80)),
            }),
        })
        .collect()
}

/// Fixed-width upstream columns arrive space-padded
fn trim_cell(cell: &Value) -> Value {
    match cell {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rows_trims_strings() {
        let rows = parse_rows(
            StatusCode::OK,
            r#"{"data": [{"CODPROD": 1, "DESCRPROD": "  PARAFUSO  "}], "rowCount": 1}"#,
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["DESCRPROD"], json!("PARAFUSO"));
        assert_eq!(rows[0]["CODPROD"], json!(1));
    }

    #[test]
    fn test_missing_data_is_empty() {
        assert!(parse_rows(StatusCode::OK, r#"{"rowCount": 0}"#).unwrap().is_empty());
        assert!(parse_rows(StatusCode::OK, r#"{"data": null}"#).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_bodies() {
        assert!(matches!(
            parse_rows(StatusCode::OK, "<html>"),
            Err(UpstreamError::InvalidResponse { .. })
        ));
        assert!(matches!(
            parse_rows(StatusCode::OK, r#"{"data": "nope"}"#),
            Err(UpstreamError::InvalidResponse { .. })
        ));
        assert!(matches!(
            parse_rows(StatusCode::OK, r#"{"data": [1, 2]}"#),
            Err(UpstreamError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_success_status_with_error_envelope() {
        let err = parse_rows(StatusCode::OK, r#"{"error": "Invalid column name 'X'"}"#).unwrap_err();
        assert!(matches!(err, UpstreamError::QueryFailed { .. }));
    }

    #[test]
    fn test_diagnostic_joins_envelope_fields() {
        let text = diagnostic(&json!({
            "message": "Query failed",
            "sqlMessage": "Incorrect syntax near 'X'",
            "number": 102
        }))
        .unwrap();
        assert_eq!(text, "Query failed | Incorrect syntax near 'X'");
        assert_eq!(diagnostic(&json!({})), None);
    }

    #[test]
    fn test_failure_classification() {
        assert!(matches!(
            failure_from_status(StatusCode::BAD_REQUEST, r#"{"message": "bad"}"#),
            UpstreamError::QueryFailed {
                status: Some(400),
                ..
            }
        ));
        assert!(matches!(
            failure_from_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            UpstreamError::Unavailable { .. }
        ));
        assert!(matches!(
            failure_from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            UpstreamError::QueryFailed { .. }
        ));
    }
}
