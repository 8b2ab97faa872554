//! Error Types
//!
//! Errors a workflow step can produce, plus the remote API errors they wrap.
//! Step errors are recorded in the run log rather than propagated, so they are
//! cloneable and serializable.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Failure of a single remote API call.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, TLS, ...).
    #[error("network error: {message}")]
    Network { message: String },

    /// The API answered with a non-success status code.
    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not valid JSON.
    #[error("failed to decode response: {message}")]
    Decode { message: String },
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode {
                message: err.to_string(),
            }
        } else {
            ApiError::Network {
                message: err.to_string(),
            }
        }
    }
}

/// Failure of a workflow step.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StepError {
    /// The step's remote call failed.
    #[error("remote call failed: {0}")]
    Remote(ApiError),

    /// A successful response lacked a field an output binding needs.
    #[error("binding failed: no value at '{path}'")]
    Binding { path: String },

    /// The gating predicate did not hold for a successful response.
    #[error("gate failed: expected '{path}' == {expected}, got {}", display_actual(.actual))]
    GateFailed {
        path: String,
        expected: Value,
        actual: Option<Value>,
    },

    /// A request template referenced a key that is not in the context.
    #[error("context has no value for '{key}'")]
    MissingContextKey { key: String },

    /// A non-HTTP operation reported an error.
    #[error("{0}")]
    Operation(String),
}

fn display_actual(actual: &Option<Value>) -> String {
    match actual {
        Some(value) => value.to_string(),
        None => "nothing".to_string(),
    }
}

impl From<ApiError> for StepError {
    fn from(err: ApiError) -> Self {
        StepError::Remote(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::Status {
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "API returned 404: not found");
    }

    #[test]
    fn test_step_error_from_api_error() {
        let err: StepError = ApiError::Network {
            message: "connection refused".to_string(),
        }
        .into();

        assert!(matches!(err, StepError::Remote(ApiError::Network { .. })));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_gate_failed_display() {
        let err = StepError::GateFailed {
            path: "status".to_string(),
            expected: json!("ok"),
            actual: Some(json!("error")),
        };
        assert_eq!(
            err.to_string(),
            "gate failed: expected 'status' == \"ok\", got \"error\""
        );

        let missing = StepError::GateFailed {
            path: "status".to_string(),
            expected: json!("ok"),
            actual: None,
        };
        assert!(missing.to_string().ends_with("got nothing"));
    }

    #[test]
    fn test_step_error_serializes_with_kind() {
        let err = StepError::Binding {
            path: "id".to_string(),
        };
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value, json!({"kind": "binding", "detail": {"path": "id"}}));
    }
}
