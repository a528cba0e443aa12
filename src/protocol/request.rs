//! Request and Response message types.
//!
//! Defines the CDP command frame sent to the remote end and the response
//! frame correlated back to it by `id`.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::identifiers::{CdpSessionId, RequestId};

// ============================================================================
// Request
// ============================================================================

/// A command request from local end to remote end.
///
/// # Format
///
/// ```json
/// {
///   "id": 7,
///   "method": "Runtime.evaluate",
///   "params": { "expression": "1" },
///   "sessionId": "8F1C..."
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Unique identifier for request/response correlation.
    pub id: RequestId,

    /// Command name in `Domain.method` format.
    pub method: String,

    /// Command parameters.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub params: Value,

    /// Flattened target session the command is addressed to.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<CdpSessionId>,
}

impl Request {
    /// Creates a browser-level request with an auto-generated ID.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: RequestId::generate(),
            method: method.into(),
            params,
            session_id: None,
        }
    }

    /// Addresses the request to an attached target session.
    #[inline]
    #[must_use]
    pub fn with_session(mut self, session_id: CdpSessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// `Runtime.evaluate` returning the value by value.
    #[must_use]
    pub fn evaluate(expression: &str) -> Self {
        Self::new(
            "Runtime.evaluate",
            json!({
                "expression": expression,
                "returnByValue": true,
                "awaitPromise": true,
            }),
        )
    }
}

// ============================================================================
// Response
// ============================================================================

/// Error object inside a failed response.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CdpError {
    /// CDP error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

/// A response from remote end to local end.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": 7, "result": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "id": 7, "error": { "code": -32000, "message": "..." } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the command `id`.
    pub id: RequestId,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error object (if error).
    #[serde(default)]
    pub error: Option<CdpError>,

    /// Session the response came from.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<CdpSessionId>,
}

impl Response {
    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Extracts the result value, returning error if response was error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cdp`] if the response carried an error object.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            None => Ok(self.result.unwrap_or(Value::Null)),
            Some(err) => Err(Error::cdp(err.code, err.message)),
        }
    }

    /// Gets a string value from the result.
    ///
    /// Returns empty string if key not found or not a string.
    #[inline]
    #[must_use]
    pub fn get_string(&self, key: &str) -> String {
        self.result
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }
}

/// Extracts the value of a `Runtime.evaluate` result.
///
/// # Errors
///
/// Returns [`Error::Script`] when the page reported `exceptionDetails`.
pub fn evaluation_value(result: Value) -> Result<Value> {
    if let Some(details) = result.get("exceptionDetails") {
        let message = details
            .pointer("/exception/description")
            .or_else(|| details.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("uncaught exception");
        return Err(Error::script(message));
    }

    Ok(result
        .pointer("/result/value")
        .cloned()
        .unwrap_or(Value::Null))
}

// ============================================================================
// Tests
// ============================================================================
