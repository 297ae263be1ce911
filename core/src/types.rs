//! Request parameters and response shapes for TicketBaiWS.
//!
//! # Design
//! The service owns the invoice, license and company schemas; the client
//! passes them through as untyped JSON. Only the response envelope
//! (`result` / `msg` / `return`) is interpreted here, and every field of it
//! may be missing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameters for one call, sent as the JSON request body.
pub type Params = Map<String, Value>;

/// Outcome of a call whose envelope reached the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Reply {
    /// `result` was present and not `"ERROR"`. Holds the `return` field,
    /// or `Value::Null` when the service sent none.
    Success(Value),
    /// `result` was `"ERROR"` or missing. Holds the `msg` field, or an
    /// empty string when the service sent none.
    Failure(String),
}

impl Reply {
    /// Apply the envelope convention to a decoded response body.
    pub fn from_envelope(envelope: &Value) -> Self {
        match envelope.get("result") {
            None => Reply::Failure(message(envelope)),
            Some(Value::String(result)) if result == "ERROR" => Reply::Failure(message(envelope)),
            Some(_) => Reply::Success(envelope.get("return").cloned().unwrap_or(Value::Null)),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success(_))
    }

    pub fn into_result(self) -> Result<Value, String> {
        match self {
            Reply::Success(payload) => Ok(payload),
            Reply::Failure(message) => Err(message),
        }
    }
}

fn message(envelope: &Value) -> String {
    match envelope.get("msg") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(msg)) => msg.clone(),
        Some(other) => other.to_string(),
    }
}

/// What a dispatch produced before the envelope convention is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceResponse {
    /// HTTP 200 with a body that decoded as JSON.
    Json(Value),
    /// A non-200 status, or a 200 whose body is not JSON.
    Raw { status: u16, body: String },
}

/// `true` iff the status envelope says `result: "OK"`.
pub fn is_status_ok(envelope: &Value) -> bool {
    envelope.get("result").and_then(Value::as_str) == Some("OK")
}
