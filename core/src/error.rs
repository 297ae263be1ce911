//! Error types for the TicketBaiWS client.
//!
//! # Design
//! Business failures reported by the service (`result: "ERROR"`) are not
//! errors here; they come back as [`Reply::Failure`](crate::types::Reply).
//! `ApiError` covers everything that prevents a well-formed envelope from
//! reaching the caller: encoding, transport, unexpected statuses and bodies
//! that are not JSON.

use thiserror::Error;

/// Errors returned by `TicketBaiClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request parameters could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// DNS, connection, TLS or timeout failure. Nothing was received.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The service answered 200 but the body is not JSON. Carries the raw body.
    #[error("response is not JSON: {0}")]
    MalformedBody(String),

    /// The service answered with a status other than 200.
    #[error("HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

/// Errors raised while building or validating a `ClientConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing configuration variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}
