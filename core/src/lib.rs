//! Blocking client for the TicketBaiWS electronic invoicing service.
//!
//! # Overview
//! TicketBaiWS signs invoices, generates the TicketBAI huella and QR, and
//! talks to the Basque tax authorities. This crate only marshals parameters
//! to JSON, sends them with the account's `Token` and `Nif` headers, and
//! interprets the `result` / `msg` / `return` envelope of the answer.
//!
//! # Design
//! - `TicketBaiClient` takes an explicit `ClientConfig`; nothing is read from
//!   global state.
//! - Requests are built as plain `HttpRequest` data and executed through the
//!   `Transport` trait, so tests can replace the network.
//! - Business errors are a `Reply::Failure`, not an `Err`. `ApiError` is
//!   reserved for transport failures, non-200 statuses and non-JSON bodies.
//!
//! ```rust,no_run
//! use serde_json::json;
//! use ticketbai_core::{ClientConfig, Environment, Reply, TicketBaiClient};
//!
//! let client = TicketBaiClient::new(ClientConfig::new(Environment::Test, "token", "B12345678"));
//! let params = json!({"serie": "A", "numero": 1}).as_object().cloned().unwrap_or_default();
//! match client.submit_invoice(&params)? {
//!     Reply::Success(tbai) => println!("huella: {}", tbai["huella"]),
//!     Reply::Failure(msg) => eprintln!("rejected: {msg}"),
//! }
//! # Ok::<(), ticketbai_core::ApiError>(())
//! ```

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;

pub use client::TicketBaiClient;
pub use config::{ClientConfig, Environment};
pub use endpoint::Endpoint;
pub use error::{ApiError, ConfigError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::{Transport, UreqTransport};
pub use types::{Params, Reply, ServiceResponse};
