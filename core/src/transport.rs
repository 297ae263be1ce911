//! Executes `HttpRequest` values over the network.
//!
//! # Design
//! `Transport` is the only place the client performs I/O, so tests can swap
//! in a canned implementation. `UreqTransport` is the blocking default. It
//! keeps one agent per TLS mode so toggling verification on the client never
//! rebuilds connection pools, and it turns off ureq's status-as-error
//! behavior so 4xx/5xx responses come back as data.

use std::time::Duration;

use ureq::tls::TlsConfig;
use ureq::{Agent, RequestBuilder};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

pub trait Transport: Send + Sync {
    /// Perform one round-trip. `verify_tls` controls peer verification only;
    /// it never changes what is sent.
    fn execute(&self, request: &HttpRequest, verify_tls: bool) -> Result<HttpResponse, ApiError>;
}

/// Blocking transport backed by ureq.
#[derive(Clone)]
pub struct UreqTransport {
    verified: Agent,
    unverified: Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            verified: agent(timeout, true),
            unverified: agent(timeout, false),
        }
    }
}

fn agent(timeout: Duration, verify_tls: bool) -> Agent {
    Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(timeout))
        .tls_config(
            TlsConfig::builder()
                .disable_verification(!verify_tls)
                .build(),
        )
        .build()
        .new_agent()
}

fn with_headers<B>(
    mut builder: RequestBuilder<B>,
    headers: &[(String, String)],
) -> RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest, verify_tls: bool) -> Result<HttpResponse, ApiError> {
        let agent = if verify_tls { &self.verified } else { &self.unverified };
        let url = request.path.as_str();
        let headers = request.headers.as_slice();

        // GET and DELETE carry the JSON body too; the service reads it.
        let result = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, None) => with_headers(agent.get(url), headers).call(),
            (HttpMethod::Get, Some(body)) => with_headers(agent.get(url), headers)
                .force_send_body()
                .send(body.as_bytes()),
            (HttpMethod::Delete, None) => with_headers(agent.delete(url), headers).call(),
            (HttpMethod::Delete, Some(body)) => with_headers(agent.delete(url), headers)
                .force_send_body()
                .send(body.as_bytes()),
            (HttpMethod::Post, Some(body)) => {
                with_headers(agent.post(url), headers).send(body.as_bytes())
            }
            (HttpMethod::Post, None) => with_headers(agent.post(url), headers).send_empty(),
            (HttpMethod::Put, Some(body)) => {
                with_headers(agent.put(url), headers).send(body.as_bytes())
            }
            (HttpMethod::Put, None) => with_headers(agent.put(url), headers).send_empty(),
        };

        let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
