//! Blocking client for the TicketBaiWS API.
//!
//! # Design
//! Every operation goes through the same three steps: `build_request`
//! produces an `HttpRequest` from the parameters, a `Transport` executes it,
//! and `decode_response` turns the `HttpResponse` into a `ServiceResponse`.
//! The per-operation methods only pick the endpoint and apply the envelope
//! convention. Configuration is read-only during a call; the two boolean
//! flags can be toggled between calls and never affect what is sent.

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::ClientConfig;
use crate::endpoint::Endpoint;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{Transport, UreqTransport};
use crate::types::{is_status_ok, Params, Reply, ServiceResponse};

const WIRE_TARGET: &str = "ticketbai::wire";

/// Client for one TicketBaiWS account (token + NIF).
pub struct TicketBaiClient<T = UreqTransport> {
    config: ClientConfig,
    transport: T,
}

impl TicketBaiClient<UreqTransport> {
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.timeout());
        Self { config, transport }
    }
}

impl<T: Transport> TicketBaiClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The transport requests are handed to.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Enable or disable TLS peer verification for subsequent calls.
    pub fn set_verify_tls(&mut self, verify_tls: bool) {
        self.config.set_verify_tls(verify_tls);
    }

    /// Enable or disable wire diagnostics for subsequent calls.
    ///
    /// Diagnostics are emitted as `tracing` events at DEBUG level under the
    /// `ticketbai::wire` target; the token header is redacted.
    pub fn set_debug(&mut self, debug: bool) {
        self.config.set_debug(debug);
    }

    /// `true` iff the service reports `result: "OK"`. Transport failures,
    /// unexpected statuses and malformed bodies all count as down.
    pub fn check_status(&self) -> bool {
        let endpoint = Endpoint::Status;
        match self.dispatch(endpoint.service_name(), endpoint.method(), &Params::new()) {
            Ok(ServiceResponse::Json(envelope)) => is_status_ok(&envelope),
            Ok(ServiceResponse::Raw { .. }) | Err(_) => false,
        }
    }

    /// Status envelope with the service's message when it is not OK, e.g. an
    /// expired certificate or license.
    pub fn status(&self) -> Result<Reply, ApiError> {
        self.call(Endpoint::Status, &Params::new())
    }

    /// Send an invoice. Set `zuzendu: true` to correct one sent before; the
    /// series and number must match the original.
    pub fn submit_invoice(&self, params: &Params) -> Result<Reply, ApiError> {
        self.call(Endpoint::SubmitInvoice, params)
    }

    /// Convert simplified invoices into a full invoice with its own number.
    pub fn complete_invoice(&self, params: &Params) -> Result<Reply, ApiError> {
        self.call(Endpoint::CompleteInvoice, params)
    }

    /// Cancel an invoice by series and number. The number cannot be reused.
    pub fn cancel_invoice(&self, params: &Params) -> Result<Reply, ApiError> {
        self.call(Endpoint::CancelInvoice, params)
    }

    pub fn lookup_invoice(&self, params: &Params) -> Result<Reply, ApiError> {
        self.call(Endpoint::LookupInvoice, params)
    }

    /// Request and response XML exchanged with the tax authority, base64.
    pub fn fetch_invoice_xml(&self, params: &Params) -> Result<Reply, ApiError> {
        self.call(Endpoint::FetchInvoiceXml, params)
    }

    pub fn list_licenses(&self, params: &Params) -> Result<Reply, ApiError> {
        self.call(Endpoint::ListLicenses, params)
    }

    pub fn create_license(&self, params: &Params) -> Result<Reply, ApiError> {
        self.call(Endpoint::CreateLicense, params)
    }

    pub fn list_companies(&self, params: &Params) -> Result<Reply, ApiError> {
        self.call(Endpoint::ListCompanies, params)
    }

    pub fn create_company(&self, params: &Params) -> Result<Reply, ApiError> {
        self.call(Endpoint::CreateCompany, params)
    }

    pub fn list_tax_categories(&self) -> Result<Reply, ApiError> {
        self.call(Endpoint::ListTaxCategories, &Params::new())
    }

    pub fn call(&self, endpoint: Endpoint, params: &Params) -> Result<Reply, ApiError> {
        self.call_service(endpoint.service_name(), endpoint.method(), params)
    }

    /// Call a service by name, for endpoints the `Endpoint` table does not
    /// cover yet.
    pub fn call_service(
        &self,
        service_name: &str,
        method: HttpMethod,
        params: &Params,
    ) -> Result<Reply, ApiError> {
        into_reply(self.dispatch(service_name, method, params)?)
    }

    /// Build, execute and decode one request.
    ///
    /// Transport failures are logged and returned as `ApiError::Transport`.
    /// Any response that reached the client is returned as a
    /// `ServiceResponse`, whatever its status.
    pub fn dispatch(
        &self,
        service_name: &str,
        method: HttpMethod,
        params: &Params,
    ) -> Result<ServiceResponse, ApiError> {
        let request = self.build_request(service_name, method, params)?;
        let debug_mode = self.config.debug();

        if debug_mode {
            debug!(
                target: WIRE_TARGET,
                url = %request.path,
                method = %request.method,
                headers = ?redacted(&request.headers),
                body = request.body.as_deref().unwrap_or_default(),
                "ticketbai_request"
            );
        }

        let response = match self.transport.execute(&request, self.config.verify_tls()) {
            Ok(response) => response,
            Err(err) => {
                error!(
                    service = service_name,
                    method = %method,
                    error = %err,
                    "ticketbai_transport_failure"
                );
                return Err(err);
            }
        };

        if debug_mode {
            debug!(
                target: WIRE_TARGET,
                url = %request.path,
                status = response.status,
                headers = ?response.headers,
                body = %response.body,
                "ticketbai_response"
            );
        }

        let decoded = self.decode_response(response);
        if let ServiceResponse::Raw { status, .. } = &decoded {
            if *status == 200 {
                warn!(service = service_name, "ticketbai_malformed_body");
            } else {
                warn!(
                    service = service_name,
                    status = *status,
                    "ticketbai_unexpected_status"
                );
            }
        }
        Ok(decoded)
    }

    /// Produce the request for `service_name` without sending it.
    ///
    /// The body is the JSON encoding of `params` (`{}` when empty) and is
    /// attached for every method.
    pub fn build_request(
        &self,
        service_name: &str,
        method: HttpMethod,
        params: &Params,
    ) -> Result<HttpRequest, ApiError> {
        let body =
            serde_json::to_string(params).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method,
            path: format!("{}{}/", self.config.base_url(), service_name),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/json;charset=UTF-8".to_string()),
                ("Token".to_string(), self.config.token().to_string()),
                ("Nif".to_string(), self.config.nif().to_string()),
            ],
            body: (!body.is_empty()).then_some(body),
        })
    }

    /// Decode a 200 body as JSON; keep anything else raw.
    pub fn decode_response(&self, response: HttpResponse) -> ServiceResponse {
        if response.status != 200 {
            return ServiceResponse::Raw {
                status: response.status,
                body: response.body,
            };
        }
        match serde_json::from_str::<Value>(&response.body) {
            Ok(value) => ServiceResponse::Json(value),
            Err(_) => ServiceResponse::Raw {
                status: response.status,
                body: response.body,
            },
        }
    }
}

/// Map a dispatched response onto the `result` / `msg` / `return` envelope.
fn into_reply(response: ServiceResponse) -> Result<Reply, ApiError> {
    match response {
        ServiceResponse::Json(envelope) => Ok(Reply::from_envelope(&envelope)),
        ServiceResponse::Raw { status: 200, body } => Err(ApiError::MalformedBody(body)),
        ServiceResponse::Raw { status, body } => {
            Err(ApiError::UnexpectedStatus { status, body })
        }
    }
}

fn redacted(headers: &[(String, String)]) -> Vec<(&str, &str)> {
    headers
        .iter()
        .map(|(name, value)| {
            if name.eq_ignore_ascii_case("token") {
                (name.as_str(), "***")
            } else {
                (name.as_str(), value.as_str())
            }
        })
        .collect()
}

impl<T> std::fmt::Debug for TicketBaiClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketBaiClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
