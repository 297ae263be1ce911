//! Verify every operation against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector describes the parameters, the request the client must send,
//! a simulated response, and the expected reply or error. Bodies are compared
//! as parsed JSON so key order does not matter.

use std::sync::Mutex;

use serde_json::Value;
use ticketbai_core::{
    ApiError, ClientConfig, Environment, HttpMethod, HttpRequest, HttpResponse, Params, Reply,
    TicketBaiClient, Transport,
};

/// Answers with a fixed response and keeps the last request it saw.
struct ReplayTransport {
    response: HttpResponse,
    last: Mutex<Option<HttpRequest>>,
}

impl ReplayTransport {
    fn new(status: u16, body: &str) -> Self {
        Self {
            response: HttpResponse {
                status,
                headers: Vec::new(),
                body: body.to_string(),
            },
            last: Mutex::new(None),
        }
    }
}

impl Transport for ReplayTransport {
    fn execute(
        &self,
        request: &HttpRequest,
        _verify_tls: bool,
    ) -> Result<HttpResponse, ApiError> {
        *self.last.lock().unwrap() = Some(request.clone());
        Ok(self.response.clone())
    }
}

fn parse_method(s: &str) -> HttpMethod {
    s.parse().unwrap_or_else(|e| panic!("{e}"))
}

fn run(
    client: &TicketBaiClient<ReplayTransport>,
    operation: &str,
    params: &Params,
) -> Result<Reply, ApiError> {
    match operation {
        "status" => client.status(),
        "submit_invoice" => client.submit_invoice(params),
        "complete_invoice" => client.complete_invoice(params),
        "cancel_invoice" => client.cancel_invoice(params),
        "lookup_invoice" => client.lookup_invoice(params),
        "fetch_invoice_xml" => client.fetch_invoice_xml(params),
        "list_licenses" => client.list_licenses(params),
        "create_license" => client.create_license(params),
        "list_companies" => client.list_companies(params),
        "create_company" => client.create_company(params),
        "list_tax_categories" => client.list_tax_categories(),
        other => panic!("unknown operation: {other}"),
    }
}

fn expected_reply(expected: &Value) -> Reply {
    match expected["kind"].as_str().unwrap() {
        "success" => Reply::Success(expected["value"].clone()),
        "failure" => Reply::Failure(expected["value"].as_str().unwrap().to_string()),
        other => panic!("unknown reply kind: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[test]
fn operation_test_vectors() {
    let raw = include_str!("../../test-vectors/operations.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let base_url = vectors["base_url"].as_str().unwrap();
    let token = vectors["token"].as_str().unwrap();
    let nif = vectors["nif"].as_str().unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let sim = &case["simulated_response"];
        let transport = ReplayTransport::new(
            sim["status"].as_u64().unwrap() as u16,
            sim["body"].as_str().unwrap(),
        );
        let config = ClientConfig::new(Environment::Test, token, nif);
        let client = TicketBaiClient::with_transport(config, transport);
        let params = case["params"].as_object().cloned().unwrap();

        let outcome = run(&client, case["operation"].as_str().unwrap(), &params);

        // Verify request
        let expected_req = &case["expected_request"];
        let req = client.transport().last.lock().unwrap().clone().unwrap();
        let method = parse_method(expected_req["method"].as_str().unwrap());
        let path = format!("{base_url}{}", expected_req["path"].as_str().unwrap());
        assert_eq!(req.method, method, "{name}: method");
        assert_eq!(req.path, path, "{name}: path");
        assert_eq!(
            req.header("Content-Type"),
            Some("application/json"),
            "{name}: content-type"
        );
        assert_eq!(
            req.header("Accept"),
            Some("application/json;charset=UTF-8"),
            "{name}: accept"
        );
        assert_eq!(req.header("Token"), Some(token), "{name}: token");
        assert_eq!(req.header("Nif"), Some(nif), "{name}: nif");
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, expected_req["body"], "{name}: body");

        // Verify outcome
        if let Some(expected) = case.get("expected_error") {
            let err = outcome.unwrap_err();
            let expected_body = expected["body"].as_str().unwrap();
            match expected["kind"].as_str().unwrap() {
                "malformed_body" => {
                    assert!(
                        matches!(&err, ApiError::MalformedBody(body) if body == expected_body),
                        "{name}: {err}"
                    );
                }
                "unexpected_status" => {
                    let status = expected["status"].as_u64().unwrap() as u16;
                    assert!(
                        matches!(
                            &err,
                            ApiError::UnexpectedStatus { status: s, body }
                                if *s == status && body == expected_body
                        ),
                        "{name}: {err}"
                    );
                }
                other => panic!("{name}: unknown error kind {other}"),
            }
        } else {
            let reply = expected_reply(&case["expected_reply"]);
            assert_eq!(outcome.unwrap(), reply, "{name}: reply");
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[test]
fn status_test_vectors() {
    let raw = include_str!("../../test-vectors/status.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let transport = ReplayTransport::new(
            case["status"].as_u64().unwrap() as u16,
            case["body"].as_str().unwrap(),
        );
        let client = TicketBaiClient::with_transport(
            ClientConfig::new(Environment::Production, "t", "B12345678"),
            transport,
        );
        assert_eq!(client.check_status(), case["expected"].as_bool().unwrap(), "{name}");
    }
}
