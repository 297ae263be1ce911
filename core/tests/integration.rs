//! Full invoice lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives every client
//! operation over real HTTP through `UreqTransport`. This checks that JSON
//! bodies on GET and DELETE, the fixed headers and the envelope handling work
//! end-to-end.

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::{json, Value};
use ticketbai_core::{ApiError, ClientConfig, Environment, Params, Reply, TicketBaiClient};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("ticketbai=debug,ticketbai_core=debug")
        .with_test_writer()
        .try_init();
}

fn start_mock_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn client_for(addr: SocketAddr, token: &str) -> TicketBaiClient {
    let config = ClientConfig::new(Environment::Test, token, mock_server::DEFAULT_NIF)
        .with_base_url(format!("http://{addr}"))
        .with_timeout(Duration::from_secs(5))
        .unwrap();
    TicketBaiClient::new(config)
}

fn params(value: Value) -> Params {
    value.as_object().cloned().unwrap()
}

fn success(reply: Reply) -> Value {
    match reply {
        Reply::Success(payload) => payload,
        Reply::Failure(msg) => panic!("expected success, got failure: {msg}"),
    }
}

fn failure(reply: Reply) -> String {
    match reply {
        Reply::Failure(msg) => msg,
        Reply::Success(payload) => panic!("expected failure, got success: {payload}"),
    }
}

#[test]
fn invoice_lifecycle() {
    init_tracing();
    let addr = start_mock_server();
    let mut client = client_for(addr, mock_server::DEFAULT_TOKEN);

    // Step 1: service is up.
    assert!(client.check_status());
    assert_eq!(client.status().unwrap(), Reply::Success(Value::Null));

    // Step 2: submit an invoice.
    let invoice = params(json!({"serie": "A", "numero": 1, "importe": 121.0}));
    let tbai = success(client.submit_invoice(&invoice).unwrap());
    assert!(tbai["huella"].is_string());
    assert!(tbai["qr"].as_str().unwrap().starts_with("data:"));

    // Step 3: resubmitting without zuzendu is rejected by the service.
    let msg = failure(client.submit_invoice(&invoice).unwrap());
    assert!(msg.contains("ya existe"), "{msg}");

    // Step 4: zuzendu correction keeps the same series and number.
    let mut corrected = invoice.clone();
    corrected.insert("zuzendu".to_string(), json!(true));
    success(client.submit_invoice(&corrected).unwrap());

    // Step 5: lookup sends its parameters as a GET body.
    let key = params(json!({"serie": "A", "numero": 1}));
    let found = success(client.lookup_invoice(&key).unwrap());
    assert_eq!(found["huella"], tbai["huella"]);

    // Step 6: XML download.
    let xml = success(client.fetch_invoice_xml(&key).unwrap());
    assert!(xml["xml_request"].is_string());
    assert!(xml["xml_response"].is_string());

    // Step 7: debug mode logs but still returns normally.
    client.set_debug(true);
    let again = success(client.lookup_invoice(&key).unwrap());
    assert_eq!(again, found);
    client.set_debug(false);

    // Step 8: cancel, then the number is gone for good.
    assert_eq!(client.cancel_invoice(&key).unwrap(), Reply::Success(json!([])));
    failure(client.lookup_invoice(&key).unwrap());
    failure(client.submit_invoice(&corrected).unwrap());
}

#[test]
fn complete_simplified_invoices() {
    init_tracing();
    let client = client_for(start_mock_server(), mock_server::DEFAULT_TOKEN);

    for numero in 1..=2 {
        let simplified = params(json!({"serie": "T", "numero": numero, "simplificada": true}));
        success(client.submit_invoice(&simplified).unwrap());
    }

    let full = params(json!({
        "serie": "F",
        "numero": 1,
        "facturas": [{"serie": "T", "numero": 1}, {"serie": "T", "numero": 2}]
    }));
    let tbai = success(client.complete_invoice(&full).unwrap());
    assert!(tbai["huella"].is_string());

    let key = params(json!({"serie": "F", "numero": 1}));
    let lookup = success(client.lookup_invoice(&key).unwrap());
    assert_eq!(lookup, tbai);
}

#[test]
fn licenses_companies_and_tax_categories() {
    init_tracing();
    let client = client_for(start_mock_server(), mock_server::DEFAULT_TOKEN);

    assert_eq!(success(client.list_licenses(&Params::new()).unwrap()), json!([]));
    let new_license = params(json!({"nombre": "Tienda centro"}));
    let license = success(client.create_license(&new_license).unwrap());
    let by_id = params(json!({"id": license["id"]}));
    let licenses = success(client.list_licenses(&by_id).unwrap());
    assert_eq!(licenses[0]["nombre"], "Tienda centro");

    let company = params(json!({
        "nif": "B12345678",
        "nombre": "Ejemplo SL",
        "licencia": license["id"]
    }));
    success(client.create_company(&company).unwrap());
    failure(client.create_company(&company).unwrap());
    let by_license = params(json!({"licencia": license["id"]}));
    let companies = success(client.list_companies(&by_license).unwrap());
    assert_eq!(companies.as_array().unwrap().len(), 1);

    let categories = success(client.list_tax_categories().unwrap());
    assert!(!categories.as_array().unwrap().is_empty());
}

#[test]
fn wrong_token_is_a_failure_reply() {
    init_tracing();
    let client = client_for(start_mock_server(), "not-the-token");
    assert!(!client.check_status());
    assert_eq!(
        client.status().unwrap(),
        Reply::Failure("Token o NIF no válido".to_string())
    );
    let msg = failure(client.submit_invoice(&params(json!({"serie": "A", "numero": 1}))).unwrap());
    assert_eq!(msg, "Token o NIF no válido");
}

#[test]
fn unknown_route_is_unexpected_status() {
    init_tracing();
    let client = client_for(start_mock_server(), mock_server::DEFAULT_TOKEN);
    let err = client
        .call_service("facturas", ticketbai_core::HttpMethod::Get, &Params::new())
        .unwrap_err();
    assert!(matches!(err, ApiError::UnexpectedStatus { status: 404, .. }));
}

#[test]
fn connection_refused_is_a_transport_error() {
    init_tracing();
    // Bind then drop to get a port nothing listens on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let client = client_for(addr, mock_server::DEFAULT_TOKEN);

    assert!(!client.check_status());
    let err = client.submit_invoice(&params(json!({"serie": "A", "numero": 1}))).unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}
