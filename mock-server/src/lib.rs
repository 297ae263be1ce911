//! In-memory emulation of the TicketBaiWS API.
//!
//! Answers the same routes as the real service with the same envelope
//! (`{"result":"OK","return":...}` or `{"result":"ERROR","msg":...}`, always
//! HTTP 200). Bodies are read as JSON on every method, GET and DELETE
//! included. Huellas are SHA-256 digests rather than real TicketBAI
//! signatures.

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::get,
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub const DEFAULT_TOKEN: &str = "test-token";
pub const DEFAULT_NIF: &str = "B00000000";

/// The token/NIF pair every request must present.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub token: String,
    pub nif: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            token: DEFAULT_TOKEN.to_string(),
            nif: DEFAULT_NIF.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
struct Invoice {
    huella: String,
    url: String,
    simplified: bool,
    cancelled: bool,
    completed_by: Option<(String, String)>,
    params: Map<String, Value>,
}

impl Invoice {
    fn summary(&self) -> Value {
        json!({
            "huella": self.huella,
            "qr": format!("data:image/png;base64,{}", STANDARD.encode(self.url.as_bytes())),
            "url": self.url,
        })
    }
}

#[derive(Default)]
struct Ledger {
    invoices: HashMap<(String, String), Invoice>,
    licenses: Vec<Value>,
    companies: Vec<Value>,
}

#[derive(Clone)]
struct AppState {
    credentials: Arc<Credentials>,
    ledger: Arc<RwLock<Ledger>>,
}

type Envelope = Result<Json<Value>, Json<Value>>;

pub fn app() -> Router {
    app_with(Credentials::default())
}

pub fn app_with(credentials: Credentials) -> Router {
    let state = AppState {
        credentials: Arc::new(credentials),
        ledger: Arc::new(RwLock::new(Ledger::default())),
    };
    Router::new()
        .route("/status/", get(status))
        .route("/tbai/", get(lookup_invoice).post(submit_invoice).delete(cancel_invoice))
        .route("/tbai-completar/", post(complete_invoice))
        .route("/tbai-xml/", get(invoice_xml))
        .route("/licencias/", get(list_licenses).post(create_license))
        .route("/empresas/", get(list_companies).post(create_company))
        .route("/epigrafes/", get(list_tax_categories))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(
    listener: TcpListener,
    credentials: Credentials,
) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(credentials)).await
}

fn ok(payload: Value) -> Json<Value> {
    Json(json!({"result": "OK", "return": payload}))
}

fn fail(msg: impl Into<String>) -> Json<Value> {
    Json(json!({"result": "ERROR", "msg": msg.into()}))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), Json<Value>> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    if header("token") == Some(state.credentials.token.as_str())
        && header("nif") == Some(state.credentials.nif.as_str())
    {
        Ok(())
    } else {
        tracing::warn!("rejected request with bad credentials");
        Err(fail("Token o NIF no válido"))
    }
}

/// Empty bodies count as `{}`; anything else must be a JSON object.
fn parse_params(body: &Bytes) -> Result<Map<String, Value>, Json<Value>> {
    if body.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(fail("El cuerpo de la petición no es un objeto JSON")),
    }
}

/// Series and numbers may arrive as strings or numbers.
fn key_part(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn invoice_key(params: &Map<String, Value>) -> Result<(String, String), Json<Value>> {
    match (key_part(params.get("serie")), key_part(params.get("numero"))) {
        (Some(serie), Some(numero)) => Ok((serie, numero)),
        _ => Err(fail("Los campos serie y numero son obligatorios")),
    }
}

fn huella(nif: &str, serie: &str, numero: &str) -> String {
    let digest = Sha256::digest(format!("{nif}|{serie}|{numero}").as_bytes());
    STANDARD.encode(digest)
}

fn new_invoice(nif: &str, serie: &str, numero: &str, params: Map<String, Value>) -> Invoice {
    Invoice {
        huella: huella(nif, serie, numero),
        url: format!("https://batuz.eus/QRTBAI/?id=TBAI-{nif}-{serie}-{numero}"),
        simplified: params
            .get("simplificada")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        cancelled: false,
        completed_by: None,
        params,
    }
}

fn flag(params: &Map<String, Value>, name: &str) -> bool {
    params.get(name).and_then(Value::as_bool).unwrap_or(false)
}

async fn status(State(state): State<AppState>, headers: HeaderMap) -> Envelope {
    authorize(&state, &headers)?;
    Ok(Json(json!({"result": "OK"})))
}

async fn submit_invoice(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Envelope {
    authorize(&state, &headers)?;
    let params = parse_params(&body)?;
    let (serie, numero) = invoice_key(&params)?;
    let zuzendu = flag(&params, "zuzendu");

    let mut ledger = state.ledger.write().await;
    let key = (serie.clone(), numero.clone());
    if let Some(existing) = ledger.invoices.get(&key) {
        if existing.cancelled {
            return Err(fail(format!(
                "La factura {serie}-{numero} está anulada y su número no puede reutilizarse"
            )));
        }
        if !zuzendu {
            return Err(fail(format!("La factura {serie}-{numero} ya existe")));
        }
    }

    let invoice = new_invoice(&state.credentials.nif, &serie, &numero, params);
    let summary = invoice.summary();
    ledger.invoices.insert(key, invoice);
    tracing::info!(%serie, %numero, zuzendu, "invoice_submitted");
    Ok(ok(summary))
}

async fn lookup_invoice(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Envelope {
    authorize(&state, &headers)?;
    let key = invoice_key(&parse_params(&body)?)?;
    let ledger = state.ledger.read().await;
    match ledger.invoices.get(&key) {
        Some(invoice) if !invoice.cancelled => Ok(ok(invoice.summary())),
        Some(_) => Err(fail(format!("La factura {}-{} está anulada", key.0, key.1))),
        None => Err(fail(format!("La factura {}-{} no existe", key.0, key.1))),
    }
}

async fn cancel_invoice(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Envelope {
    authorize(&state, &headers)?;
    let key = invoice_key(&parse_params(&body)?)?;
    let mut ledger = state.ledger.write().await;
    let invoice = ledger
        .invoices
        .get_mut(&key)
        .ok_or_else(|| fail(format!("La factura {}-{} no existe", key.0, key.1)))?;
    if invoice.cancelled {
        return Err(fail(format!("La factura {}-{} ya está anulada", key.0, key.1)));
    }
    invoice.cancelled = true;
    tracing::info!(serie = %key.0, numero = %key.1, "invoice_cancelled");
    Ok(ok(json!([])))
}

async fn complete_invoice(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Envelope {
    authorize(&state, &headers)?;
    let params = parse_params(&body)?;
    let (serie, numero) = invoice_key(&params)?;

    let sources = params
        .get("facturas")
        .and_then(Value::as_array)
        .filter(|list| !list.is_empty())
        .ok_or_else(|| fail("Se debe indicar al menos una factura simplificada en facturas"))?
        .iter()
        .map(|entry| match entry {
            Value::Object(map) => invoice_key(map),
            _ => Err(fail("Cada factura debe indicar serie y numero")),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut ledger = state.ledger.write().await;
    if ledger.invoices.contains_key(&(serie.clone(), numero.clone())) {
        return Err(fail(format!("La factura {serie}-{numero} ya existe")));
    }
    for source in &sources {
        let invoice = ledger
            .invoices
            .get(source)
            .ok_or_else(|| fail(format!("La factura {}-{} no existe", source.0, source.1)))?;
        if invoice.cancelled || !invoice.simplified || invoice.completed_by.is_some() {
            return Err(fail(format!(
                "La factura {}-{} no es una factura simplificada pendiente de completar",
                source.0, source.1
            )));
        }
    }
    for source in &sources {
        if let Some(invoice) = ledger.invoices.get_mut(source) {
            invoice.completed_by = Some((serie.clone(), numero.clone()));
        }
    }

    let invoice = new_invoice(&state.credentials.nif, &serie, &numero, params);
    let summary = invoice.summary();
    ledger.invoices.insert((serie.clone(), numero.clone()), invoice);
    tracing::info!(%serie, %numero, sources = sources.len(), "invoice_completed");
    Ok(ok(summary))
}

async fn invoice_xml(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Envelope {
    authorize(&state, &headers)?;
    let key = invoice_key(&parse_params(&body)?)?;
    let ledger = state.ledger.read().await;
    let invoice = ledger
        .invoices
        .get(&key)
        .ok_or_else(|| fail(format!("La factura {}-{} no existe", key.0, key.1)))?;

    let request = format!(
        concat!(
            "<T:TicketBai><Factura><SerieFactura>{}</SerieFactura>",
            "<NumFactura>{}</NumFactura><Importe>{}</Importe></Factura></T:TicketBai>"
        ),
        key.0,
        key.1,
        invoice.params.get("importe").cloned().unwrap_or(Value::Null)
    );
    let response = format!(
        "<Respuesta><Estado>00</Estado><IdentificadorTBAI>{}</IdentificadorTBAI></Respuesta>",
        invoice.huella
    );
    Ok(ok(json!({
        "xml_request": STANDARD.encode(request),
        "xml_response": STANDARD.encode(response),
    })))
}

async fn list_licenses(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Envelope {
    authorize(&state, &headers)?;
    let params = parse_params(&body)?;
    let wanted = key_part(params.get("id"));
    let ledger = state.ledger.read().await;
    let licenses: Vec<Value> = ledger
        .licenses
        .iter()
        .filter(|license| wanted.is_none() || key_part(license.get("id")) == wanted)
        .cloned()
        .collect();
    Ok(ok(Value::Array(licenses)))
}

async fn create_license(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Envelope {
    authorize(&state, &headers)?;
    let params = parse_params(&body)?;
    let nombre =
        key_part(params.get("nombre")).ok_or_else(|| fail("El campo nombre es obligatorio"))?;
    let license = json!({
        "id": Uuid::new_v4(),
        "nombre": nombre,
        "activa": true,
    });
    state.ledger.write().await.licenses.push(license.clone());
    Ok(ok(license))
}

async fn list_companies(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Envelope {
    authorize(&state, &headers)?;
    let params = parse_params(&body)?;
    let licencia = key_part(params.get("licencia"));
    let nif = key_part(params.get("nif"));
    let ledger = state.ledger.read().await;
    let companies: Vec<Value> = ledger
        .companies
        .iter()
        .filter(|c| licencia.is_none() || key_part(c.get("licencia")) == licencia)
        .filter(|c| nif.is_none() || key_part(c.get("nif")) == nif)
        .cloned()
        .collect();
    Ok(ok(Value::Array(companies)))
}

async fn create_company(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Envelope {
    authorize(&state, &headers)?;
    let mut params = parse_params(&body)?;
    let nif = key_part(params.get("nif")).ok_or_else(|| fail("El campo nif es obligatorio"))?;
    if key_part(params.get("nombre")).is_none() {
        return Err(fail("El campo nombre es obligatorio"));
    }

    let mut ledger = state.ledger.write().await;
    if ledger
        .companies
        .iter()
        .any(|c| key_part(c.get("nif")).as_deref() == Some(nif.as_str()))
    {
        return Err(fail(format!("Ya existe una empresa con NIF {nif}")));
    }
    params.insert("id".to_string(), json!(Uuid::new_v4()));
    let company = Value::Object(params);
    ledger.companies.push(company.clone());
    Ok(ok(company))
}

async fn list_tax_categories(State(state): State<AppState>, headers: HeaderMap) -> Envelope {
    authorize(&state, &headers)?;
    Ok(ok(json!([
        {
            "codigo": "501.1",
            "descripcion": "Construcción completa, reparación y conservación de edificaciones"
        },
        {
            "codigo": "659.4",
            "descripcion": "Comercio al por menor de libros, periódicos y artículos de papelería"
        },
        {"codigo": "671.4", "descripcion": "Restaurantes de un tenedor"},
        {"codigo": "673.2", "descripcion": "Otros cafés y bares"},
    ])))
}
