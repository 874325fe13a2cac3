//! Deterministic in-memory backend for development without a reachable server.
//!
//! Consolidated endpoints answer with the unified envelope, direct endpoints
//! with the legacy envelope, and `/admin` with a bare passthrough object, so a
//! development session exercises every normalization path.
//!
//! Seeded behavior:
//! - codes ending in `000` do not exist
//! - every other well-formed code exists and starts in `BODEGA`
//! - draft sale `V-1` exists and is open

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};

use bodega_core::error_codes as codes;
use bodega_core::Location;

use super::{ApiRequest, RawResponse, Transport, TransportError};

#[derive(Debug, Deserialize)]
struct ResourceCall {
    resource: String,
    action: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Default)]
struct DraftSale {
    items: Vec<String>,
    confirmed: bool,
}

#[derive(Debug)]
struct SimState {
    locations: HashMap<String, Location>,
    created_pallets: HashSet<String>,
    pallet_boxes: HashMap<String, Vec<String>>,
    sales: BTreeMap<String, DraftSale>,
    issues: Vec<(String, String)>,
}

impl Default for SimState {
    fn default() -> Self {
        let mut sales = BTreeMap::new();
        sales.insert("V-1".to_string(), DraftSale::default());
        Self {
            locations: HashMap::new(),
            created_pallets: HashSet::new(),
            pallet_boxes: HashMap::new(),
            sales,
            issues: Vec::new(),
        }
    }
}

impl SimState {
    fn exists(&self, code: &str) -> bool {
        self.created_pallets.contains(code) || (!code.is_empty() && !code.ends_with("000"))
    }

    fn location_of(&self, code: &str) -> Location {
        self.locations.get(code).copied().unwrap_or(Location::BODEGA)
    }

    fn boxes_of(&mut self, pallet: &str) -> &Vec<String> {
        self.pallet_boxes.entry(pallet.to_string()).or_insert_with(|| {
            // Three deterministic 15-digit box codes derived from the pallet code.
            let stem: String = pallet.chars().rev().take(12).collect();
            (1..=3).map(|n| format!("{stem:0>12}{n:03}")).collect()
        })
    }
}

/// In-memory backend implementing [`Transport`].
#[derive(Debug, Default)]
pub struct SimulatedTransport {
    state: Mutex<SimState>,
}

impl SimulatedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues reported so far as `(code, reason)` pairs.
    #[must_use]
    pub fn reported_issues(&self) -> Vec<(String, String)> {
        self.state.lock().issues.clone()
    }

    fn handle(&self, request: &ApiRequest) -> RawResponse {
        let body = request.body.clone().unwrap_or(Value::Null);
        match (request.method.as_str(), request.path.as_str()) {
            ("GET", "/getInfoFromScannedCode") => {
                let code = request
                    .query
                    .iter()
                    .find(|(k, _)| k == "codigo")
                    .map(|(_, v)| v.as_str())
                    .unwrap_or_default();
                self.scanned_code_info(code)
            }
            ("POST", "/createPallet") => {
                let code = body.get("codigo").and_then(Value::as_str).unwrap_or_default();
                self.create_pallet(code)
            }
            ("POST", "/inventory" | "/sales" | "/admin") => {
                match serde_json::from_value::<ResourceCall>(body) {
                    Ok(call) => self.resource_call(&request.path, &call),
                    Err(e) => unified_error(400, codes::VALIDATION_ERROR, &format!("cuerpo inválido: {e}")),
                }
            }
            _ => RawResponse::new(404, ""),
        }
    }

    fn scanned_code_info(&self, code: &str) -> RawResponse {
        let state = self.state.lock();
        if !state.exists(code) {
            return RawResponse::json(
                200,
                &json!({"success": false, "error": {"code": codes::BOX_NOT_FOUND, "message": format!("Code {code} not found")}}),
            );
        }
        RawResponse::json(
            200,
            &json!({"success": true, "data": {"codigo": code, "ubicacion": state.location_of(code)}}),
        )
    }

    fn create_pallet(&self, code: &str) -> RawResponse {
        let mut state = self.state.lock();
        if code.is_empty() {
            return RawResponse::json(400, &json!({"success": false, "error": "codigo requerido"}));
        }
        if !state.created_pallets.insert(code.to_string()) {
            return RawResponse::json(
                409,
                &json!({"success": false, "error": {"code": codes::PALLET_ALREADY_EXISTS, "message": "Pallet already exists"}}),
            );
        }
        RawResponse::json(200, &json!({"success": true, "codigo": code}))
    }

    fn resource_call(&self, endpoint: &str, call: &ResourceCall) -> RawResponse {
        let code = call.params.get("codigo").and_then(Value::as_str).unwrap_or_default();
        let mut state = self.state.lock();
        match (endpoint, call.resource.as_str(), call.action.as_str()) {
            ("/inventory", resource @ ("box" | "pallet"), "move") => {
                let not_found = if resource == "box" { codes::BOX_NOT_FOUND } else { codes::PALLET_NOT_FOUND };
                if !state.exists(code) {
                    return unified_error(404, not_found, &format!("{resource} {code} not found"));
                }
                let Some(target) = call
                    .params
                    .get("ubicacion")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<Location>().ok())
                else {
                    return unified_error(400, codes::INVALID_LOCATION, "ubicacion inválida");
                };
                if resource == "box" && state.location_of(code) == target {
                    return unified_error(409, codes::BOX_ALREADY_IN_LOCATION, "Box already in the same location");
                }
                let from = state.location_of(code);
                state.locations.insert(code.to_string(), target);
                unified_ok("Movimiento registrado", &json!({"codigo": code, "desde": from, "hacia": target}))
            }
            ("/inventory", "pallet", "contents") => {
                if !state.exists(code) {
                    return unified_error(404, codes::PALLET_NOT_FOUND, &format!("pallet {code} not found"));
                }
                let boxes = state.boxes_of(code).clone();
                unified_ok("", &json!({"codigo": code, "cajas": boxes}))
            }
            ("/inventory", "box" | "pallet", "reportIssue") => {
                let reason = call.params.get("motivo").and_then(Value::as_str).unwrap_or_default();
                state.issues.push((code.to_string(), reason.to_string()));
                unified_ok("Problema reportado", &json!({"codigo": code}))
            }
            ("/sales", "draftSale", action) => Self::draft_sale(&mut state, action, &call.params),
            ("/admin", "health", "ping") => RawResponse::json(200, &json!({"pong": true})),
            _ => unified_error(404, codes::NOT_FOUND, "unknown resource action"),
        }
    }

    fn draft_sale(state: &mut SimState, action: &str, params: &Value) -> RawResponse {
        if action == "list" {
            let sales: Vec<Value> = state
                .sales
                .iter()
                .filter(|(_, sale)| !sale.confirmed)
                .map(|(id, sale)| json!({"id": id, "items": sale.items}))
                .collect();
            return unified_ok("", &Value::Array(sales));
        }

        let sale_id = params.get("ventaId").and_then(Value::as_str).unwrap_or_default();
        let code = params.get("codigo").and_then(Value::as_str).unwrap_or_default().to_string();
        let in_other_sale = state
            .sales
            .iter()
            .any(|(id, sale)| id != sale_id && sale.items.contains(&code));
        let Some(sale) = state.sales.get_mut(sale_id) else {
            return unified_error(404, codes::SALE_NOT_FOUND, &format!("sale {sale_id} not found"));
        };
        if sale.confirmed {
            return unified_error(409, codes::CONFLICT, "Sale already confirmed");
        }
        match action {
            "addItem" if in_other_sale => {
                unified_error(409, codes::BOX_ALREADY_IN_SALE, "Box belongs to another sale")
            }
            "addItem" => {
                if !sale.items.contains(&code) {
                    sale.items.push(code);
                }
                unified_ok("Agregado a la venta", &json!({"id": sale_id, "items": sale.items}))
            }
            "removeItem" => {
                sale.items.retain(|item| *item != code);
                unified_ok("Retirado de la venta", &json!({"id": sale_id, "items": sale.items}))
            }
            "confirm" => {
                sale.confirmed = true;
                unified_ok("Venta confirmada", &json!({"id": sale_id, "items": sale.items}))
            }
            _ => unified_error(404, codes::NOT_FOUND, "unknown sale action"),
        }
    }
}

fn unified_ok(message: &str, data: &Value) -> RawResponse {
    RawResponse::json(200, &json!({"status": "success", "message": message, "data": data}))
}

fn unified_error(status: u16, code: &str, message: &str) -> RawResponse {
    RawResponse::json(
        status,
        &json!({"status": "error", "message": message, "error": {"code": code, "message": message}}),
    )
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        tracing::debug!(method = %request.method, path = %request.path, "simulated backend request");
        Ok(self.handle(request))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
