//! Typed operations against the warehouse backend.
//!
//! Each operation builds one [`ApiRequest`], runs it through the
//! [`RequestExecutor`], and normalizes whatever comes back into a
//! [`CanonicalResult`]. Nothing above this layer sees raw HTTP.

use std::sync::Arc;

use bodega_core::{error_codes, normalize, CanonicalResult, EntityType, ErrorKind, Failure, Location};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::RetryPolicy;
use crate::executor::RequestExecutor;
use crate::transport::{ApiRequest, Transport};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Consolidated endpoints accepting `{ resource, action, params }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Inventory,
    Sales,
    Admin,
}

impl Endpoint {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Inventory => "/inventory",
            Self::Sales => "/sales",
            Self::Admin => "/admin",
        }
    }
}

/// Body of a consolidated endpoint call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceCall {
    pub resource: String,
    pub action: String,
    pub params: Map<String, Value>,
}

impl ResourceCall {
    #[must_use]
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            params: Map::new(),
        }
    }

    #[must_use]
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

/// An open sales order that still accepts items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSale {
    pub id: String,
    #[serde(default)]
    pub items: Vec<String>,
}

/// Decode the success payload into `T`; a shape mismatch becomes `PARSE_ERROR`.
fn decode<T: DeserializeOwned>(result: CanonicalResult<Value>) -> CanonicalResult<T> {
    match result {
        CanonicalResult::Ok { data, message } => match serde_json::from_value::<T>(data.clone()) {
            Ok(data) => CanonicalResult::Ok { data, message },
            Err(e) => CanonicalResult::Err(
                Failure::new(error_codes::PARSE_ERROR, "Respuesta inesperada del servidor")
                    .with_details(serde_json::json!({ "cause": e.to_string(), "body": data })),
            ),
        },
        CanonicalResult::Err(failure) => CanonicalResult::Err(failure),
    }
}

// ---------------------------------------------------------------------------
// WarehouseApi
// ---------------------------------------------------------------------------

/// Backend operations used by the scanning workflow.
/// Failures worth a warning: unknown to the code table and not a local cancel.
fn is_unclassified(failure: &Failure) -> bool {
    failure.kind() == ErrorKind::Unknown && failure.error_code != error_codes::CANCELLED
}

#[derive(Debug, Clone)]
pub struct WarehouseApi {
    executor: RequestExecutor,
}

impl WarehouseApi {
    pub fn new<T>(transport: Arc<T>, policy: RetryPolicy) -> Self
    where
        T: Transport + ?Sized + 'static,
    {
        Self::from_executor(RequestExecutor::new(transport, policy))
    }

    #[must_use]
    pub fn from_executor(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    #[must_use]
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Execute and normalize one request.
    pub async fn send(&self, request: ApiRequest, cancel: &CancellationToken) -> CanonicalResult<Value> {
        let request_id = request.request_id.clone();
        let path = request.path.clone();
        let result = match self.executor.execute(request, cancel).await {
            Ok(raw) => normalize(raw.status, &raw.body),
            Err(e) => CanonicalResult::Err(e.to_failure()),
        };
        if let Some(failure) = result.failure().filter(|f| is_unclassified(f)) {
            warn!(
                %request_id,
                %path,
                error_code = %failure.error_code,
                message = %failure.message,
                details = ?failure.details,
                "unclassified backend failure"
            );
        }
        result
    }

    /// Call a consolidated endpoint.
    pub async fn call(
        &self,
        endpoint: Endpoint,
        call: &ResourceCall,
        cancel: &CancellationToken,
    ) -> CanonicalResult<Value> {
        self.send(ApiRequest::post(endpoint.path(), call), cancel).await
    }

    /// Look up a scanned code: `GET /getInfoFromScannedCode?codigo=`.
    pub async fn scanned_code_info(&self, code: &str, cancel: &CancellationToken) -> CanonicalResult<Value> {
        let request = ApiRequest::get("/getInfoFromScannedCode").with_query("codigo", code);
        self.send(request, cancel).await
    }

    pub async fn move_box(
        &self,
        code: &str,
        location: Location,
        cancel: &CancellationToken,
    ) -> CanonicalResult<Value> {
        self.move_entity(EntityType::Box, code, location, cancel).await
    }

    pub async fn move_pallet(
        &self,
        code: &str,
        location: Location,
        cancel: &CancellationToken,
    ) -> CanonicalResult<Value> {
        self.move_entity(EntityType::Pallet, code, location, cancel).await
    }

    /// Move either entity type; the resource name follows the entity.
    pub async fn move_entity(
        &self,
        entity: EntityType,
        code: &str,
        location: Location,
        cancel: &CancellationToken,
    ) -> CanonicalResult<Value> {
        let call = ResourceCall::new(entity.resource(), "move")
            .param("codigo", code)
            .param("ubicacion", location.as_str());
        self.call(Endpoint::Inventory, &call, cancel).await
    }

    /// Register a new pallet: `POST /createPallet { codigo }`.
    pub async fn create_pallet(&self, code: &str, cancel: &CancellationToken) -> CanonicalResult<Value> {
        let request = ApiRequest::post("/createPallet", &serde_json::json!({ "codigo": code }));
        self.send(request, cancel).await
    }

    /// Box codes currently on a pallet.
    pub async fn pallet_contents(&self, code: &str, cancel: &CancellationToken) -> CanonicalResult<Vec<String>> {
        #[derive(Deserialize)]
        struct Contents {
            #[serde(default)]
            cajas: Vec<String>,
        }

        let call = ResourceCall::new("pallet", "contents").param("codigo", code);
        decode::<Contents>(self.call(Endpoint::Inventory, &call, cancel).await).map(|c| c.cajas)
    }

    pub async fn report_issue(
        &self,
        entity: EntityType,
        code: &str,
        reason: &str,
        cancel: &CancellationToken,
    ) -> CanonicalResult<Value> {
        let call = ResourceCall::new(entity.resource(), "reportIssue")
            .param("codigo", code)
            .param("motivo", reason);
        self.call(Endpoint::Inventory, &call, cancel).await
    }

    pub async fn list_draft_sales(&self, cancel: &CancellationToken) -> CanonicalResult<Vec<DraftSale>> {
        let call = ResourceCall::new("draftSale", "list");
        decode(self.call(Endpoint::Sales, &call, cancel).await)
    }

    pub async fn add_to_draft_sale(
        &self,
        sale_id: &str,
        code: &str,
        cancel: &CancellationToken,
    ) -> CanonicalResult<DraftSale> {
        self.draft_sale_item("addItem", sale_id, code, cancel).await
    }

    pub async fn remove_from_draft_sale(
        &self,
        sale_id: &str,
        code: &str,
        cancel: &CancellationToken,
    ) -> CanonicalResult<DraftSale> {
        self.draft_sale_item("removeItem", sale_id, code, cancel).await
    }

    pub async fn confirm_draft_sale(&self, sale_id: &str, cancel: &CancellationToken) -> CanonicalResult<DraftSale> {
        let call = ResourceCall::new("draftSale", "confirm").param("ventaId", sale_id);
        decode(self.call(Endpoint::Sales, &call, cancel).await)
    }

    /// Backend liveness check through the admin endpoint.
    pub async fn ping(&self, cancel: &CancellationToken) -> CanonicalResult<Value> {
        let call = ResourceCall::new("health", "ping");
        self.call(Endpoint::Admin, &call, cancel).await
    }

    async fn draft_sale_item(
        &self,
        action: &str,
        sale_id: &str,
        code: &str,
        cancel: &CancellationToken,
    ) -> CanonicalResult<DraftSale> {
        let call = ResourceCall::new("draftSale", action)
            .param("ventaId", sale_id)
            .param("codigo", code);
        decode(self.call(Endpoint::Sales, &call, cancel).await)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
