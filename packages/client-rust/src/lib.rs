//! Bodega client: resilient backend access and the scan workflow for the
//! warehouse terminal.

pub mod api;
pub mod config;
pub mod executor;
pub mod orchestrator;
pub mod transport;

pub use api::{DraftSale, Endpoint, ResourceCall, WarehouseApi};
pub use config::{ClientConfig, ConfigError, RetryPolicy};
pub use executor::{ExecuteError, RequestExecutor};
pub use orchestrator::{
    OrchestratorError, PreviewOutcome, ScanEvent, ScanFailure, ScanOrchestrator, ScanOutcome, ScanState,
    TransitionError,
};
pub use transport::{ApiRequest, HttpTransport, RawResponse, SimulatedTransport, Transport, TransportError};
