//! Scan workflow driver.
//!
//! [`ScanOrchestrator`] owns one terminal session: it classifies scans,
//! checks target locations, commits moves through the [`WarehouseApi`], and
//! records successful commits. Every state change goes through
//! [`ScanState::transition`]; this module only performs the I/O around it.

pub mod guard;
pub mod outcome;
pub mod state;

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bodega_core::{
    CanonicalResult, ClockSource, CodeFormat, EntityType, ErrorContext, Location, LocationPolicy,
    PendingConfirmation, ScanHistory, ScanHistoryEntry, ScanResult, ScannedCode, SystemClock,
};

use crate::api::WarehouseApi;
use crate::config::ClientConfig;
use crate::transport::Transport;

pub use self::guard::{InFlightGuard, InFlightPermit};
pub use self::outcome::{PreviewOutcome, ScanFailure, ScanOutcome};
pub use self::state::{ScanEvent, ScanState, TransitionError};

/// Calls the orchestrator refuses outright. Backend and validation failures
/// are not errors; they come back as [`ScanOutcome::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestratorError {
    #[error("another scan step is still in progress")]
    Busy,
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error("a reason is required to report an issue")]
    EmptyReason,
}

struct Session {
    state: ScanState,
    history: ScanHistory,
    /// Bumped by every request start and every cancel. A completion whose
    /// generation no longer matches is discarded.
    generation: u64,
    active: Option<CancellationToken>,
}

impl Session {
    fn apply(&mut self, event: ScanEvent) -> Result<(), TransitionError> {
        let from = self.state.name();
        let event_name = event.name();
        self.state = self.state.clone().transition(event)?;
        debug!(from, event = event_name, to = self.state.name(), "scan state transition");
        Ok(())
    }
}

/// An in-flight backend call bound to the session generation it started in.
///
/// Dropped before [`RequestGuard::finish`], it retires the request the way
/// [`ScanOrchestrator::cancel`] would, aborting an open commit back to the
/// state it started from.
struct RequestGuard<'a> {
    session: &'a Mutex<Session>,
    generation: u64,
    token: CancellationToken,
    finished: bool,
}

impl<'a> RequestGuard<'a> {
    /// The locked session, or `None` when the request was cancelled after
    /// it started.
    fn finish(mut self) -> Option<MutexGuard<'a, Session>> {
        self.finished = true;
        let session = self.session;
        let mut session = session.lock();
        if session.generation != self.generation {
            debug!(generation = self.generation, current = session.generation, "discarding stale result");
            return None;
        }
        session.active = None;
        Some(session)
    }
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut session = self.session.lock();
        if session.generation != self.generation {
            return;
        }
        session.generation += 1;
        if let Some(token) = session.active.take() {
            token.cancel();
        }
        if matches!(session.state, ScanState::Committing { .. }) {
            if let Err(e) = session.apply(ScanEvent::Aborted) {
                warn!(error = %e, "abandoned commit could not be aborted");
            }
        }
        info!(state = session.state.name(), "in-flight request abandoned");
    }
}

/// One terminal session of the scanning workflow.
pub struct ScanOrchestrator {
    api: WarehouseApi,
    format: CodeFormat,
    policy: LocationPolicy,
    clock: Arc<dyn ClockSource>,
    guard: InFlightGuard,
    session: Mutex<Session>,
}

impl std::fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("format", &self.format)
            .field("state", &self.session.lock().state)
            .finish_non_exhaustive()
    }
}

impl ScanOrchestrator {
    /// Session talking to `transport` with the retry policy, code format and
    /// history capacity from `config`.
    pub fn new<T>(transport: Arc<T>, config: &ClientConfig) -> Self
    where
        T: Transport + ?Sized + 'static,
    {
        Self::from_api(WarehouseApi::new(transport, config.retry.clone()), config)
    }

    #[must_use]
    pub fn from_api(api: WarehouseApi, config: &ClientConfig) -> Self {
        Self {
            api,
            format: config.code_format.clone(),
            policy: LocationPolicy,
            clock: Arc::new(SystemClock),
            guard: InFlightGuard::new(),
            session: Mutex::new(Session {
                state: ScanState::Idle,
                history: ScanHistory::with_capacity(config.history_capacity),
                generation: 0,
                active: None,
            }),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn api(&self) -> &WarehouseApi {
        &self.api
    }

    #[must_use]
    pub fn state(&self) -> ScanState {
        self.session.lock().state.clone()
    }

    /// Committed scans, newest first.
    #[must_use]
    pub fn history(&self) -> Vec<ScanHistoryEntry> {
        self.session.lock().history.snapshot()
    }

    #[must_use]
    pub fn valid_locations(&self, entity: EntityType) -> &'static [Location] {
        self.policy.valid_locations(entity)
    }

    /// Whether a step currently holds the session.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }

    /// Classify `raw`, check `location`, then commit a box immediately or
    /// park a pallet for confirmation.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::Busy`] while another step runs, and
    /// [`OrchestratorError::InvalidTransition`] while a pallet awaits
    /// confirmation.
    pub async fn submit_scan(&self, raw: &str, location: &str) -> Result<ScanOutcome, OrchestratorError> {
        let _permit = self.guard.try_enter().ok_or(OrchestratorError::Busy)?;
        self.session.lock().apply(ScanEvent::ScanSubmitted)?;

        let validated = self.format.classify(raw).and_then(|code| {
            let target = self.policy.check_target(code.entity_type, location)?;
            Ok((code, target))
        });
        let (code, target) = match validated {
            Ok(accepted) => accepted,
            Err(e) => {
                debug!(raw, location, error = %e, "scan rejected");
                let failure = ScanFailure::from_failure(&e.to_failure(), Some(ErrorContext::Scan));
                self.session.lock().apply(ScanEvent::ValidationFailed(failure.clone()))?;
                return Ok(ScanOutcome::Failed(failure));
            }
        };

        match code.entity_type {
            EntityType::Pallet => {
                let pending = PendingConfirmation {
                    code,
                    requested_location: target,
                };
                self.session.lock().apply(ScanEvent::PalletAccepted(pending.clone()))?;
                info!(code = %pending.code.normalized, location = %target, "pallet awaiting confirmation");
                Ok(ScanOutcome::AwaitingConfirmation(pending))
            }
            EntityType::Box => {
                self.session.lock().apply(ScanEvent::BoxAccepted)?;
                self.commit(code, target, ErrorContext::Scan).await
            }
        }
    }

    /// Commit the pending pallet. After a successful commit this is a no-op.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::Busy`] while another step runs, and
    /// [`OrchestratorError::InvalidTransition`] when nothing is pending.
    pub async fn confirm(&self) -> Result<ScanOutcome, OrchestratorError> {
        let _permit = self.guard.try_enter().ok_or(OrchestratorError::Busy)?;
        let pending = {
            let mut session = self.session.lock();
            session.apply(ScanEvent::Confirmed)?;
            match &session.state {
                ScanState::Succeeded(result) => return Ok(ScanOutcome::AlreadyCommitted(result.clone())),
                ScanState::Committing { pending: Some(pending) } => pending.clone(),
                other => {
                    return Err(TransitionError {
                        state: other.name(),
                        event: "confirmed",
                    }
                    .into())
                }
            }
        };
        self.commit(pending.code, pending.requested_location, ErrorContext::Move)
            .await
    }

    /// Abort the in-flight commit, or drop the pending pallet.
    ///
    /// An aborted commit returns to the state it started from; its late
    /// result, if any, is discarded.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::InvalidTransition`] when there is nothing to cancel.
    pub fn cancel(&self) -> Result<ScanState, OrchestratorError> {
        let mut session = self.session.lock();
        let event = if matches!(session.state, ScanState::Committing { .. }) {
            ScanEvent::Aborted
        } else {
            ScanEvent::Cancelled
        };
        session.apply(event)?;
        if let Some(token) = session.active.take() {
            token.cancel();
        }
        session.generation += 1;
        info!(state = session.state.name(), "scan cancelled");
        Ok(session.state.clone())
    }

    /// Report a problem with the pending pallet instead of moving it.
    ///
    /// On success the pallet is dropped and the session returns to idle. On
    /// failure the pallet stays pending.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::EmptyReason`] for a blank reason,
    /// [`OrchestratorError::Busy`] while another step runs, and
    /// [`OrchestratorError::InvalidTransition`] when nothing is pending.
    pub async fn report_issue(&self, reason: &str) -> Result<ScanOutcome, OrchestratorError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(OrchestratorError::EmptyReason);
        }
        let _permit = self.guard.try_enter().ok_or(OrchestratorError::Busy)?;
        let pending = self.require_pending(&ScanEvent::IssueReported)?;

        let request = self.begin_request();
        let result = self
            .api
            .report_issue(pending.entity_type(), &pending.code.normalized, reason, &request.token)
            .await;

        let Some(mut session) = request.finish() else {
            return Ok(ScanOutcome::Cancelled);
        };
        match result {
            CanonicalResult::Ok { .. } => {
                session.apply(ScanEvent::IssueReported)?;
                info!(code = %pending.code.normalized, reason, "issue reported");
                Ok(ScanOutcome::IssueReported {
                    code: pending.code.normalized,
                    reason: reason.to_string(),
                })
            }
            CanonicalResult::Err(failure) => Ok(ScanOutcome::Failed(ScanFailure::from_failure(
                &failure,
                Some(ErrorContext::Report),
            ))),
        }
    }

    /// Fetch the pending pallet's box list without committing anything.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::Busy`] while another step runs, and
    /// [`OrchestratorError::InvalidTransition`] when nothing is pending.
    pub async fn preview_pending(&self) -> Result<PreviewOutcome, OrchestratorError> {
        let _permit = self.guard.try_enter().ok_or(OrchestratorError::Busy)?;
        let pending = self.require_pending(&ScanEvent::Confirmed)?;

        let request = self.begin_request();
        let result = self.api.pallet_contents(&pending.code.normalized, &request.token).await;

        if request.finish().is_none() {
            return Ok(PreviewOutcome::Cancelled);
        }
        Ok(match result {
            CanonicalResult::Ok { data, .. } => PreviewOutcome::Contents {
                code: pending.code.normalized,
                boxes: data,
            },
            CanonicalResult::Err(failure) => {
                PreviewOutcome::Failed(ScanFailure::from_failure(&failure, Some(ErrorContext::Scan)))
            }
        })
    }

    // -- internals ----------------------------------------------------------

    /// The pending pallet, provided `event` would be accepted from the
    /// current state. The state itself is left unchanged.
    fn require_pending(&self, event: &ScanEvent) -> Result<PendingConfirmation, TransitionError> {
        let session = self.session.lock();
        let rejected = TransitionError {
            state: session.state.name(),
            event: event.name(),
        };
        if session.state.clone().transition(event.clone()).is_err() {
            return Err(rejected);
        }
        session.state.pending().cloned().ok_or(rejected)
    }

    fn begin_request(&self) -> RequestGuard<'_> {
        let mut session = self.session.lock();
        session.generation += 1;
        let token = CancellationToken::new();
        session.active = Some(token.clone());
        RequestGuard {
            session: &self.session,
            generation: session.generation,
            token,
            finished: false,
        }
    }

    async fn commit(
        &self,
        code: ScannedCode,
        location: Location,
        context: ErrorContext,
    ) -> Result<ScanOutcome, OrchestratorError> {
        let request = self.begin_request();
        let result = self
            .api
            .move_entity(code.entity_type, &code.normalized, location, &request.token)
            .await;

        let Some(mut session) = request.finish() else {
            return Ok(ScanOutcome::Cancelled);
        };
        match result {
            CanonicalResult::Ok { data, .. } => {
                let scan = ScanResult { code, location, data };
                session.apply(ScanEvent::CommitSucceeded(scan.clone()))?;
                session.history.push(ScanHistoryEntry {
                    result: CanonicalResult::ok(scan.clone()),
                    timestamp_ms: self.clock.now_ms(),
                });
                info!(
                    code = %scan.code.normalized,
                    entity = %scan.code.entity_type,
                    location = %location,
                    "move committed"
                );
                Ok(ScanOutcome::Committed(scan))
            }
            CanonicalResult::Err(failure) => {
                let failure = ScanFailure::from_failure(&failure, Some(context));
                session.apply(ScanEvent::CommitFailed(failure.clone()))?;
                info!(
                    code = %code.normalized,
                    error_code = %failure.error_code,
                    "move failed"
                );
                Ok(ScanOutcome::Failed(failure))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use bodega_core::error_codes;
    use serde_json::{json, Value};
    use tokio::sync::Notify;

    use super::*;
    use crate::transport::{ApiRequest, RawResponse, SimulatedTransport, TransportError};

    const BOX: &str = "123456789012345";
    const PALLET: &str = "123456789012";

    fn success(data: Value) -> RawResponse {
        RawResponse::json(200, &json!({"status": "success", "data": data}))
    }

    fn unified_error(status: u16, code: &str) -> RawResponse {
        RawResponse::json(
            status,
            &json!({"status": "error", "error": {"code": code, "message": format!("{code} raised")}}),
        )
    }

    /// Replays responses in order, then keeps answering with success.
    struct Scripted {
        responses: Mutex<VecDeque<RawResponse>>,
        seen: Mutex<Vec<ApiRequest>>,
    }

    impl Scripted {
        fn new(responses: Vec<RawResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().len()
        }

        fn last_body(&self) -> Option<Value> {
            self.seen.lock().last().and_then(|r| r.body.clone())
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
            self.seen.lock().push(request.clone());
            let next = self.responses.lock().pop_front();
            Ok(next.unwrap_or_else(|| success(json!({}))))
        }
    }

    /// Blocks every call until released.
    struct Gated {
        entered: Notify,
        release: Notify,
        calls: AtomicUsize,
    }

    impl Gated {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                entered: Notify::new(),
                release: Notify::new(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Transport for Gated {
        async fn send(&self, _request: &ApiRequest) -> Result<RawResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            Ok(success(json!({})))
        }
    }

    struct FixedClock(u64);

    impl ClockSource for FixedClock {
        fn now_ms(&self) -> u64 {
            self.0
        }
    }

    fn orchestrator<T: Transport + 'static>(transport: &Arc<T>) -> ScanOrchestrator {
        ScanOrchestrator::new(Arc::clone(transport), &ClientConfig::default())
            .with_clock(Arc::new(FixedClock(1_700_000_000_000)))
    }

    #[tokio::test]
    async fn box_scan_commits_with_one_call() {
        let transport = Scripted::new(vec![success(json!({"codigo": BOX}))]);
        let orch = orchestrator(&transport);

        let outcome = orch.submit_scan(BOX, "BODEGA").await.unwrap();
        let ScanOutcome::Committed(result) = outcome else {
            panic!("expected commit, got {outcome:?}");
        };
        assert_eq!(result.code.entity_type, EntityType::Box);
        assert_eq!(result.location, Location::BODEGA);
        assert_eq!(transport.calls(), 1);
        assert_eq!(
            transport.last_body(),
            Some(json!({"resource": "box", "action": "move", "params": {"codigo": BOX, "ubicacion": "BODEGA"}}))
        );
        assert!(matches!(orch.state(), ScanState::Succeeded(_)));

        let history = orch.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].timestamp_ms, 1_700_000_000_000);
    }

    #[tokio::test]
    async fn pallet_scan_waits_for_confirmation() {
        let transport = Scripted::new(Vec::new());
        let orch = orchestrator(&transport);

        let outcome = orch.submit_scan(PALLET, "BODEGA").await.unwrap();
        assert!(matches!(outcome, ScanOutcome::AwaitingConfirmation(_)));
        assert_eq!(transport.calls(), 0);

        let outcome = orch.confirm().await.unwrap();
        assert!(matches!(outcome, ScanOutcome::Committed(_)));
        assert_eq!(transport.calls(), 1);
        assert_eq!(transport.last_body().unwrap()["resource"], "pallet");
    }

    #[tokio::test]
    async fn box_not_found_is_translated_for_scan() {
        let transport = Scripted::new(vec![unified_error(404, error_codes::BOX_NOT_FOUND)]);
        let orch = orchestrator(&transport);

        let outcome = orch.submit_scan(BOX, "VENTA").await.unwrap();
        let ScanOutcome::Failed(failure) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(failure.message, "Código no encontrado");
        assert!(failure.suggestion.is_some());
        assert_eq!(failure.error_code, error_codes::BOX_NOT_FOUND);
        assert_eq!(transport.calls(), 1);
        assert!(orch.history().is_empty());
    }

    #[tokio::test]
    async fn concurrent_scan_is_rejected_as_busy() {
        let transport = Gated::new();
        let orch = Arc::new(orchestrator(&transport));

        let first = tokio::spawn({
            let orch = Arc::clone(&orch);
            async move { orch.submit_scan(BOX, "BODEGA").await }
        });
        transport.entered.notified().await;

        assert!(orch.is_busy());
        assert_eq!(
            orch.submit_scan("111111111111111", "BODEGA").await,
            Err(OrchestratorError::Busy)
        );
        assert_eq!(orch.confirm().await, Err(OrchestratorError::Busy));

        transport.release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, ScanOutcome::Committed(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(!orch.is_busy());
    }

    #[tokio::test]
    async fn validation_failures_make_no_calls() {
        let transport = Scripted::new(Vec::new());
        let orch = orchestrator(&transport);

        let ScanOutcome::Failed(failure) = orch.submit_scan("12345", "BODEGA").await.unwrap() else {
            panic!("expected failure");
        };
        assert_eq!(failure.error_code, error_codes::UNRECOGNIZED_FORMAT);

        let ScanOutcome::Failed(failure) = orch.submit_scan(BOX, "PREVENTA").await.unwrap() else {
            panic!("expected failure");
        };
        assert_eq!(failure.error_code, error_codes::INVALID_LOCATION);
        assert_eq!(failure.field.as_deref(), Some("ubicacion"));

        let ScanOutcome::Failed(failure) = orch.submit_scan("   ", "BODEGA").await.unwrap() else {
            panic!("expected failure");
        };
        assert_eq!(failure.error_code, error_codes::EMPTY);

        assert_eq!(transport.calls(), 0);
        assert!(matches!(orch.state(), ScanState::Failed { pending: None, .. }));
    }

    #[tokio::test]
    async fn failed_pallet_commit_keeps_pending_for_retry() {
        let transport = Scripted::new(vec![unified_error(503, error_codes::SERVICE_UNAVAILABLE)]);
        let orch = orchestrator(&transport);

        orch.submit_scan(PALLET, "PREVENTA").await.unwrap();
        let outcome = orch.confirm().await.unwrap();
        assert!(matches!(outcome, ScanOutcome::Failed(_)));
        assert!(orch.state().pending().is_some());

        let outcome = orch.confirm().await.unwrap();
        let ScanOutcome::Committed(result) = outcome else {
            panic!("expected commit on retry, got {outcome:?}");
        };
        assert_eq!(result.location, Location::PREVENTA);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn confirm_after_success_sends_nothing() {
        let transport = Scripted::new(Vec::new());
        let orch = orchestrator(&transport);

        orch.submit_scan(PALLET, "BODEGA").await.unwrap();
        orch.confirm().await.unwrap();
        let outcome = orch.confirm().await.unwrap();
        assert!(matches!(outcome, ScanOutcome::AlreadyCommitted(_)));
        assert_eq!(transport.calls(), 1);
        assert_eq!(orch.history().len(), 1);
    }

    #[tokio::test]
    async fn new_scan_while_pallet_pending_is_rejected() {
        let transport = Scripted::new(Vec::new());
        let orch = orchestrator(&transport);

        orch.submit_scan(PALLET, "BODEGA").await.unwrap();
        let err = orch.submit_scan(BOX, "BODEGA").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition(_)));
        assert!(matches!(orch.state(), ScanState::AwaitingConfirmation(_)));
    }

    #[tokio::test]
    async fn cancel_drops_pending_pallet() {
        let transport = Scripted::new(Vec::new());
        let orch = orchestrator(&transport);

        orch.submit_scan(PALLET, "BODEGA").await.unwrap();
        assert_eq!(orch.cancel(), Ok(ScanState::Idle));
        assert!(orch.confirm().await.is_err());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_commit_result_is_discarded() {
        let transport = Gated::new();
        let orch = Arc::new(orchestrator(&transport));

        orch.submit_scan(PALLET, "VENTA").await.unwrap();
        let confirm = tokio::spawn({
            let orch = Arc::clone(&orch);
            async move { orch.confirm().await }
        });
        transport.entered.notified().await;

        let state = orch.cancel().unwrap();
        assert!(matches!(state, ScanState::AwaitingConfirmation(_)));
        transport.release.notify_one();

        assert_eq!(confirm.await.unwrap(), Ok(ScanOutcome::Cancelled));
        assert!(matches!(orch.state(), ScanState::AwaitingConfirmation(_)));
        assert!(orch.history().is_empty());
    }

    #[tokio::test]
    async fn repeated_box_move_is_translated() {
        let sim = Arc::new(SimulatedTransport::new());
        let orch = orchestrator(&sim);

        let first = orch.submit_scan(BOX, "VENTA").await.unwrap();
        assert!(matches!(first, ScanOutcome::Committed(_)));

        let ScanOutcome::Failed(failure) = orch.submit_scan(BOX, "VENTA").await.unwrap() else {
            panic!("expected the second move to be rejected");
        };
        assert_eq!(failure.error_code, error_codes::BOX_ALREADY_IN_LOCATION);
        assert_eq!(failure.message, "La caja ya está en esa ubicación");
        assert_eq!(failure.suggestion.as_deref(), Some("Elija otra ubicación de destino"));
        assert_eq!(failure.raw_message, "Box already in the same location");
    }

    #[tokio::test]
    async fn dropped_box_commit_returns_to_idle() {
        let transport = Gated::new();
        let orch = orchestrator(&transport);

        let abandoned = tokio::time::timeout(Duration::from_millis(50), orch.submit_scan(BOX, "BODEGA")).await;
        assert!(abandoned.is_err());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

        assert_eq!(orch.state(), ScanState::Idle);
        assert!(!orch.is_busy());
        assert!(orch.session.lock().active.is_none());

        // The next scan starts cleanly instead of tripping over a stale commit.
        let next = tokio::time::timeout(Duration::from_millis(50), orch.submit_scan(BOX, "BODEGA")).await;
        assert!(next.is_err());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dropped_confirm_keeps_pallet_pending() {
        let transport = Gated::new();
        let orch = orchestrator(&transport);

        orch.submit_scan(PALLET, "BODEGA").await.unwrap();
        let abandoned = tokio::time::timeout(Duration::from_millis(50), orch.confirm()).await;
        assert!(abandoned.is_err());

        assert!(matches!(orch.state(), ScanState::AwaitingConfirmation(_)));
        assert!(!orch.is_busy());
        assert_eq!(orch.cancel(), Ok(ScanState::Idle));
    }

    #[tokio::test]
    async fn history_is_bounded_newest_first() {
        let transport = Scripted::new(Vec::new());
        let config = ClientConfig {
            history_capacity: 2,
            ..ClientConfig::default()
        };
        let orch = ScanOrchestrator::new(Arc::clone(&transport), &config);

        for code in ["100000000000001", "100000000000002", "100000000000003"] {
            orch.submit_scan(code, "BODEGA").await.unwrap();
        }
        let codes: Vec<String> = orch
            .history()
            .into_iter()
            .filter_map(|entry| entry.result.data().map(|r| r.code.normalized.clone()))
            .collect();
        assert_eq!(codes, vec!["100000000000003", "100000000000002"]);
    }

    #[tokio::test]
    async fn report_issue_clears_pending_on_success() {
        let sim = Arc::new(SimulatedTransport::new());
        let orch = orchestrator(&sim);

        assert_eq!(orch.report_issue("rota").await, Err(OrchestratorError::InvalidTransition(TransitionError {
            state: "idle",
            event: "issueReported",
        })));

        orch.submit_scan(PALLET, "TRANSITO").await.unwrap();
        assert_eq!(orch.report_issue("  ").await, Err(OrchestratorError::EmptyReason));

        let outcome = orch.report_issue(" etiqueta rota ").await.unwrap();
        assert_eq!(
            outcome,
            ScanOutcome::IssueReported {
                code: PALLET.to_string(),
                reason: "etiqueta rota".to_string(),
            }
        );
        assert_eq!(orch.state(), ScanState::Idle);
        assert_eq!(sim.reported_issues(), vec![(PALLET.to_string(), "etiqueta rota".to_string())]);
    }

    #[tokio::test]
    async fn failed_report_keeps_pallet_pending() {
        let transport = Scripted::new(vec![unified_error(500, error_codes::INTERNAL_ERROR)]);
        let orch = orchestrator(&transport);

        orch.submit_scan(PALLET, "BODEGA").await.unwrap();
        let outcome = orch.report_issue("caja faltante").await.unwrap();
        assert!(matches!(outcome, ScanOutcome::Failed(_)));
        assert!(matches!(orch.state(), ScanState::AwaitingConfirmation(_)));
    }

    #[tokio::test]
    async fn preview_lists_boxes_without_committing() {
        let sim = Arc::new(SimulatedTransport::new());
        let orch = orchestrator(&sim);

        orch.submit_scan(PALLET, "BODEGA").await.unwrap();
        let PreviewOutcome::Contents { code, boxes } = orch.preview_pending().await.unwrap() else {
            panic!("expected contents");
        };
        assert_eq!(code, PALLET);
        assert_eq!(boxes.len(), 3);
        assert!(matches!(orch.state(), ScanState::AwaitingConfirmation(_)));
        assert!(orch.history().is_empty());
    }

    #[test]
    fn valid_locations_follow_policy() {
        let orch = orchestrator(&Scripted::new(Vec::new()));
        assert!(!orch.valid_locations(EntityType::Box).contains(&Location::PREVENTA));
        assert!(orch.valid_locations(EntityType::Pallet).contains(&Location::PREVENTA));
    }
}
