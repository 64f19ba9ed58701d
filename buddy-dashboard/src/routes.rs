//! Axum route handlers for the dashboard host's local RPC API.

use crate::config::Config;
use crate::identity_gate::{GateOutcome, IdentityGate};
use crate::loader::LoaderSource;
use crate::view::{ViewContext, ViewSession};
use crate::view_model::SharedViewModel;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use buddy_types::*;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

pub struct AppState {
    pub config: Config,
    pub ctx: ViewContext,
    pub gate: IdentityGate,
    pub session: Mutex<Option<ViewSession>>,
    pub start_time: Instant,
    pub started_at: String,
}

impl AppState {
    pub fn new(config: Config, ctx: ViewContext, gate: IdentityGate) -> Self {
        Self {
            config,
            ctx,
            gate,
            session: Mutex::new(None),
            start_time: Instant::now(),
            started_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Tear down the current session (if any) and start a new one
    pub async fn activate(&self, source: LoaderSource) {
        let mut slot = self.session.lock().await;
        if let Some(old) = slot.take() {
            old.deactivate().await;
        }
        *slot = Some(ViewSession::activate(&self.ctx, source));
    }

    pub async fn deactivate(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            session.deactivate().await;
        }
    }

    pub async fn current_view(&self) -> Option<SharedViewModel> {
        self.session.lock().await.as_ref().map(|s| s.view())
    }
}

fn outcome_response(
    outcome: GateOutcome,
    status: GateStatus,
) -> (StatusCode, Json<RpcResponse<GateStatus>>) {
    match outcome {
        GateOutcome::Granted(_) | GateOutcome::Registered | GateOutcome::Aborted => {
            (StatusCode::OK, Json(RpcResponse::ok(status)))
        }
        GateOutcome::Blocked(msg) => (StatusCode::BAD_REQUEST, Json(RpcResponse::err(msg))),
        GateOutcome::Rejected(msg) => (StatusCode::UNAUTHORIZED, Json(RpcResponse::err(msg))),
        GateOutcome::CameraDenied(msg) => {
            (StatusCode::SERVICE_UNAVAILABLE, Json(RpcResponse::err(msg)))
        }
        GateOutcome::Busy => (
            StatusCode::CONFLICT,
            Json(RpcResponse::err("A capture is already in progress")),
        ),
    }
}

// =====================================================
// Identity Gate Endpoints
// =====================================================

// POST /rpc/gate/register
pub async fn gate_register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> (StatusCode, Json<RpcResponse<GateStatus>>) {
    let outcome = state.gate.register(&req.username, &req.name).await;
    outcome_response(outcome, state.gate.status().await)
}

// POST /rpc/gate/verify
pub async fn gate_verify(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<RpcResponse<GateStatus>>) {
    let outcome = state.gate.verify().await;
    if let GateOutcome::Granted(username) = &outcome {
        state
            .activate(state.config.source_for_identity(username))
            .await;
    }
    outcome_response(outcome, state.gate.status().await)
}

// GET /rpc/gate/status
pub async fn gate_status(State(state): State<Arc<AppState>>) -> Json<RpcResponse<GateStatus>> {
    Json(RpcResponse::ok(state.gate.status().await))
}

// =====================================================
// Session Endpoints
// =====================================================

#[derive(Debug, Deserialize)]
pub struct TranscriptQuery {
    pub since: Option<usize>,
}

// GET /rpc/dashboard
pub async fn dashboard_data(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<RpcResponse<DashboardSnapshot>>) {
    let Some(view) = state.current_view().await else {
        return (
            StatusCode::NOT_FOUND,
            Json(RpcResponse::err("No active session")),
        );
    };
    let snapshot = view.read().await.snapshot();
    (StatusCode::OK, Json(RpcResponse::ok(snapshot)))
}

// GET /rpc/transcript?since=N
pub async fn transcript(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TranscriptQuery>,
) -> (StatusCode, Json<RpcResponse<TranscriptPage>>) {
    let Some(view) = state.current_view().await else {
        return (
            StatusCode::NOT_FOUND,
            Json(RpcResponse::err("No active session")),
        );
    };
    let vm = view.read().await;
    let since = query.since.unwrap_or(0);
    let page = TranscriptPage {
        lines: vm.transcript.since(since).to_vec(),
        next: vm.transcript.len(),
    };
    (StatusCode::OK, Json(RpcResponse::ok(page)))
}

// POST /rpc/session/close
pub async fn session_close(State(state): State<Arc<AppState>>) -> Json<RpcResponse<bool>> {
    state.deactivate().await;
    state.gate.reset().await;
    Json(RpcResponse::ok(true))
}

// GET /rpc/status
pub async fn status(State(state): State<Arc<AppState>>) -> Json<RpcResponse<ServiceStatus>> {
    let view = state.current_view().await;
    let (identity, channel, media, transcript_lines) = match &view {
        Some(view) => {
            let vm = view.read().await;
            (
                vm.identity.clone(),
                vm.channel.label(),
                vm.media.label(),
                vm.transcript.len(),
            )
        }
        None => (None, "closed".to_string(), "closed".to_string(), 0),
    };
    Json(RpcResponse::ok(ServiceStatus {
        running: true,
        uptime_secs: state.start_time.elapsed().as_secs(),
        started_at: state.started_at.clone(),
        session_active: view.is_some(),
        identity,
        channel,
        media,
        transcript_lines,
    }))
}
