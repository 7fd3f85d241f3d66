//! HTTP surface of a node
//!
//! Remote-callable operations live under `POST /rpc/{op}` with JSON bodies;
//! errors are returned as [`ErrorBody`](crate::common::ErrorBody) with the
//! status from [`Error::to_http_status`].

use crate::common::rpc::{
    ops, CoordinatorRequest, ElectionRequest, FireRequest, FireResponse, NodeStatus, PeerTableMessage,
    PingRequest, QuitRequest, QuitResponse, RegisterRequest, RegisterResponse, Reply, StateRequest,
};
use crate::common::tracing_middleware::request_tracing_middleware;
use crate::common::{normalize_address, Error, Result};
use crate::game::{PlayerStats, SessionSnapshot};
use crate::node::NodeContext;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn create_router(state: NodeContext) -> Router {
    let rpc = Router::new()
        // game
        .route(&path(ops::REGISTER_PLAYER), post(register_player))
        .route(&path(ops::FIRE), post(fire))
        .route(&path(ops::GET_STATE), post(get_state))
        .route(&path(ops::QUIT), post(quit))
        .route(&path(ops::GET_STATISTICS), post(get_statistics))
        // cluster
        .route(&path(ops::PING), post(ping))
        .route(&path(ops::SEND_PEER_TABLE), post(send_peer_table))
        .route(&path(ops::RECEIVE_PEER_TABLE), post(receive_peer_table))
        .route(&path(ops::ELECTION), post(election))
        .route(&path(ops::COORDINATOR), post(coordinator));

    Router::new()
        .merge(rpc)
        .route("/health", get(health))
        .route("/admin/status", get(admin_status))
        .layer(axum::middleware::from_fn(request_tracing_middleware))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn path(op: &str) -> String {
    format!("/rpc/{}", op)
}

/// Malformed bodies become `InvalidRequest` instead of axum's plain-text
/// rejection, so clients always get an `ErrorBody`.
fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| Error::InvalidRequest(rejection.body_text()))
}

async fn register_player(
    State(state): State<NodeContext>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>> {
    let req = body(payload)?;
    Ok(Json(state.registry.register_player(&req.name)?))
}

async fn fire(
    State(state): State<NodeContext>,
    payload: std::result::Result<Json<FireRequest>, JsonRejection>,
) -> Result<Json<FireResponse>> {
    let req = body(payload)?;
    let (row, col) = req.cell()?;
    let outcome = state.registry.fire(&req.session_id, req.slot, row, col)?;
    Ok(Json(outcome))
}

async fn get_state(
    State(state): State<NodeContext>,
    payload: std::result::Result<Json<StateRequest>, JsonRejection>,
) -> Result<Json<SessionSnapshot>> {
    let req = body(payload)?;
    Ok(Json(state.registry.get_state(&req.session_id)?))
}

async fn quit(
    State(state): State<NodeContext>,
    payload: std::result::Result<Json<QuitRequest>, JsonRejection>,
) -> Result<Json<QuitResponse>> {
    let req = body(payload)?;
    let status = state.registry.quit(&req.session_id, req.slot)?;
    Ok(Json(QuitResponse {
        session_id: req.session_id,
        status,
    }))
}

async fn get_statistics(State(state): State<NodeContext>) -> Result<Json<Vec<PlayerStats>>> {
    Ok(Json(state.stats.all()?))
}

async fn ping(
    State(state): State<NodeContext>,
    payload: std::result::Result<Json<PingRequest>, JsonRejection>,
) -> Result<Json<Reply>> {
    let req = body(payload)?;
    let address = normalize_address(&req.address);
    Ok(Json(state.cluster.handle_ping(&address, req.rank)))
}

async fn send_peer_table(State(state): State<NodeContext>) -> Json<PeerTableMessage> {
    Json(PeerTableMessage {
        peers: state.cluster.send_peer_table(),
    })
}

async fn receive_peer_table(
    State(state): State<NodeContext>,
    payload: std::result::Result<Json<PeerTableMessage>, JsonRejection>,
) -> Result<Json<Reply>> {
    let msg = body(payload)?;
    state.cluster.receive_peer_table(&msg.peers);
    Ok(Json(Reply::Ok))
}

async fn election(
    State(state): State<NodeContext>,
    payload: std::result::Result<Json<ElectionRequest>, JsonRejection>,
) -> Result<Json<Reply>> {
    let req = body(payload)?;
    Ok(Json(state.cluster.handle_election(req.rank)))
}

async fn coordinator(
    State(state): State<NodeContext>,
    payload: std::result::Result<Json<CoordinatorRequest>, JsonRejection>,
) -> Result<Json<Reply>> {
    let req = body(payload)?;
    let address = normalize_address(&req.address);
    Ok(Json(state.cluster.handle_coordinator(&address, req.rank)))
}

async fn health(State(state): State<NodeContext>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "role": state.cluster.role(),
        "coordinator": state.cluster.coordinator(),
    }))
}

async fn admin_status(State(state): State<NodeContext>) -> Json<NodeStatus> {
    Json(NodeStatus {
        cluster: state.cluster.status(),
        sessions: state.registry.session_count(),
        waiting_player: state.registry.waiting_player(),
        version: crate::VERSION.to_string(),
    })
}
