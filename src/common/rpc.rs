//! RPC wire types and the HTTP client that carries them
//!
//! Every remote-callable operation is `POST {address}/rpc/{op}` with a JSON
//! body. Failures come back as [`ErrorBody`] with a non-2xx status.

use crate::cluster::{ClusterStatus, PeerTable, Rank};
use crate::common::config::normalize_address;
use crate::common::error::ErrorBody;
use crate::common::{Error, Result};
use crate::game::board::GRID_SIZE;
use crate::game::{PlayerStats, SessionSnapshot, SessionStatus, ShotOutcome, Slot};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod ops {
    pub const REGISTER_PLAYER: &str = "register_player";
    pub const FIRE: &str = "fire";
    pub const GET_STATE: &str = "get_state";
    pub const QUIT: &str = "quit";
    pub const GET_STATISTICS: &str = "get_statistics";
    pub const PING: &str = "ping";
    pub const SEND_PEER_TABLE: &str = "send_peer_table";
    pub const RECEIVE_PEER_TABLE: &str = "receive_peer_table";
    pub const ELECTION: &str = "election";
    pub const COORDINATOR: &str = "coordinator";
}

/// Literal replies of the cluster operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "IGNORED")]
    Ignored,
}

impl std::fmt::Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Pong => write!(f, "pong"),
            Reply::Ok => write!(f, "OK"),
            Reply::Ignored => write!(f, "IGNORED"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
}

pub use crate::game::Registration as RegisterResponse;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FireRequest {
    pub session_id: String,
    pub slot: Slot,
    pub row: i64,
    pub col: i64,
}

impl FireRequest {
    /// Target as grid indices. Negative coordinates are off the board like
    /// any other out-of-range shot.
    pub fn cell(&self) -> Result<(usize, usize)> {
        match (usize::try_from(self.row), usize::try_from(self.col)) {
            (Ok(row), Ok(col)) => Ok((row, col)),
            _ => Err(Error::InvalidMove(format!(
                "cell ({}, {}) is outside the {}x{} grid",
                self.row, self.col, GRID_SIZE, GRID_SIZE
            ))),
        }
    }
}

pub type FireResponse = ShotOutcome;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuitRequest {
    pub session_id: String,
    pub slot: Slot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuitResponse {
    pub session_id: String,
    pub status: SessionStatus,
}

/// Caller identity attached to a heartbeat. Both fields are optional on
/// the wire so a bare liveness check (`{}`) is accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PingRequest {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub rank: Rank,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerTableMessage {
    pub peers: PeerTable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionRequest {
    pub rank: Rank,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorRequest {
    pub address: String,
    pub rank: Rank,
}

/// Reply of `GET /admin/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatus {
    #[serde(flatten)]
    pub cluster: ClusterStatus,
    pub sessions: usize,
    pub waiting_player: Option<String>,
    pub version: String,
}

/// HTTP client for node-to-node and client-to-node calls.
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl Default for RpcClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl RpcClient {
    /// `timeout` applies to the typed helpers; [`RpcClient::call`] takes its own.
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    pub async fn call<Req, Resp>(&self, address: &str, op: &str, body: &Req, timeout: Duration) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/rpc/{}", normalize_address(address), op);
        let response = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::unreachable(address, e))?;
        decode(address, response).await
    }

    pub async fn status(&self, address: &str) -> Result<NodeStatus> {
        let url = format!("{}/admin/status", normalize_address(address));
        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::unreachable(address, e))?;
        decode(address, response).await
    }

    pub async fn register_player(&self, address: &str, name: &str) -> Result<RegisterResponse> {
        let req = RegisterRequest { name: name.to_string() };
        self.call(address, ops::REGISTER_PLAYER, &req, self.timeout).await
    }

    pub async fn fire(&self, address: &str, req: &FireRequest) -> Result<FireResponse> {
        self.call(address, ops::FIRE, req, self.timeout).await
    }

    pub async fn get_state(&self, address: &str, session_id: &str) -> Result<SessionSnapshot> {
        let req = StateRequest {
            session_id: session_id.to_string(),
        };
        self.call(address, ops::GET_STATE, &req, self.timeout).await
    }

    pub async fn quit(&self, address: &str, session_id: &str, slot: Slot) -> Result<QuitResponse> {
        let req = QuitRequest {
            session_id: session_id.to_string(),
            slot,
        };
        self.call(address, ops::QUIT, &req, self.timeout).await
    }

    pub async fn get_statistics(&self, address: &str) -> Result<Vec<PlayerStats>> {
        self.call(address, ops::GET_STATISTICS, &serde_json::json!({}), self.timeout)
            .await
    }

    pub async fn ping(&self, address: &str, req: &PingRequest, timeout: Duration) -> Result<Reply> {
        self.call(address, ops::PING, req, timeout).await
    }

    pub async fn send_peer_table(&self, address: &str, timeout: Duration) -> Result<PeerTable> {
        let msg: PeerTableMessage = self
            .call(address, ops::SEND_PEER_TABLE, &serde_json::json!({}), timeout)
            .await?;
        Ok(msg.peers)
    }

    pub async fn receive_peer_table(&self, address: &str, peers: &PeerTable, timeout: Duration) -> Result<Reply> {
        let msg = PeerTableMessage { peers: peers.clone() };
        self.call(address, ops::RECEIVE_PEER_TABLE, &msg, timeout).await
    }

    pub async fn election(&self, address: &str, rank: Rank, timeout: Duration) -> Result<Reply> {
        self.call(address, ops::ELECTION, &ElectionRequest { rank }, timeout)
            .await
    }

    pub async fn coordinator(&self, address: &str, candidate: &str, rank: Rank, timeout: Duration) -> Result<Reply> {
        let req = CoordinatorRequest {
            address: candidate.to_string(),
            rank,
        };
        self.call(address, ops::COORDINATOR, &req, timeout).await
    }
}

async fn decode<Resp: DeserializeOwned>(address: &str, response: reqwest::Response) -> Result<Resp> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::unreachable(address, e))?;

    if status.is_success() {
        return serde_json::from_slice(&bytes)
            .map_err(|e| Error::Http(format!("malformed reply from {}: {}", address, e)));
    }
    match serde_json::from_slice::<ErrorBody>(&bytes) {
        Ok(body) => Err(Error::from_body(address, body)),
        Err(_) => Err(Error::Http(format!(
            "{} returned {}: {}",
            address,
            status,
            String::from_utf8_lossy(&bytes)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_literals() {
        assert_eq!(serde_json::to_string(&Reply::Pong).unwrap(), r#""pong""#);
        assert_eq!(serde_json::to_string(&Reply::Ignored).unwrap(), r#""IGNORED""#);
        assert_eq!(serde_json::from_str::<Reply>(r#""OK""#).unwrap(), Reply::Ok);
    }

    #[test]
    fn test_ping_request_fields_are_optional() {
        let req: PingRequest = serde_json::from_str("{}").unwrap();
        assert!(req.address.is_empty());
        assert_eq!(req.rank, 0);
    }

    #[test]
    fn test_fire_request_validates_slot() {
        let bad = r#"{"session_id":"s","slot":3,"row":0,"col":0}"#;
        assert!(serde_json::from_str::<FireRequest>(bad).is_err());
        let missing = r#"{"session_id":"s","slot":1,"row":0}"#;
        assert!(serde_json::from_str::<FireRequest>(missing).is_err());
    }

    #[test]
    fn test_negative_cell_is_an_invalid_move() {
        let req: FireRequest = serde_json::from_str(r#"{"session_id":"s","slot":1,"row":-1,"col":0}"#).unwrap();
        assert!(matches!(req.cell(), Err(Error::InvalidMove(_))));

        let req = FireRequest {
            session_id: "s".into(),
            slot: Slot::Two,
            row: 3,
            col: 9,
        };
        assert_eq!(req.cell().unwrap(), (3, 9));
    }

    #[tokio::test]
    async fn test_unreachable_peer_maps_to_unreachable() {
        let client = RpcClient::new(Duration::from_millis(200));
        // port 9 (discard) is closed on loopback in practice
        let err = client
            .ping("127.0.0.1:9", &PingRequest::default(), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(err.is_unreachable());
    }
}
