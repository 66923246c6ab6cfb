//! HTTP endpoint receiving CS:GO Game State Integration payloads.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tiny_http::{Method, Response, Server};
use tokio::sync::mpsc;

use crate::game_state::GameSnapshot;
use crate::presence::PresenceEvent;

/// Payloads are a few kilobytes; anything far beyond that is not from the game
const MAX_BODY_BYTES: u64 = 1024 * 1024;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("auth token mismatch")]
    Unauthorized,
}

impl PayloadError {
    fn status(&self) -> u16 {
        match self {
            PayloadError::Malformed(_) => 400,
            PayloadError::Unauthorized => 401,
        }
    }
}

/// Parse a payload body, checking the echoed auth token when one is configured.
pub fn parse_payload(body: &str, expected_token: Option<&str>) -> Result<GameSnapshot, PayloadError> {
    let snapshot =
        GameSnapshot::from_json(body).map_err(|e| PayloadError::Malformed(e.to_string()))?;

    if let Some(expected) = expected_token {
        let token = snapshot.auth.as_ref().and_then(|a| a.token.as_deref());
        if token != Some(expected) {
            return Err(PayloadError::Unauthorized);
        }
    }

    Ok(snapshot)
}

/// Helper to create a JSON response
fn json_response(status: u16, body: serde_json::Value) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body.to_string())
        .with_header(
            tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                .expect("static header is valid"),
        )
        .with_status_code(status)
}

pub struct GsiServer {
    port: u16,

    /// Set once the first payload has been accepted
    game_connected: Arc<AtomicBool>,

    server: Arc<Server>,
}

impl GsiServer {
    pub fn start(
        bind: &str,
        auth_token: Option<String>,
        events: mpsc::UnboundedSender<PresenceEvent>,
    ) -> Result<Self, String> {
        let server = Server::http(bind)
            .map_err(|e| format!("Failed to start GSI server on {}: {}", bind, e))?;

        let port = server
            .server_addr()
            .to_ip()
            .ok_or("Failed to get server address")?
            .port();

        tracing::info!("GSI server listening on port {}", port);

        let server = Arc::new(server);
        let game_connected = Arc::new(AtomicBool::new(false));

        {
            let server = Arc::clone(&server);
            let game_connected = Arc::clone(&game_connected);
            thread::spawn(move || {
                Self::run_server(&server, auth_token.as_deref(), &events, &game_connected);
            });
        }

        Ok(Self {
            port,
            game_connected,
            server,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the game has delivered at least one accepted payload
    pub fn game_connected(&self) -> bool {
        self.game_connected.load(Ordering::SeqCst)
    }

    /// Stop accepting requests; the server thread exits after its current request
    pub fn stop(&self) {
        self.server.unblock();
    }

    fn run_server(
        server: &Server,
        auth_token: Option<&str>,
        events: &mpsc::UnboundedSender<PresenceEvent>,
        game_connected: &AtomicBool,
    ) {
        for mut request in server.incoming_requests() {
            if request.method() != &Method::Post {
                let response = json_response(405, serde_json::json!({"error": "POST only"}));
                request.respond(response).ok();
                continue;
            }

            let mut body = String::new();
            if let Err(e) = request
                .as_reader()
                .take(MAX_BODY_BYTES)
                .read_to_string(&mut body)
            {
                tracing::warn!("Failed to read GSI payload: {}", e);
                let response = json_response(400, serde_json::json!({"error": e.to_string()}));
                request.respond(response).ok();
                continue;
            }

            let snapshot = match parse_payload(&body, auth_token) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!("Rejected GSI payload: {}", e);
                    let response =
                        json_response(e.status(), serde_json::json!({"error": e.to_string()}));
                    request.respond(response).ok();
                    continue;
                }
            };

            if !game_connected.swap(true, Ordering::SeqCst) {
                tracing::info!("Game connected to GSI server");
            }
            tracing::trace!("GSI payload received: {:?}", snapshot);

            if events.send(PresenceEvent::Snapshot(Box::new(snapshot))).is_err() {
                tracing::debug!("Presence event channel closed");
                let response =
                    json_response(503, serde_json::json!({"error": "shutting down"}));
                request.respond(response).ok();
                continue;
            }

            request.respond(Response::empty(200)).ok();
        }

        tracing::debug!("GSI server stopped");
    }
}
