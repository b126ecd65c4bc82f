//! Event subscriber bridge: server-sent events in, cache invalidations out.

use std::time::Duration;

use switchboard_types::DomainEvent;
use tokio::sync::watch;

use crate::api::ApiError;
use crate::cache::QueryCache;
use crate::keys::invalidation_keys;

/// Reconnection attempts after a lost or failed connection.
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;

/// Fixed pause between reconnection attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Lifecycle of the event subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Where the bridge connects and how hard it tries to come back.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub base_url: String,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl BridgeConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Subscribes to the server's event stream and applies each domain event
/// to the cache as invalidations.
///
/// One bridge per client connection. Reconnection is bounded: once the
/// configured attempts are spent the bridge parks in `Disconnected` until
/// [`run`](Self::run) is called again. The stream carries no catch-up, so
/// events broadcast while the bridge was down never invalidate anything;
/// affected keys look fresh until another event or a manual refresh
/// touches them.
pub struct EventBridge {
    config: BridgeConfig,
    cache: QueryCache,
    http: reqwest::Client,
    state: watch::Sender<ConnectionState>,
}

impl EventBridge {
    pub fn new(config: BridgeConfig, cache: QueryCache) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            cache,
            http: reqwest::Client::new(),
            state,
        }
    }

    /// Watch half for connection-state consumers.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Drives the subscription until the reconnect budget is spent.
    ///
    /// Meant to be spawned; hold the bridge in an [`Arc`](std::sync::Arc)
    /// to restart it after it returns.
    pub async fn run(&self) {
        let mut failures = 0u32;
        loop {
            self.state.send_replace(ConnectionState::Connecting);
            match self.connect().await {
                Ok(response) => {
                    failures = 0;
                    self.state.send_replace(ConnectionState::Connected);
                    tracing::info!(url = %self.config.base_url, "event stream connected");
                    if let Err(error) = self.pump(response).await {
                        tracing::warn!(error = %error, "event stream lost");
                    }
                }
                Err(error) => {
                    tracing::warn!(error = %error, "event stream connect failed");
                }
            }
            self.state.send_replace(ConnectionState::Disconnected);

            failures += 1;
            if failures > self.config.reconnect_attempts {
                tracing::warn!(
                    attempts = self.config.reconnect_attempts,
                    "reconnect attempts exhausted; live invalidation stopped"
                );
                return;
            }
            tokio::time::sleep(self.config.reconnect_delay).await;
        }
    }

    async fn connect(&self) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}/events/stream", self.config.base_url);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Server(format!(
                "event stream returned {}",
                response.status()
            )));
        }
        Ok(response)
    }

    /// Reads the byte stream until it ends, feeding complete lines to the
    /// frame parser.
    async fn pump(&self, mut response: reqwest::Response) -> Result<(), ApiError> {
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            buffer.extend_from_slice(&chunk);
            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                self.handle_line(line.trim_end());
            }
        }
        Ok(())
    }

    fn handle_line(&self, line: &str) {
        let Some(event) = parse_event_line(line) else {
            return;
        };
        let keys = invalidation_keys(&event);
        tracing::debug!(
            event = event.event_type(),
            keys = keys.len(),
            "invalidating from event"
        );
        self.cache.invalidate(&keys);
    }
}

/// Extracts the event carried by one SSE `data:` line.
///
/// Comment lines (keep-alives) and blank separators yield nothing. Frames
/// that fail to deserialize are skipped with a warning so a newer server
/// can ship event kinds this client does not know yet.
fn parse_event_line(line: &str) -> Option<DomainEvent> {
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload.is_empty() {
        return None;
    }
    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(error) => {
            tracing::warn!(error = %error, "skipping unparseable event frame");
            None
        }
    }
}
