/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::{
    common::{types::Token, utils::backoff_delay},
    notification_client::NotificationClient,
    server_event,
    tools::{
        error::AppError,
        prometheus::{CONNECT_FAILURES, RECEIVED_NOTIFICATIONS, RECONNECT_ATTEMPTS},
    },
    transport::events::{EventBus, EventKind, HandlerId, TransportEvent},
    ServerEvent, SubscribeRequest,
};
use parking_lot::Mutex;
use serde::Deserialize;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::mpsc;
use tonic::{metadata::MetadataValue, Request, Streaming};
use tracing::*;

#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    pub endpoint: String,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

fn default_channel() -> String {
    "notifications".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

impl TransportConfig {
    fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    fn max_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_delay_ms)
    }
}

/// Connection lifecycle. `Idle` is both the initial state and the terminal
/// state after a manual disconnect; `Failed` is terminal after the retry
/// budget is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
    Failed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "Idle"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closed => write!(f, "Closed"),
            ConnectionState::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug)]
struct ConnState {
    state: ConnectionState,
    reconnect_attempts: u32,
}

/// Owns the single push connection for an authenticated session and
/// translates raw stream activity into the `TransportEvent` vocabulary.
/// Consumers subscribe through `on`/`off` and never touch the stream itself.
pub struct TransportClient {
    config: TransportConfig,
    bus: Arc<EventBus>,
    state: Arc<Mutex<ConnState>>,
    manually_disconnected: Arc<AtomicBool>,
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl TransportClient {
    pub fn new(config: TransportConfig) -> Self {
        TransportClient {
            config,
            bus: Arc::new(EventBus::new()),
            state: Arc::new(Mutex::new(ConnState {
                state: ConnectionState::Idle,
                reconnect_attempts: 0,
            })),
            manually_disconnected: Arc::new(AtomicBool::new(false)),
            shutdown_tx: Mutex::new(None),
        }
    }

    /// Starts the connection task. No-op while a connection is already `Open`
    /// or being established, so repeated calls are safe. Must be called from
    /// within a tokio runtime.
    pub fn connect(&self, token: Token) {
        {
            let mut conn = self.state.lock();
            if matches!(
                conn.state,
                ConnectionState::Open | ConnectionState::Connecting
            ) {
                info!("transport already connected");
                return;
            }
            conn.state = ConnectionState::Connecting;
            conn.reconnect_attempts = 0;
        }
        self.manually_disconnected.store(false, Ordering::SeqCst);

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        // Replacing the sender closes any task left over from a previous
        // session; that task observes the closed channel and exits.
        *self.shutdown_tx.lock() = Some(shutdown_tx);

        tokio::spawn(run_connection(
            self.config.clone(),
            token,
            self.bus.clone(),
            self.state.clone(),
            self.manually_disconnected.clone(),
            shutdown_rx,
        ));
    }

    /// Tears down the live connection, cancels any pending reconnect and
    /// drops every registered subscription. Always succeeds.
    pub fn disconnect(&self) {
        self.manually_disconnected.store(true, Ordering::SeqCst);
        if let Some(shutdown_tx) = self.shutdown_tx.lock().take() {
            let _ = shutdown_tx.try_send(());
        }
        self.bus.clear();
        self.state.lock().state = ConnectionState::Idle;
        info!("transport disconnected");
    }

    pub fn on(
        &self,
        event: EventKind,
        handler: impl Fn(TransportEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        self.bus.on(event, handler)
    }

    pub fn off(&self, event: EventKind, handler_id: Option<HandlerId>) {
        self.bus.off(event, handler_id)
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().state.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.lock().state
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.state.lock().reconnect_attempts
    }
}

async fn open_stream(
    config: &TransportConfig,
    token: &Token,
) -> Result<Streaming<ServerEvent>, AppError> {
    let mut grpc_client = NotificationClient::connect(config.endpoint.clone())
        .await
        .map_err(|err| AppError::TransportConnectFailed(err.to_string()))?;

    let Token(token) = token;
    let token = MetadataValue::try_from(token.as_str())
        .map_err(|err| AppError::InvalidRequest(format!("token is not metadata safe : {err}")))?;

    let mut request = Request::new(SubscribeRequest {
        channel: config.channel.clone(),
    });
    request.metadata_mut().insert("token", token);

    let response = grpc_client
        .subscribe(request)
        .await
        .map_err(|status| AppError::TransportConnectFailed(status.to_string()))?;

    Ok(response.into_inner())
}

fn dispatch_server_event(bus: &EventBus, event: ServerEvent) {
    match event.event {
        Some(server_event::Event::Connected(ack)) => {
            info!(session_id = %ack.session_id, "session confirmed");
        }
        Some(server_event::Event::Notification(payload)) => {
            RECEIVED_NOTIFICATIONS.inc();
            bus.emit(TransportEvent::NewNotification(payload.into()));
        }
        Some(server_event::Event::UnreadCount(unread)) => {
            bus.emit(TransportEvent::UnreadCount(unread.count));
        }
        None => {
            warn!("dropping structurally empty server event");
        }
    }
}

/// Reads the stream until it closes. Returns the close reason, or `None` when
/// the task was shut down and must exit without touching shared state.
async fn read_stream(
    bus: &EventBus,
    stream: &mut Streaming<ServerEvent>,
    shutdown_rx: &mut mpsc::Receiver<()>,
) -> Option<String> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                return None;
            }
            message = stream.message() => match message {
                Ok(Some(event)) => dispatch_server_event(bus, event),
                Ok(None) => return Some("stream closed by server".to_string()),
                Err(status) => {
                    warn!("stream error : {status}");
                    return Some(status.to_string());
                }
            }
        }
    }
}

async fn run_connection(
    config: TransportConfig,
    token: Token,
    bus: Arc<EventBus>,
    state: Arc<Mutex<ConnState>>,
    manually_disconnected: Arc<AtomicBool>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    loop {
        // State is `Connecting` on every pass through this point.
        let close_reason = match open_stream(&config, &token).await {
            Ok(mut stream) => {
                if manually_disconnected.load(Ordering::SeqCst) {
                    return;
                }
                {
                    let mut conn = state.lock();
                    conn.state = ConnectionState::Open;
                    conn.reconnect_attempts = 0;
                }
                info!(endpoint = %config.endpoint, channel = %config.channel, "transport connected");
                bus.emit(TransportEvent::Connect);

                match read_stream(&bus, &mut stream, &mut shutdown_rx).await {
                    Some(reason) => reason,
                    None => return,
                }
            }
            Err(err) => {
                CONNECT_FAILURES.inc();
                warn!("connection attempt failed : {err}");
                err.to_string()
            }
        };

        if manually_disconnected.load(Ordering::SeqCst) {
            return;
        }

        state.lock().state = ConnectionState::Closed;
        bus.emit(TransportEvent::Disconnect {
            reason: close_reason,
        });

        let attempts_so_far = state.lock().reconnect_attempts;
        if attempts_so_far >= config.max_reconnect_attempts {
            state.lock().state = ConnectionState::Failed;
            error!(
                max_reconnect_attempts = config.max_reconnect_attempts,
                "max reconnection attempts reached"
            );
            bus.emit(TransportEvent::ConnectError {
                message: "max reconnection attempts reached".to_string(),
            });
            return;
        }

        let attempt = {
            let mut conn = state.lock();
            conn.reconnect_attempts += 1;
            conn.reconnect_attempts
        };
        RECONNECT_ATTEMPTS.inc();
        let delay = backoff_delay(
            config.reconnect_delay(),
            config.max_reconnect_delay(),
            attempt,
        );
        info!(
            attempt,
            max_reconnect_attempts = config.max_reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );

        tokio::select! {
            _ = shutdown_rx.recv() => {
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        if manually_disconnected.load(Ordering::SeqCst) {
            return;
        }
        state.lock().state = ConnectionState::Connecting;
    }
}
