#![forbid(unsafe_code)]

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use souk_core::RealtimeEvent;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{AuthContext, RealtimeConfig, ReconnectPolicy, Transport};

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DisconnectReason {
    Requested,
    /// Terminal: an explicit `connect` is needed to try again.
    RetriesExhausted { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub state: ConnectionState,
    pub user_id: Option<String>,
    pub last_disconnect: Option<DisconnectReason>,
}

impl Default for ChannelStatus {
    fn default() -> Self { Self { state: ConnectionState::Disconnected, user_id: None, last_disconnect: None } }
}

/// View onto the channel's current session: status plus the event feed.
pub struct ChannelHandle {
    status: watch::Receiver<ChannelStatus>,
    events: broadcast::Receiver<RealtimeEvent>,
}

impl ChannelHandle {
    pub fn status(&self) -> ChannelStatus { self.status.borrow().clone() }
    pub fn state(&self) -> ConnectionState { self.status.borrow().state }
    pub fn user_id(&self) -> Option<String> { self.status.borrow().user_id.clone() }

    /// Next event; lagged gaps are skipped. `None` once the channel is dropped.
    pub async fn recv(&mut self) -> Option<RealtimeEvent> {
        loop {
            match self.events.recv().await {
                Ok(ev) => return Some(ev),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "realtime: event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn status_receiver(&self) -> watch::Receiver<ChannelStatus> { self.status.clone() }
}

/// Reconnecting pub/sub client. One logical connection per instance; connect and
/// disconnect are serialized in call order.
pub struct RealtimeChannel {
    cfg: RealtimeConfig,
    transport: Arc<dyn Transport>,
    status: Arc<watch::Sender<ChannelStatus>>,
    events: broadcast::Sender<RealtimeEvent>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeChannel {
    pub fn new(cfg: RealtimeConfig, transport: Arc<dyn Transport>) -> Self {
        let (status, _) = watch::channel(ChannelStatus::default());
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self { cfg, transport, status: Arc::new(status), events, driver: Mutex::new(None) }
    }

    pub fn status(&self) -> ChannelStatus { self.status.borrow().clone() }

    pub fn subscribe_status(&self) -> watch::Receiver<ChannelStatus> { self.status.subscribe() }

    pub fn handle(&self) -> ChannelHandle {
        ChannelHandle { status: self.status.subscribe(), events: self.events.subscribe() }
    }

    /// Start a session for `user_id`. Absent/blank ids and calls made while a session is
    /// connecting or connected are no-ops returning a handle to the current session.
    pub async fn connect(&self, user_id: Option<&str>) -> ChannelHandle {
        let mut driver = self.driver.lock().await;
        let Some(user) = user_id.map(str::trim).filter(|s| !s.is_empty()) else {
            debug!("realtime: connect without user id ignored");
            return self.handle();
        };
        let current = self.status();
        if current.state != ConnectionState::Disconnected {
            debug!(requested = %user, active = ?current.user_id, "realtime: session already active");
            return self.handle();
        }
        if let Some(stale) = driver.take() {
            stale.abort();
        }

        let auth = AuthContext { user_id: user.to_string(), endpoint: self.cfg.endpoint.clone() };
        self.status.send_replace(ChannelStatus {
            state: ConnectionState::Connecting,
            user_id: Some(auth.user_id.clone()),
            last_disconnect: None,
        });
        let handle = self.handle();
        info!(user = %auth.user_id, endpoint = %auth.endpoint, "realtime: connecting");
        *driver = Some(tokio::spawn(drive(
            Arc::clone(&self.transport),
            auth,
            self.cfg.policy,
            Arc::clone(&self.status),
            self.events.clone(),
        )));
        handle
    }

    /// Tear down the session. No-op when already disconnected.
    pub async fn disconnect(&self) {
        let mut driver = self.driver.lock().await;
        let task = driver.take();
        let was = self.status().state;
        if let Some(task) = task {
            task.abort();
            // Wait for the task to drop its stream so the transport is released.
            let _ = task.await;
        }
        if was == ConnectionState::Disconnected {
            debug!("realtime: disconnect while disconnected ignored");
            return;
        }
        self.status.send_replace(ChannelStatus {
            state: ConnectionState::Disconnected,
            user_id: None,
            last_disconnect: Some(DisconnectReason::Requested),
        });
        info!("realtime: disconnected");
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        if let Some(task) = self.driver.get_mut().take() {
            task.abort();
        }
    }
}

fn set_state(status: &watch::Sender<ChannelStatus>, state: ConnectionState) {
    status.send_modify(|s| s.state = state);
}

/// Connection loop: open, pump events, and on loss retry with a fixed delay until the
/// ceiling of consecutive failures is reached.
async fn drive(
    transport: Arc<dyn Transport>,
    auth: AuthContext,
    policy: ReconnectPolicy,
    status: Arc<watch::Sender<ChannelStatus>>,
    events: broadcast::Sender<RealtimeEvent>,
) {
    let mut retries: u32 = 0;
    loop {
        match transport.open(&auth).await {
            Ok(mut stream) => {
                retries = 0;
                set_state(&status, ConnectionState::Connected);
                info!(user = %auth.user_id, "realtime: connected");
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(ev) => {
                            let _ = events.send(ev);
                        }
                        Err(e) => {
                            warn!(error = %e, "realtime: transport error");
                            break;
                        }
                    }
                }
                warn!(user = %auth.user_id, "realtime: connection lost");
            }
            Err(e) => warn!(error = %e, attempt = retries, "realtime: connect failed"),
        }

        if retries >= policy.max_attempts {
            warn!(user = %auth.user_id, attempts = retries, "realtime: giving up");
            status.send_replace(ChannelStatus {
                state: ConnectionState::Disconnected,
                user_id: None,
                last_disconnect: Some(DisconnectReason::RetriesExhausted { attempts: retries }),
            });
            return;
        }
        retries += 1;
        metrics::counter!("realtime_reconnect_attempts_total", 1u64);
        set_state(&status, ConnectionState::Connecting);
        tokio::time::sleep(policy.delay).await;
    }
}
