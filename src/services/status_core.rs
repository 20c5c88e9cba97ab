//! Connection state machine behind the status channel.
//!
//! `ChannelCore` holds no sockets or timers. Every event goes in as a method
//! call and comes out as a list of [`Command`]s for the driver to carry out,
//! which keeps every transition testable without a network.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::models::{Cluster, ClusterStatusEntry, ClusterStatusTable, StatusEvent};
use crate::services::reconnect::ReconnectPolicy;

/// Close code of an intentional shutdown. Every other code reconnects.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Reported when the transport dies without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;
/// Reported when a close frame carries no status code.
pub const NO_STATUS_RECEIVED: u16 = 1005;

pub type ConnectionId = u64;
pub type TimerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Disconnected,
    Connected,
    ReconnectPending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open { conn: ConnectionId, url: String },
    /// Close with code 1000 and forget the socket.
    Close { conn: ConnectionId },
    ScheduleReconnect { timer: TimerId, delay: Duration },
    CancelReconnect { timer: TimerId },
    RefreshDirectory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Disconnected,
    Connected(ConnectionId),
    ReconnectPending(TimerId),
}

#[derive(Debug, Clone)]
pub struct ChannelOptions {
    pub websocket_base: String,
    pub policy: ReconnectPolicy,
    pub refetch_on_update: bool,
}

impl ChannelOptions {
    pub fn new(websocket_base: impl Into<String>) -> Self {
        Self {
            websocket_base: websocket_base.into(),
            policy: ReconnectPolicy::default(),
            refetch_on_update: true,
        }
    }

    pub fn from_config(config: &crate::Config) -> anyhow::Result<Self> {
        Ok(Self {
            websocket_base: config.websocket_url.clone(),
            policy: config.reconnect_policy()?,
            refetch_on_update: config.refetch_on_status_update,
        })
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_refetch_on_update(mut self, refetch: bool) -> Self {
        self.refetch_on_update = refetch;
        self
    }

    /// Socket address for one user: `<websocket_base>/<user_id>`, with the
    /// id percent-encoded as a single path segment.
    pub fn url_for(&self, user_id: &str) -> String {
        let mut url = match Url::parse(&self.websocket_base) {
            Ok(url) => url,
            Err(e) => {
                warn!("Websocket base {} is not a valid URL: {}", self.websocket_base, e);
                return format!("{}/{}", self.websocket_base.trim_end_matches('/'), user_id);
            }
        };
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(user_id);
        }
        url.to_string()
    }
}

#[derive(Debug)]
pub struct ChannelCore {
    options: ChannelOptions,
    table: ClusterStatusTable,
    link: Link,
    user_id: Option<String>,
    /// Set by the first qualifying directory load; later loads never connect.
    bootstrapped: bool,
    /// Connection whose error cleared the handle; its close event still
    /// decides whether to reconnect.
    failed: Option<ConnectionId>,
    attempts: u32,
    next_id: u64,
    /// Last directory fetch failed; cleared by the next successful one.
    directory_error: bool,
    torn_down: bool,
}

impl ChannelCore {
    pub fn new(options: ChannelOptions) -> Self {
        Self {
            options,
            table: ClusterStatusTable::new(),
            link: Link::Disconnected,
            user_id: None,
            bootstrapped: false,
            failed: None,
            attempts: 0,
            next_id: 1,
            directory_error: false,
            torn_down: false,
        }
    }

    pub fn table(&self) -> &ClusterStatusTable {
        &self.table
    }

    pub fn entries(&self) -> Vec<ClusterStatusEntry> {
        self.table.entries().to_vec()
    }

    pub fn link_state(&self) -> LinkState {
        match self.link {
            Link::Disconnected => LinkState::Disconnected,
            Link::Connected(_) => LinkState::Connected,
            Link::ReconnectPending(_) => LinkState::ReconnectPending,
        }
    }

    pub fn current_connection(&self) -> Option<ConnectionId> {
        match self.link {
            Link::Connected(conn) => Some(conn),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn directory_error(&self) -> bool {
        self.directory_error
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn is_current(&self, conn: ConnectionId) -> bool {
        self.link == Link::Connected(conn)
    }

    /// Opens a connection for `user_id`, closing or cancelling whatever the
    /// channel held before.
    pub fn connect(&mut self, user_id: &str) -> Vec<Command> {
        if self.torn_down {
            debug!("connect({}) ignored: channel is unmounted", user_id);
            return Vec::new();
        }

        let mut commands = Vec::new();
        match self.link {
            Link::Connected(previous) => {
                info!("Closing status connection #{} before reconnecting", previous);
                commands.push(Command::Close { conn: previous });
            }
            Link::ReconnectPending(timer) => {
                commands.push(Command::CancelReconnect { timer });
            }
            Link::Disconnected => {}
        }

        let conn = self.allocate_id();
        let url = self.options.url_for(user_id);
        info!("Opening status connection #{} to {}", conn, url);

        self.failed = None;
        self.user_id = Some(user_id.to_string());
        self.link = Link::Connected(conn);
        commands.push(Command::Open { conn, url });
        commands
    }

    pub fn on_directory_loaded(&mut self, clusters: &[Cluster]) -> Vec<Command> {
        if self.torn_down {
            return Vec::new();
        }
        self.directory_error = false;

        if clusters.is_empty() {
            debug!("Directory returned no clusters, clearing status table");
            self.table.clear();
            return Vec::new();
        }

        self.table.seed(clusters);

        if self.bootstrapped {
            return Vec::new();
        }

        match clusters[0].owner_id() {
            Some(owner) => {
                let owner = owner.to_string();
                self.bootstrapped = true;
                self.connect(&owner)
            }
            None => {
                warn!("First cluster '{}' has no owner id, status socket not started", clusters[0].id);
                Vec::new()
            }
        }
    }

    pub fn on_directory_failed(&mut self) {
        if self.torn_down {
            return;
        }
        self.directory_error = true;
        self.table.clear();
    }

    pub fn on_open(&mut self, conn: ConnectionId) {
        if self.torn_down || !self.is_current(conn) {
            debug!("Ignoring open of stale status connection #{}", conn);
            return;
        }
        info!("Status connection #{} established", conn);
        self.attempts = 0;
    }

    pub fn on_message(&mut self, conn: ConnectionId, payload: &str) -> Vec<Command> {
        if self.torn_down || !self.is_current(conn) {
            debug!("Dropping frame from stale status connection #{}", conn);
            return Vec::new();
        }

        let event = match StatusEvent::parse(payload) {
            Ok(event) => event,
            Err(e) => {
                debug!("Ignoring malformed status frame on #{}: {}", conn, e);
                return Vec::new();
            }
        };

        match event {
            StatusEvent::ClusterStatusUpdated(update) => {
                if self.table.apply(&update.cluster_id, update.status.clone()) {
                    info!("Cluster {} is now {}", update.cluster_id, update.status);
                } else {
                    debug!("Status update for unknown cluster {}", update.cluster_id);
                }
                if self.options.refetch_on_update {
                    vec![Command::RefreshDirectory]
                } else {
                    Vec::new()
                }
            }
            StatusEvent::Ignored(tag) => {
                debug!("Ignoring '{}' event on #{}", tag, conn);
                Vec::new()
            }
        }
    }

    pub fn on_error(&mut self, conn: ConnectionId) -> Vec<Command> {
        if self.torn_down || !self.is_current(conn) {
            return Vec::new();
        }
        warn!("Status connection #{} failed, closing it", conn);
        self.link = Link::Disconnected;
        self.failed = Some(conn);
        vec![Command::Close { conn }]
    }

    pub fn on_close(&mut self, conn: ConnectionId, code: u16) -> Vec<Command> {
        if self.torn_down {
            return Vec::new();
        }

        let owned = self.is_current(conn)
            || (self.failed == Some(conn) && self.link == Link::Disconnected);
        if !owned {
            debug!("Ignoring close of stale status connection #{} (code {})", conn, code);
            return Vec::new();
        }

        self.failed = None;
        self.link = Link::Disconnected;

        if code == NORMAL_CLOSURE {
            info!("Status connection #{} closed normally", conn);
            return Vec::new();
        }

        match self.options.policy.delay_for(self.attempts) {
            Some(delay) => {
                self.attempts += 1;
                let timer = self.allocate_id();
                self.link = Link::ReconnectPending(timer);
                info!(
                    "Status connection #{} closed with code {}, reconnecting in {:?} (attempt {})",
                    conn, code, delay, self.attempts
                );
                vec![Command::ScheduleReconnect { timer, delay }]
            }
            None => {
                warn!(
                    "Status connection #{} closed with code {}, giving up after {} attempts",
                    conn, code, self.attempts
                );
                Vec::new()
            }
        }
    }

    pub fn on_reconnect_timer(&mut self, timer: TimerId) -> Vec<Command> {
        if self.torn_down || self.link != Link::ReconnectPending(timer) {
            debug!("Reconnect timer #{} fired after it was superseded", timer);
            return Vec::new();
        }
        self.link = Link::Disconnected;
        match self.user_id.clone() {
            Some(user_id) => self.connect(&user_id),
            None => Vec::new(),
        }
    }

    /// Releases everything. After this, every event is a no-op.
    pub fn teardown(&mut self) -> Vec<Command> {
        if self.torn_down {
            return Vec::new();
        }
        self.torn_down = true;
        self.table.clear();

        let commands = match self.link {
            Link::Connected(conn) => vec![Command::Close { conn }],
            Link::ReconnectPending(timer) => vec![Command::CancelReconnect { timer }],
            Link::Disconnected => Vec::new(),
        };
        self.link = Link::Disconnected;
        self.failed = None;
        commands
    }
}
