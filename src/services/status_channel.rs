use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::models::{Cluster, ClusterStatusEntry};
use crate::services::status_core::{
    ChannelCore, ChannelOptions, Command, ConnectionId, LinkState, TimerId, ABNORMAL_CLOSURE,
    NO_STATUS_RECEIVED,
};

/// Live cluster-status feed for one signed-in user.
///
/// Handles are cheap to clone and share one socket and one status table.
/// Dropping the last handle has the same effect as [`unmount`].
///
/// All methods that can open a socket must be called from inside a Tokio
/// runtime.
///
/// [`unmount`]: StatusSyncChannel::unmount
#[derive(Clone)]
pub struct StatusSyncChannel {
    shared: Arc<Shared>,
}

struct Shared {
    inner: Mutex<Inner>,
    table_tx: watch::Sender<Vec<ClusterStatusEntry>>,
    link_tx: watch::Sender<LinkState>,
    refresh: Arc<Notify>,
}

struct Inner {
    core: ChannelCore,
    sockets: HashMap<ConnectionId, SocketHandle>,
    timers: HashMap<TimerId, JoinHandle<()>>,
}

struct SocketHandle {
    close_tx: oneshot::Sender<()>,
    _task: JoinHandle<()>,
}

impl StatusSyncChannel {
    pub fn mount(options: ChannelOptions) -> Self {
        let (table_tx, _) = watch::channel(Vec::new());
        let (link_tx, _) = watch::channel(LinkState::Disconnected);
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                core: ChannelCore::new(options),
                sockets: HashMap::new(),
                timers: HashMap::new(),
            }),
            table_tx,
            link_tx,
            refresh: Arc::new(Notify::new()),
        });
        Self { shared }
    }

    /// Opens (or replaces) the socket for `user_id`.
    pub fn connect(&self, user_id: &str) {
        self.shared.dispatch(|core| core.connect(user_id));
    }

    pub fn on_directory_loaded(&self, clusters: &[Cluster]) {
        self.shared.dispatch(|core| core.on_directory_loaded(clusters));
    }

    pub fn on_directory_failed(&self) {
        self.shared.dispatch(|core| {
            core.on_directory_failed();
            Vec::new()
        });
    }

    /// Closes the socket with code 1000, cancels any pending reconnect and
    /// clears the table. Later events are ignored.
    pub fn unmount(&self) {
        self.shared.dispatch(|core| core.teardown());
    }

    pub fn is_mounted(&self) -> bool {
        !self.shared.lock().core.is_torn_down()
    }

    pub fn table(&self) -> Vec<ClusterStatusEntry> {
        self.shared.table_tx.borrow().clone()
    }

    /// Read-only view that changes whenever the table does.
    pub fn subscribe(&self) -> watch::Receiver<Vec<ClusterStatusEntry>> {
        self.shared.table_tx.subscribe()
    }

    pub fn link_state(&self) -> LinkState {
        *self.shared.link_tx.borrow()
    }

    pub fn watch_link(&self) -> watch::Receiver<LinkState> {
        self.shared.link_tx.subscribe()
    }

    /// Whether the most recent directory fetch failed.
    pub fn directory_error(&self) -> bool {
        self.shared.lock().core.directory_error()
    }

    pub fn user_id(&self) -> Option<String> {
        self.shared.lock().core.user_id().map(str::to_string)
    }

    /// Notified when the cluster directory should be fetched again.
    pub fn refresh_signal(&self) -> Arc<Notify> {
        self.shared.refresh.clone()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn dispatch<F>(self: &Arc<Self>, event: F)
    where
        F: FnOnce(&mut ChannelCore) -> Vec<Command>,
    {
        let mut inner = self.lock();
        let commands = event(&mut inner.core);
        self.execute(Arc::downgrade(self), &mut inner, commands);
        self.publish(&inner.core);
    }

    // Runs under the lock so commands from concurrent events never interleave.
    fn execute(&self, weak: Weak<Shared>, inner: &mut Inner, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::Open { conn, url } => {
                    let (close_tx, close_rx) = oneshot::channel();
                    let weak = weak.clone();
                    let task = tokio::spawn(async move {
                        run_connection(weak.clone(), conn, url, close_rx).await;
                        if let Some(shared) = weak.upgrade() {
                            shared.lock().sockets.remove(&conn);
                        }
                    });
                    inner.sockets.insert(conn, SocketHandle { close_tx, _task: task });
                }
                Command::Close { conn } => {
                    if let Some(socket) = inner.sockets.remove(&conn) {
                        let _ = socket.close_tx.send(());
                    }
                }
                Command::ScheduleReconnect { timer, delay } => {
                    let weak = weak.clone();
                    let task = tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        if let Some(shared) = weak.upgrade() {
                            shared.lock().timers.remove(&timer);
                            shared.dispatch(|core| core.on_reconnect_timer(timer));
                        }
                    });
                    inner.timers.insert(timer, task);
                }
                Command::CancelReconnect { timer } => {
                    if let Some(task) = inner.timers.remove(&timer) {
                        task.abort();
                    }
                }
                Command::RefreshDirectory => self.refresh.notify_one(),
            }
        }
    }

    fn publish(&self, core: &ChannelCore) {
        let entries = core.table().entries();
        self.table_tx.send_if_modified(|current| {
            if current.as_slice() == entries {
                false
            } else {
                *current = entries.to_vec();
                true
            }
        });

        let link = core.link_state();
        self.link_tx.send_if_modified(|current| {
            if *current == link {
                false
            } else {
                *current = link;
                true
            }
        });
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        let commands = inner.core.teardown();
        for command in commands {
            match command {
                Command::Close { conn } => {
                    if let Some(socket) = inner.sockets.remove(&conn) {
                        let _ = socket.close_tx.send(());
                    }
                }
                Command::CancelReconnect { timer } => {
                    if let Some(task) = inner.timers.remove(&timer) {
                        task.abort();
                    }
                }
                _ => {}
            }
        }
    }
}

fn dispatch<F>(shared: &Weak<Shared>, event: F)
where
    F: FnOnce(&mut ChannelCore) -> Vec<Command>,
{
    if let Some(shared) = shared.upgrade() {
        shared.dispatch(event);
    }
}

async fn run_connection(
    shared: Weak<Shared>,
    conn: ConnectionId,
    url: String,
    mut close_rx: oneshot::Receiver<()>,
) {
    let handshake = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = &mut close_rx => {
            debug!("Status connection #{} closed before the handshake finished", conn);
            return;
        }
    };

    let socket = match handshake {
        Ok((socket, _)) => socket,
        Err(e) => {
            warn!("Status connection #{} to {} failed: {}", conn, url, e);
            dispatch(&shared, |core| core.on_error(conn));
            dispatch(&shared, |core| core.on_close(conn, ABNORMAL_CLOSURE));
            return;
        }
    };

    dispatch(&shared, |core| {
        core.on_open(conn);
        Vec::new()
    });

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            _ = &mut close_rx => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "".into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    debug!("Status connection #{} close handshake failed: {}", conn, e);
                }
                return;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    dispatch(&shared, |core| core.on_message(conn, &text));
                }
                Some(Ok(Message::Close(frame))) => {
                    let code = frame
                        .map(|f| u16::from(f.code))
                        .unwrap_or(NO_STATUS_RECEIVED);
                    info!("Status connection #{} received close frame ({})", conn, code);
                    let _ = sink.close().await;
                    dispatch(&shared, |core| core.on_close(conn, code));
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Status connection #{} transport error: {}", conn, e);
                    dispatch(&shared, |core| core.on_error(conn));
                    dispatch(&shared, |core| core.on_close(conn, ABNORMAL_CLOSURE));
                    return;
                }
                None => {
                    dispatch(&shared, |core| core.on_close(conn, ABNORMAL_CLOSURE));
                    return;
                }
            }
        }
    }
}
