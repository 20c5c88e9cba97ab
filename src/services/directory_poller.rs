use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::AuthService;
use crate::services::cluster_service::ClusterDirectory;
use crate::services::status_channel::StatusSyncChannel;

/// Keeps the status table's membership in step with the cluster directory.
///
/// Fetches on start, then again every `interval` or as soon as someone
/// notifies the channel's refresh signal.
pub struct DirectoryPoller {
    directory: Arc<dyn ClusterDirectory>,
    auth_service: AuthService,
    channel: StatusSyncChannel,
    interval: Duration,
}

impl DirectoryPoller {
    pub fn new(
        directory: Arc<dyn ClusterDirectory>,
        auth_service: AuthService,
        channel: StatusSyncChannel,
        interval: Duration,
    ) -> Self {
        Self {
            directory,
            auth_service,
            channel,
            interval,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let refresh = self.channel.refresh_signal();
        info!("Directory poller started (every {:?})", self.interval);

        while self.channel.is_mounted() {
            self.poll_once().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = refresh.notified() => debug!("Directory refresh requested"),
            }
        }

        info!("Directory poller stopped: status channel unmounted");
    }

    /// One fetch fed into the channel. Returns whether it succeeded.
    pub async fn poll_once(&self) -> bool {
        let token = match self.auth_service.access_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!("Cannot fetch cluster directory without a token: {}", e);
                self.channel.on_directory_failed();
                return false;
            }
        };

        match self.directory.fetch(&token).await {
            Ok(response) => {
                debug!("Directory returned {} clusters", response.data.len());
                self.channel.on_directory_loaded(&response.data);
                true
            }
            Err(e) => {
                warn!("Cluster directory fetch failed: {:#}", e);
                self.channel.on_directory_failed();
                false
            }
        }
    }
}
