pub mod cluster_service;
pub mod directory_poller;
pub mod reconnect;
pub mod status_channel;
pub mod status_core;

pub use cluster_service::{ClusterDirectory, ClusterService, RemoteApiError};
pub use directory_poller::DirectoryPoller;
pub use reconnect::ReconnectPolicy;
pub use status_channel::StatusSyncChannel;
pub use status_core::{ChannelOptions, LinkState};
