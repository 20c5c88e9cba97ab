use serde::{Deserialize, Serialize};
use std::fmt;

use super::subscription::{HostCluster, Subscription};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub status: ClusterStatus,
    #[serde(default)]
    pub user: Option<ClusterOwner>,
    #[serde(default)]
    pub subscription: Option<Subscription>,
    #[serde(default, rename = "hostCluster")]
    pub host_cluster: Option<HostCluster>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub kube_version: Option<String>,
}

impl Cluster {
    /// Owner id used to address the status socket, if the record carries one.
    pub fn owner_id(&self) -> Option<&str> {
        self.user
            .as_ref()
            .map(|u| u.id.as_str())
            .filter(|id| !id.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterOwner {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "userName")]
    pub user_name: Option<String>,
}

/// Cluster lifecycle state as reported by the API.
///
/// The server may introduce new states at any time, so anything unknown is
/// kept verbatim in `Other` and rendered unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClusterStatus {
    Creating,
    Pending,
    Failed,
    Running,
    Stopped,
    Other(String),
}

impl ClusterStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ClusterStatus::Creating => "Creating",
            ClusterStatus::Pending => "Pending",
            ClusterStatus::Failed => "Failed",
            ClusterStatus::Running => "Running",
            ClusterStatus::Stopped => "Stopped",
            ClusterStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for ClusterStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Creating" => ClusterStatus::Creating,
            "Pending" => ClusterStatus::Pending,
            "Failed" => ClusterStatus::Failed,
            "Running" => ClusterStatus::Running,
            "Stopped" => ClusterStatus::Stopped,
            _ => ClusterStatus::Other(raw),
        }
    }
}

impl From<&str> for ClusterStatus {
    fn from(raw: &str) -> Self {
        ClusterStatus::from(raw.to_string())
    }
}

impl From<ClusterStatus> for String {
    fn from(status: ClusterStatus) -> Self {
        match status {
            ClusterStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClusterRequest {
    pub name: String,
    pub subscription_id: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeClusterRequest {
    pub kube_version: String,
}

/// Body of the kubeconfig generation call. Field names follow the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeconfigRequest {
    #[serde(rename = "expiryTime")]
    pub expiry_time: String,
    #[serde(rename = "clusterId")]
    pub cluster_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeVersion {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub kube_version: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}
