use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub pods: u32,
    #[serde(default)]
    pub service: u32,
    #[serde(default)]
    pub config_map: u32,
    #[serde(default)]
    pub persistance_vol_claims: u32,
    #[serde(default)]
    pub replication_ctl: u32,
    #[serde(default)]
    pub secrets: u32,
    #[serde(default)]
    pub loadbalancer: u32,
    #[serde(default)]
    pub node_port: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostCluster {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub nodes: Option<u32>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
}

/// Result of the subscription check for the signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionCheck {
    #[serde(default)]
    pub status: serde_json::Value,
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_groups: Vec<UserGroup>,
    #[serde(default)]
    pub realm_roles: serde_json::Value,
}
