use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::Config;
use crate::models::{
    Cluster, CreateClusterRequest, HostCluster, KubeVersion, KubeconfigRequest, RemoteListResponse,
    RemoteResponse, Subscription, SubscriptionCheck, UpgradeClusterRequest,
};

/// Non-2xx answer from the cluster API. `detail` carries the server's
/// explanation when it sent one.
#[derive(Debug, Clone, thiserror::Error)]
#[error("cluster API returned HTTP {status}: {detail}")]
pub struct RemoteApiError {
    pub status: StatusCode,
    pub detail: String,
}

/// Read-only listing of the current user's clusters.
#[async_trait]
pub trait ClusterDirectory: Send + Sync {
    async fn fetch(&self, token: &str) -> Result<RemoteListResponse<Cluster>>;
}

#[derive(Clone)]
pub struct ClusterService {
    config: Config,
    client: Client,
}

impl ClusterService {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    pub async fn list_clusters(&self, token: &str) -> Result<RemoteListResponse<Cluster>> {
        let request = self.client.get(self.config.clusters_url()).bearer_auth(token);
        self.send_json(request).await.context("Failed to list clusters")
    }

    pub async fn get_cluster(&self, token: &str, id: &str) -> Result<RemoteResponse<Cluster>> {
        let request = self.client.get(self.config.cluster_url(id)).bearer_auth(token);
        self.send_json(request)
            .await
            .with_context(|| format!("Failed to fetch cluster {}", id))
    }

    pub async fn get_cluster_status(&self, token: &str, id: &str) -> Result<Value> {
        let url = format!("{}/status", self.config.cluster_url(id));
        let request = self.client.get(url).bearer_auth(token);
        self.send_value(request)
            .await
            .with_context(|| format!("Failed to fetch status of cluster {}", id))
    }

    pub async fn create_cluster(&self, token: &str, payload: &CreateClusterRequest) -> Result<Value> {
        let request = self
            .client
            .post(self.config.clusters_url())
            .bearer_auth(token)
            .json(payload);
        self.send_value(request)
            .await
            .with_context(|| format!("Failed to create cluster {}", payload.name))
    }

    pub async fn delete_cluster(&self, token: &str, id: &str) -> Result<Value> {
        let request = self.client.delete(self.config.cluster_url(id)).bearer_auth(token);
        self.send_value(request)
            .await
            .with_context(|| format!("Failed to delete cluster {}", id))
    }

    pub async fn start_cluster(&self, token: &str, id: &str) -> Result<Value> {
        let url = format!("{}/start", self.config.cluster_url(id));
        self.send_value(self.client.patch(url).bearer_auth(token))
            .await
            .with_context(|| format!("Failed to start cluster {}", id))
    }

    pub async fn stop_cluster(&self, token: &str, id: &str) -> Result<Value> {
        let url = format!("{}/stop", self.config.cluster_url(id));
        self.send_value(self.client.patch(url).bearer_auth(token))
            .await
            .with_context(|| format!("Failed to stop cluster {}", id))
    }

    pub async fn upgrade_cluster(&self, token: &str, id: &str, payload: &UpgradeClusterRequest) -> Result<Value> {
        let request = self
            .client
            .put(self.config.cluster_upgrade_url(id))
            .bearer_auth(token)
            .json(payload);
        self.send_value(request)
            .await
            .with_context(|| format!("Failed to upgrade cluster {} to {}", id, payload.kube_version))
    }

    /// Returns the kubeconfig YAML as produced by the API.
    pub async fn generate_kubeconfig(&self, token: &str, payload: &KubeconfigRequest) -> Result<String> {
        let request = self
            .client
            .post(self.config.kubeconfig_url())
            .bearer_auth(token)
            .json(payload);
        let response = self.send(request).await?;
        let body = response
            .text()
            .await
            .context("Failed to read kubeconfig body")?;

        // the API may wrap the YAML in a JSON string
        match serde_json::from_str::<String>(&body) {
            Ok(yaml) => Ok(yaml),
            Err(_) => Ok(body),
        }
    }

    pub async fn list_kube_versions(&self, token: &str) -> Result<RemoteListResponse<KubeVersion>> {
        let request = self.client.get(self.config.kube_versions_url()).bearer_auth(token);
        self.send_json(request).await.context("Failed to list Kubernetes versions")
    }

    pub async fn list_host_clusters(&self, token: &str) -> Result<RemoteListResponse<HostCluster>> {
        let request = self.client.get(self.config.host_clusters_url()).bearer_auth(token);
        self.send_json(request).await.context("Failed to list host clusters")
    }

    /// Public plan catalog; needs no token.
    pub async fn list_subscriptions(&self) -> Result<RemoteListResponse<Subscription>> {
        let request = self.client.get(self.config.subscriptions_url());
        self.send_json(request).await.context("Failed to list subscriptions")
    }

    pub async fn check_subscription(&self, token: &str) -> Result<RemoteResponse<SubscriptionCheck>> {
        let request = self.client.get(self.config.subscription_check_url()).bearer_auth(token);
        self.send_json(request).await.context("Failed to check subscription")
    }

    pub async fn request_subscription(&self, token: &str) -> Result<Value> {
        let request = self.client.post(self.config.subscription_request_url()).bearer_auth(token);
        self.send_value(request).await.context("Failed to request subscription")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.context("Cluster API is unreachable")?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("detail")
                    .or_else(|| v.get("message"))
                    .and_then(|d| d.as_str().map(str::to_string))
            })
            .unwrap_or(body);
        Err(RemoteApiError { status, detail }.into())
    }

    /// For calls whose body is informational only; an empty body is `null`.
    async fn send_value(&self, request: RequestBuilder) -> Result<Value> {
        let response = self.send(request).await?;
        let body = response
            .text()
            .await
            .context("Failed to read cluster API response")?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let parsed = response
            .json::<T>()
            .await
            .context("Unexpected response body from cluster API")?;
        Ok(parsed)
    }
}

#[async_trait]
impl ClusterDirectory for ClusterService {
    async fn fetch(&self, token: &str) -> Result<RemoteListResponse<Cluster>> {
        self.list_clusters(token).await
    }
}
