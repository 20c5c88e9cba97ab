use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use tracing::info;

use super::{session_token, upstream_error, HandlerError};
use crate::{
    models::{
        ApiResponse, Cluster, CreateClusterRequest, HostCluster, KubeVersion, KubeconfigRequest,
        UpgradeClusterRequest,
    },
    AppState,
};

/// Lifecycle changes alter the directory, so the poller refetches right away.
fn invalidate_directory(state: &AppState) {
    state.channel.refresh_signal().notify_one();
}

pub async fn list_clusters(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Cluster>>>, HandlerError> {
    let token = session_token(&state).await?;
    let response = state
        .cluster_service
        .list_clusters(&token)
        .await
        .map_err(upstream_error)?;
    Ok(Json(ApiResponse::success(response.data)))
}

pub async fn get_cluster(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Cluster>>, HandlerError> {
    let token = session_token(&state).await?;
    let response = state
        .cluster_service
        .get_cluster(&token, &id)
        .await
        .map_err(upstream_error)?;
    Ok(Json(ApiResponse::success(response.data)))
}

pub async fn get_cluster_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Value>>, HandlerError> {
    let token = session_token(&state).await?;
    let status = state
        .cluster_service
        .get_cluster_status(&token, &id)
        .await
        .map_err(upstream_error)?;
    Ok(Json(ApiResponse::success(status)))
}

pub async fn create_cluster(
    State(state): State<AppState>,
    Json(payload): Json<CreateClusterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Value>>), HandlerError> {
    let token = session_token(&state).await?;
    let created = state
        .cluster_service
        .create_cluster(&token, &payload)
        .await
        .map_err(upstream_error)?;

    info!("Cluster '{}' created in {}", payload.name, payload.region);
    invalidate_directory(&state);
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub async fn delete_cluster(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ApiResponse<Value>>), HandlerError> {
    let token = session_token(&state).await?;
    let result = state
        .cluster_service
        .delete_cluster(&token, &id)
        .await
        .map_err(upstream_error)?;

    info!("Delete command sent for cluster {}", id);
    invalidate_directory(&state);
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(result))))
}

pub async fn start_cluster(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Value>>, HandlerError> {
    let token = session_token(&state).await?;
    let result = state
        .cluster_service
        .start_cluster(&token, &id)
        .await
        .map_err(upstream_error)?;

    info!("Start command sent for cluster {}", id);
    invalidate_directory(&state);
    Ok(Json(ApiResponse::success(result)))
}

pub async fn stop_cluster(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Value>>, HandlerError> {
    let token = session_token(&state).await?;
    let result = state
        .cluster_service
        .stop_cluster(&token, &id)
        .await
        .map_err(upstream_error)?;

    info!("Stop command sent for cluster {}", id);
    invalidate_directory(&state);
    Ok(Json(ApiResponse::success(result)))
}

pub async fn upgrade_cluster(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpgradeClusterRequest>,
) -> Result<Json<ApiResponse<Value>>, HandlerError> {
    let token = session_token(&state).await?;
    let result = state
        .cluster_service
        .upgrade_cluster(&token, &id, &payload)
        .await
        .map_err(upstream_error)?;

    info!("Upgrade of cluster {} to {} requested", id, payload.kube_version);
    invalidate_directory(&state);
    Ok(Json(ApiResponse::success(result)))
}

#[derive(Debug, serde::Deserialize)]
pub struct KubeconfigParams {
    #[serde(rename = "expiryTime", alias = "expiry_time")]
    pub expiry_time: String,
}

/// Returns the kubeconfig as a `kubeconfig.yaml` download.
pub async fn generate_kubeconfig(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(params): Json<KubeconfigParams>,
) -> Result<Response, HandlerError> {
    let token = session_token(&state).await?;
    let request = KubeconfigRequest {
        expiry_time: params.expiry_time,
        cluster_id: id.clone(),
    };
    let yaml = state
        .cluster_service
        .generate_kubeconfig(&token, &request)
        .await
        .map_err(upstream_error)?;

    info!("Kubeconfig generated for cluster {} (expires in {})", id, request.expiry_time);
    Ok((
        [
            (header::CONTENT_TYPE, "application/x-yaml"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"kubeconfig.yaml\""),
        ],
        yaml,
    )
        .into_response())
}

pub async fn list_kube_versions(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<KubeVersion>>>, HandlerError> {
    let token = session_token(&state).await?;
    let response = state
        .cluster_service
        .list_kube_versions(&token)
        .await
        .map_err(upstream_error)?;
    Ok(Json(ApiResponse::success(response.data)))
}

pub async fn list_host_clusters(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<HostCluster>>>, HandlerError> {
    let token = session_token(&state).await?;
    let response = state
        .cluster_service
        .list_host_clusters(&token)
        .await
        .map_err(upstream_error)?;
    Ok(Json(ApiResponse::success(response.data)))
}
