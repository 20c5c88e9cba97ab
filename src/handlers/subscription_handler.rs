use axum::{extract::State, response::Json};
use serde_json::Value;
use tracing::info;

use super::{session_token, upstream_error, HandlerError};
use crate::{
    models::{ApiResponse, Subscription, SubscriptionCheck},
    AppState,
};

pub async fn list_subscriptions(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Subscription>>>, HandlerError> {
    let response = state
        .cluster_service
        .list_subscriptions()
        .await
        .map_err(upstream_error)?;
    Ok(Json(ApiResponse::success(response.data)))
}

pub async fn check_subscription(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SubscriptionCheck>>, HandlerError> {
    let token = session_token(&state).await?;
    let response = state
        .cluster_service
        .check_subscription(&token)
        .await
        .map_err(upstream_error)?;
    Ok(Json(ApiResponse::success(response.data)))
}

pub async fn request_subscription(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, HandlerError> {
    let token = session_token(&state).await?;
    let result = state
        .cluster_service
        .request_subscription(&token)
        .await
        .map_err(upstream_error)?;

    info!("Subscription requested");
    Ok(Json(ApiResponse::success(result)))
}
