use axum::{http::StatusCode, response::Json};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::services::RemoteApiError;
use crate::AppState;

pub mod cluster_handler;
pub mod health_handler;
pub mod status_handler;
pub mod subscription_handler;
pub mod user_handler;

pub type HandlerError = (StatusCode, Json<Value>);

/// Bearer token of the dashboard session, or 401.
pub(crate) async fn session_token(state: &AppState) -> Result<String, HandlerError> {
    state.auth_service.access_token().await.map_err(|e| {
        warn!("No session token available: {}", e);
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Unauthorized",
                "message": "Dashboard session is not signed in"
            })),
        )
    })
}

/// Relays cluster API rejections with their status; anything else is 502.
pub(crate) fn upstream_error(e: anyhow::Error) -> HandlerError {
    if let Some(remote) = e.downcast_ref::<RemoteApiError>() {
        warn!("{:#}", e);
        let status = StatusCode::from_u16(remote.status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        return (
            status,
            Json(json!({
                "error": status.canonical_reason().unwrap_or("Error"),
                "message": remote.detail
            })),
        );
    }

    error!("{:#}", e);
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({
            "error": "Bad Gateway",
            "message": e.to_string()
        })),
    )
}
