use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};

use crate::AppState;

pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let health_data = json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().timestamp(),
        "service": "cluster-dashboard",
        "version": env!("CARGO_PKG_VERSION"),
        "status_channel": state.channel.link_state()
    });

    Ok(Json(health_data))
}
