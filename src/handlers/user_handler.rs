use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::AppState;

pub async fn get_profile(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let user = state.auth_service.session_user().await.map_err(|e| {
        warn!("Cannot read session user: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    info!("Getting profile for user: {}", user.preferred_username.as_deref().unwrap_or(&user.sub));

    let roles = user
        .realm_access
        .as_ref()
        .map(|access| access.roles.clone())
        .unwrap_or_default();

    let profile = json!({
        "id": user.sub,
        "username": user.preferred_username,
        "email": user.email,
        "firstName": user.given_name,
        "lastName": user.family_name,
        "roles": roles
    });

    Ok(Json(profile))
}
