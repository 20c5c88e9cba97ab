use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};

use crate::{
    models::{ApiResponse, ClusterStatusEntry},
    services::LinkState,
    AppState,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub link: LinkState,
    pub user_id: Option<String>,
    pub directory_error: bool,
    pub clusters: Vec<ClusterStatusEntry>,
}

/// GET /api/v1/clusters/status
/// Current live status table, in directory order.
pub async fn get_status_table(State(state): State<AppState>) -> Json<ApiResponse<StatusSnapshot>> {
    let snapshot = StatusSnapshot {
        link: state.channel.link_state(),
        user_id: state.channel.user_id(),
        directory_error: state.channel.directory_error(),
        clusters: state.channel.table(),
    };
    Json(ApiResponse::success(snapshot))
}
