// Cluster Dashboard library
// Публичные модули экспортируются для тестов

pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod services;

use axum::{
    routing::{get, patch, post, put},
    Router,
};

pub use auth::AuthService;
pub use config::Config;
pub use services::{ClusterService, StatusSyncChannel};

use handlers::{cluster_handler, health_handler, status_handler, subscription_handler, user_handler};

// Состояние приложения, общее для всех обработчиков
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub auth_service: AuthService,
    pub cluster_service: ClusterService,
    pub channel: StatusSyncChannel,
}

/// Routes of the local dashboard API, without middleware layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler::health_check))
        .route("/api/v1/clusters/status", get(status_handler::get_status_table))
        .route(
            "/api/v1/clusters",
            get(cluster_handler::list_clusters).post(cluster_handler::create_cluster),
        )
        .route(
            "/api/v1/clusters/:id",
            get(cluster_handler::get_cluster).delete(cluster_handler::delete_cluster),
        )
        .route("/api/v1/clusters/:id/status", get(cluster_handler::get_cluster_status))
        .route("/api/v1/clusters/:id/start", patch(cluster_handler::start_cluster))
        .route("/api/v1/clusters/:id/stop", patch(cluster_handler::stop_cluster))
        .route("/api/v1/clusters/:id/upgrade", put(cluster_handler::upgrade_cluster))
        .route("/api/v1/clusters/:id/kubeconfig", post(cluster_handler::generate_kubeconfig))
        .route("/api/v1/kube-versions", get(cluster_handler::list_kube_versions))
        .route("/api/v1/host-clusters", get(cluster_handler::list_host_clusters))
        .route("/api/v1/subscriptions", get(subscription_handler::list_subscriptions))
        .route("/api/v1/subscriptions/check", get(subscription_handler::check_subscription))
        .route("/api/v1/subscriptions/request", post(subscription_handler::request_subscription))
        .route("/api/v1/user/profile", get(user_handler::get_profile))
        .with_state(state)
}
