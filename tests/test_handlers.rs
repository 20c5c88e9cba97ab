mod common;

use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use axum_test::TestServer;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;

use cluster_dashboard::{
    handlers::status_handler::StatusSnapshot,
    models::{ApiResponse, Cluster, ClusterStatus},
    router,
    services::LinkState,
    AppState,
};
use common::{init_test_logging, test_app_state, test_config, spawn_http, unused_ws_base};

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Фейковый REST API кластеров
fn fake_cluster_api() -> Router {
    Router::new()
        .route(
            "/v1/clusters",
            get(|headers: HeaderMap| async move {
                if bearer(&headers).as_deref() != Some("static-test-token") {
                    return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Not authenticated" })));
                }
                (
                    StatusCode::OK,
                    Json(json!({
                        "error_code": 0,
                        "message": "ok",
                        "count": 2,
                        "page": 1,
                        "size": 10,
                        "data": [
                            { "id": "c1", "name": "alpha", "status": "Running", "user": { "_id": "u1" } },
                            { "id": "c2", "name": "beta", "status": "Pending", "user": { "_id": "u1" } }
                        ]
                    })),
                )
            })
            .post(|Json(body): Json<Value>| async move {
                if body["name"] == "taken" {
                    return (StatusCode::CONFLICT, Json(json!({ "detail": "Cluster name already exists" })));
                }
                (StatusCode::OK, Json(json!({ "id": "c3", "name": body["name"] })))
            }),
        )
        .route(
            "/v1/clusters/:id",
            get(|Path(id): Path<String>| async move {
                if id != "c1" {
                    return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Cluster not found" })));
                }
                (
                    StatusCode::OK,
                    Json(json!({ "data": { "id": "c1", "name": "alpha", "status": "Upgrading" } })),
                )
            })
            .delete(|| async { StatusCode::NO_CONTENT }),
        )
        .route("/v1/clusters/:id/start", patch(|| async { Json(json!({ "message": "starting" })) }))
        .route(
            "/v1/clusters/generate-config",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["clusterId"], "c1");
                assert_eq!(body["expiryTime"], "24h");
                Json(Value::String("apiVersion: v1\nkind: Config\n".to_string())).into_response()
            }),
        )
        .route(
            "/v1/kubeversion/",
            get(|| async {
                Json(json!({ "data": [ { "_id": "k1", "name": "v1.29", "kube_version": "1.29.2" } ] }))
            }),
        )
        .route(
            "/v1/public/subscriptions",
            get(|headers: HeaderMap| async move {
                // каталог публичный, токен не передается
                assert!(bearer(&headers).is_none());
                Json(json!({ "data": [ { "_id": "p1", "name": "free", "pods": 10 } ] }))
            }),
        )
}

async fn app_with_fake_api() -> (TestServer, AppState) {
    let api = spawn_http(fake_cluster_api()).await;
    let config = test_config(&format!("{}/v1", api), &unused_ws_base().await);
    let state = test_app_state(config);
    let server = TestServer::new(router(state.clone())).unwrap();
    (server, state)
}

async fn refresh_requested(state: &AppState) -> bool {
    let refresh = state.channel.refresh_signal();
    timeout(Duration::from_millis(200), refresh.notified()).await.is_ok()
}

#[tokio::test]
async fn test_health_check_handler() {
    init_test_logging();
    let (server, _state) = app_with_fake_api().await;

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let health: Value = response.json();
    assert_eq!(health["status"], "healthy");
    assert!(health["timestamp"].is_number());
    assert_eq!(health["service"], "cluster-dashboard");
    assert_eq!(health["status_channel"], "disconnected");
}

#[tokio::test]
async fn test_status_snapshot_reflects_channel() {
    init_test_logging();
    let (server, state) = app_with_fake_api().await;

    let empty: ApiResponse<StatusSnapshot> = server.get("/api/v1/clusters/status").await.json();
    assert!(empty.success);
    let snapshot = empty.data.unwrap();
    assert!(snapshot.clusters.is_empty());
    assert_eq!(snapshot.user_id, None);
    assert!(!snapshot.directory_error);

    let clusters: Vec<Cluster> = serde_json::from_value(json!([
        { "id": "c1", "name": "alpha", "status": "Running", "user": { "_id": "u1" } }
    ]))
    .unwrap();
    state.channel.on_directory_loaded(&clusters);

    // сокет недоступен: ждем, пока канал запланирует переподключение
    let mut link = state.channel.watch_link();
    timeout(Duration::from_secs(5), link.wait_for(|s| *s == LinkState::ReconnectPending))
        .await
        .expect("channel never scheduled a reconnect")
        .unwrap();

    let loaded: ApiResponse<StatusSnapshot> = server.get("/api/v1/clusters/status").await.json();
    let snapshot = loaded.data.unwrap();
    assert_eq!(snapshot.clusters.len(), 1);
    assert_eq!(snapshot.clusters[0].cluster_id, "c1");
    assert_eq!(snapshot.clusters[0].status, ClusterStatus::Running);
    assert_eq!(snapshot.user_id.as_deref(), Some("u1"));
    assert_eq!(snapshot.link, LinkState::ReconnectPending);

    state.channel.unmount();
}

#[tokio::test]
async fn test_list_clusters_passes_token_and_unwraps_envelope() {
    init_test_logging();
    let (server, _state) = app_with_fake_api().await;

    let response = server.get("/api/v1/clusters").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: ApiResponse<Vec<Cluster>> = response.json();
    let clusters = body.data.unwrap();
    assert_eq!(clusters.len(), 2);
    assert_eq!(clusters[0].name, "alpha");
    assert_eq!(clusters[1].status, ClusterStatus::Pending);
    assert_eq!(clusters[1].owner_id(), Some("u1"));
}

#[tokio::test]
async fn test_unknown_status_is_kept_verbatim() {
    init_test_logging();
    let (server, _state) = app_with_fake_api().await;

    let body: ApiResponse<Cluster> = server.get("/api/v1/clusters/c1").await.json();
    assert_eq!(body.data.unwrap().status, ClusterStatus::Other("Upgrading".to_string()));
}

#[tokio::test]
async fn test_remote_rejection_is_relayed() {
    init_test_logging();
    let (server, state) = app_with_fake_api().await;

    let response = server
        .post("/api/v1/clusters")
        .json(&json!({ "name": "taken", "subscription_id": "s1", "region": "eu" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["message"], "Cluster name already exists");

    // неудачная мутация не должна дергать перезагрузку каталога
    assert!(!refresh_requested(&state).await);

    let missing = server.get("/api/v1/clusters/nope").await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(missing.json::<Value>()["message"], "Cluster not found");
}

#[tokio::test]
async fn test_create_cluster_requests_directory_refresh() {
    init_test_logging();
    let (server, state) = app_with_fake_api().await;

    let response = server
        .post("/api/v1/clusters")
        .json(&json!({ "name": "gamma", "subscription_id": "s1", "region": "eu", "kube_version": "1.29.2" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["data"]["id"], "c3");

    assert!(refresh_requested(&state).await);
}

#[tokio::test]
async fn test_delete_and_start_accept_empty_or_plain_bodies() {
    init_test_logging();
    let (server, state) = app_with_fake_api().await;

    let deleted = server.delete("/api/v1/clusters/c1").await;
    assert_eq!(deleted.status_code(), StatusCode::ACCEPTED);
    assert!(deleted.json::<Value>()["data"].is_null());
    assert!(refresh_requested(&state).await);

    let started = server.patch("/api/v1/clusters/c1/start").await;
    assert_eq!(started.status_code(), StatusCode::OK);
    assert_eq!(started.json::<Value>()["data"]["message"], "starting");
    assert!(refresh_requested(&state).await);
}

#[tokio::test]
async fn test_kubeconfig_download() {
    init_test_logging();
    let (server, _state) = app_with_fake_api().await;

    let response = server
        .post("/api/v1/clusters/c1/kubeconfig")
        .json(&json!({ "expiryTime": "24h" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.header("content-type"), "application/x-yaml");
    assert_eq!(
        response.header("content-disposition"),
        "attachment; filename=\"kubeconfig.yaml\""
    );
    assert_eq!(response.text(), "apiVersion: v1\nkind: Config\n");
}

#[tokio::test]
async fn test_catalog_endpoints() {
    init_test_logging();
    let (server, _state) = app_with_fake_api().await;

    let versions: Value = server.get("/api/v1/kube-versions").await.json();
    assert_eq!(versions["data"][0]["kube_version"], "1.29.2");
    assert_eq!(versions["data"][0]["active"], true);

    let plans: Value = server.get("/api/v1/subscriptions").await.json();
    assert_eq!(plans["data"][0]["name"], "free");
}

#[tokio::test]
async fn test_unreachable_api_is_bad_gateway() {
    init_test_logging();
    let config = test_config("http://127.0.0.1:9/v1", &unused_ws_base().await);
    let server = TestServer::new(router(test_app_state(config))).unwrap();

    let response = server.get("/api/v1/clusters").await;
    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.json::<Value>()["error"], "Bad Gateway");
}

#[tokio::test]
async fn test_missing_credentials_is_unauthorized() {
    init_test_logging();
    let mut config = test_config("http://127.0.0.1:9/v1", &unused_ws_base().await);
    config.access_token = None;
    let server = TestServer::new(router(test_app_state(config))).unwrap();

    let response = server.get("/api/v1/clusters").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let profile = server.get("/api/v1/user/profile").await;
    assert_eq!(profile.status_code(), StatusCode::UNAUTHORIZED);
}
