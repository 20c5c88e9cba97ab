// Общие помощники для интеграционных тестов
#![allow(dead_code)]

use axum::Router;
use std::sync::Once;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use cluster_dashboard::{
    services::{ChannelOptions, ReconnectPolicy},
    AppState, AuthService, ClusterService, Config, StatusSyncChannel,
};

static INIT: Once = Once::new();

/// Инициализация логгирования для тестов (вызывается один раз)
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Тестовая конфигурация со статическим токеном
pub fn test_config(api: &str, websocket: &str) -> Config {
    Config {
        server_address: "127.0.0.1:0".to_string(),
        restapi_endpoint: api.to_string(),
        websocket_url: websocket.to_string(),
        keycloak_url: "http://127.0.0.1:9".to_string(),
        keycloak_realm: "clusterManager".to_string(),
        keycloak_client_id: "clustermanagerclient".to_string(),
        keycloak_client_secret: None,
        keycloak_username: None,
        keycloak_password: None,
        keycloak_refresh_token: None,
        access_token: Some("static-test-token".to_string()),
        log_level: "debug".to_string(),
        reconnect_backoff: "fixed".to_string(),
        reconnect_delay_ms: 100,
        reconnect_max_delay_ms: 1000,
        reconnect_max_attempts: None,
        directory_poll_secs: 30,
        refetch_on_status_update: false,
    }
}

pub fn fast_options(websocket: &str, delay_ms: u64) -> ChannelOptions {
    ChannelOptions::new(websocket)
        .with_policy(ReconnectPolicy::fixed(Duration::from_millis(delay_ms)))
        .with_refetch_on_update(false)
}

pub fn test_app_state(config: Config) -> AppState {
    let auth_service = AuthService::new(&config).unwrap();
    let cluster_service = ClusterService::new(&config).unwrap();
    let channel = StatusSyncChannel::mount(fast_options(&config.websocket_url, 60_000));
    AppState {
        config,
        auth_service,
        cluster_service,
        channel,
    }
}

/// Serves `app` on an ephemeral port and returns its base URL.
pub async fn spawn_http(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub struct ServerConn {
    pub path: String,
    pub socket: WebSocketStream<TcpStream>,
}

/// Minimal status socket server. Every accepted connection is handed to
/// the test through the returned receiver.
pub async fn spawn_ws_server() -> (String, mpsc::UnboundedReceiver<ServerConn>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut path = String::new();
                let accepted = accept_hdr_async(
                    stream,
                    |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                        path = req.uri().path().to_string();
                        Ok(resp)
                    },
                )
                .await;
                if let Ok(socket) = accepted {
                    let _ = tx.send(ServerConn { path, socket });
                }
            });
        }
    });

    (format!("ws://{}/v1/websocket", addr), rx)
}

/// Address nothing listens on.
pub async fn unused_ws_base() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}/v1/websocket", addr)
}
