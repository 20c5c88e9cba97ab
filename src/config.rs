use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use url::Url;

use crate::services::reconnect::ReconnectPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server_address: String,
    pub restapi_endpoint: String,
    pub websocket_url: String,
    pub keycloak_url: String,
    pub keycloak_realm: String,
    pub keycloak_client_id: String,
    pub keycloak_client_secret: Option<String>,
    pub keycloak_username: Option<String>,
    pub keycloak_password: Option<String>,
    pub keycloak_refresh_token: Option<String>,
    pub access_token: Option<String>,
    pub log_level: String,
    pub reconnect_backoff: String,
    pub reconnect_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    pub reconnect_max_attempts: Option<u32>,
    pub directory_poll_secs: u64,
    pub refetch_on_status_update: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        // .env подгружается только если явно указано USE_DOTENV=true
        if env::var("USE_DOTENV").ok().as_deref() == Some("true") {
            dotenv::dotenv().ok();
        }

        let config = Config {
            server_address: env::var("SERVER_ADDRESS")
                .unwrap_or_else(|_| "127.0.0.1:3002".to_string()),
            restapi_endpoint: env::var("RESTAPI_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:8081/v1".to_string()),
            websocket_url: env::var("WEBSOCKET_CONNECTION_URL")
                .unwrap_or_else(|_| "ws://localhost:8081/v1/websocket".to_string()),
            keycloak_url: env::var("KEYCLOAK_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            keycloak_realm: env::var("KEYCLOAK_REALM")
                .unwrap_or_else(|_| "clusterManager".to_string()),
            keycloak_client_id: env::var("KEYCLOAK_CLIENT_ID")
                .unwrap_or_else(|_| "clustermanagerclient".to_string()),
            keycloak_client_secret: env::var("KEYCLOAK_CLIENT_SECRET").ok(),
            keycloak_username: env::var("KEYCLOAK_USERNAME").ok(),
            keycloak_password: env::var("KEYCLOAK_PASSWORD").ok(),
            keycloak_refresh_token: env::var("KEYCLOAK_REFRESH_TOKEN").ok(),
            access_token: env::var("ACCESS_TOKEN").ok(),
            log_level: env::var("RUST_LOG")
                .unwrap_or_else(|_| "info".to_string()),
            reconnect_backoff: env::var("RECONNECT_BACKOFF")
                .unwrap_or_else(|_| "exponential".to_string()),
            reconnect_delay_ms: parse_var("RECONNECT_DELAY_MS", 5000)?,
            reconnect_max_delay_ms: parse_var("RECONNECT_MAX_DELAY_MS", 60_000)?,
            reconnect_max_attempts: parse_optional_var("RECONNECT_MAX_ATTEMPTS")?,
            directory_poll_secs: parse_var("DIRECTORY_POLL_SECS", 30)?,
            refetch_on_status_update: parse_var("REFETCH_ON_STATUS_UPDATE", true)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks the values that cannot be caught by parsing alone.
    pub fn validate(&self) -> Result<()> {
        let ws = Url::parse(&self.websocket_url)
            .with_context(|| format!("WEBSOCKET_CONNECTION_URL is not a valid URL: {}", self.websocket_url))?;
        if ws.scheme() != "ws" && ws.scheme() != "wss" {
            return Err(anyhow!(
                "WEBSOCKET_CONNECTION_URL must use ws:// or wss://, got {}://",
                ws.scheme()
            ));
        }

        Url::parse(&self.restapi_endpoint)
            .with_context(|| format!("RESTAPI_ENDPOINT is not a valid URL: {}", self.restapi_endpoint))?;

        self.reconnect_policy()?;

        if self.directory_poll_secs == 0 {
            return Err(anyhow!("DIRECTORY_POLL_SECS must be greater than zero"));
        }

        Ok(())
    }

    pub fn reconnect_policy(&self) -> Result<ReconnectPolicy> {
        let delay = Duration::from_millis(self.reconnect_delay_ms);
        match self.reconnect_backoff.to_ascii_lowercase().as_str() {
            "fixed" => Ok(ReconnectPolicy::Fixed {
                delay,
                max_attempts: self.reconnect_max_attempts,
            }),
            "exponential" => {
                if self.reconnect_max_delay_ms < self.reconnect_delay_ms {
                    return Err(anyhow!(
                        "RECONNECT_MAX_DELAY_MS ({}) is smaller than RECONNECT_DELAY_MS ({})",
                        self.reconnect_max_delay_ms,
                        self.reconnect_delay_ms
                    ));
                }
                Ok(ReconnectPolicy::Exponential {
                    initial: delay,
                    max: Duration::from_millis(self.reconnect_max_delay_ms),
                    max_attempts: self.reconnect_max_attempts,
                })
            }
            other => Err(anyhow!("Unknown RECONNECT_BACKOFF '{}', expected 'fixed' or 'exponential'", other)),
        }
    }

    pub fn directory_poll_interval(&self) -> Duration {
        Duration::from_secs(self.directory_poll_secs)
    }

    fn api_base(&self) -> &str {
        self.restapi_endpoint.trim_end_matches('/')
    }

    pub fn clusters_url(&self) -> String {
        format!("{}/clusters", self.api_base())
    }

    pub fn cluster_url(&self, id: &str) -> String {
        format!("{}/clusters/{}", self.api_base(), id)
    }

    pub fn cluster_upgrade_url(&self, id: &str) -> String {
        format!("{}/clusters/upgrade/{}", self.api_base(), id)
    }

    pub fn kubeconfig_url(&self) -> String {
        format!("{}/clusters/generate-config", self.api_base())
    }

    pub fn kube_versions_url(&self) -> String {
        format!("{}/kubeversion/", self.api_base())
    }

    pub fn host_clusters_url(&self) -> String {
        format!("{}/host-clusters/", self.api_base())
    }

    pub fn subscriptions_url(&self) -> String {
        format!("{}/public/subscriptions", self.api_base())
    }

    pub fn subscription_check_url(&self) -> String {
        format!("{}/users/subscription-check", self.api_base())
    }

    pub fn subscription_request_url(&self) -> String {
        format!("{}/users/subscription-request", self.api_base())
    }

    pub fn keycloak_token_url(&self) -> String {
        format!("{}/realms/{}/protocol/openid-connect/token", self.keycloak_url.trim_end_matches('/'), self.keycloak_realm)
    }

    pub fn keycloak_logout_url(&self) -> String {
        format!("{}/realms/{}/protocol/openid-connect/logout", self.keycloak_url.trim_end_matches('/'), self.keycloak_realm)
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("Invalid value for {}: '{}' ({})", name, raw, e)),
        Err(_) => Ok(default),
    }
}

fn parse_optional_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("Invalid value for {}: '{}' ({})", name, raw, e)),
        Err(_) => Ok(None),
    }
}
