use anyhow::{anyhow, Context, Result};
use jsonwebtoken::{decode, DecodingKey, Validation, TokenData};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Config;

/// Tokens expiring sooner than this are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 30;

/// Claims of the signed-in dashboard user, read from the access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub sub: String,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub realm_access: Option<RealmAccess>,
    #[serde(default)]
    pub exp: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealmAccess {
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct Session {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: i64,
}

impl Session {
    fn is_fresh(&self, now: i64) -> bool {
        self.expires_at - REFRESH_MARGIN_SECS > now
    }
}

/// Keycloak session used for every call to the cluster API.
#[derive(Clone)]
pub struct AuthService {
    config: Config,
    client: Client,
    session: Arc<Mutex<Option<Session>>>,
}

impl AuthService {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::new();
        Ok(Self {
            config: config.clone(),
            client,
            session: Arc::new(Mutex::new(None)),
        })
    }

    /// Returns a bearer token, refreshing or signing in again when the cached
    /// one is about to expire.
    pub async fn access_token(&self) -> Result<String> {
        let mut session = self.session.lock().await;
        let now = chrono::Utc::now().timestamp();

        if let Some(current) = session.as_ref() {
            if current.is_fresh(now) {
                return Ok(current.access_token.clone());
            }
        }

        let refresh = session
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
            .or_else(|| self.config.keycloak_refresh_token.clone());

        let mut last_error = None;

        if let Some(refresh) = refresh {
            match self.refresh_token(&refresh).await {
                Ok(token) => {
                    let fresh = self.session_from(token, now);
                    let access = fresh.access_token.clone();
                    *session = Some(fresh);
                    return Ok(access);
                }
                Err(e) => {
                    tracing::warn!("Token refresh failed, trying other credentials: {}", e);
                    last_error = Some(e);
                }
            }
        }

        if self.config.keycloak_username.is_some() && self.config.keycloak_password.is_some() {
            match self.login_with_password().await {
                Ok(token) => {
                    let fresh = self.session_from(token, now);
                    let access = fresh.access_token.clone();
                    *session = Some(fresh);
                    return Ok(access);
                }
                Err(e) => {
                    tracing::warn!("Password sign-in failed, trying other credentials: {}", e);
                    last_error = Some(e);
                }
            }
        }

        if let Some(token) = &self.config.access_token {
            return Ok(token.clone());
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow!("No usable credentials: set KEYCLOAK_REFRESH_TOKEN, KEYCLOAK_USERNAME/KEYCLOAK_PASSWORD or ACCESS_TOKEN")
        }))
    }

    fn session_from(&self, token: OAuthTokenResponse, now: i64) -> Session {
        // prefer the exp claim, fall back to expires_in
        let expires_at = decode_claims(&token.access_token)
            .ok()
            .and_then(|claims| claims.exp)
            .unwrap_or(now + token.expires_in);
        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
        }
    }

    async fn login_with_password(&self) -> Result<OAuthTokenResponse> {
        let (username, password) = match (&self.config.keycloak_username, &self.config.keycloak_password) {
            (Some(u), Some(p)) => (u.as_str(), p.as_str()),
            _ => return Err(anyhow!("Keycloak username/password not configured")),
        };

        let mut params = vec![
            ("grant_type", "password"),
            ("client_id", self.config.keycloak_client_id.as_str()),
            ("username", username),
            ("password", password),
        ];
        if let Some(secret) = &self.config.keycloak_client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let resp = self
            .client
            .post(self.config.keycloak_token_url())
            .form(&params)
            .send()
            .await
            .context("Keycloak is unreachable")?;

        if !resp.status().is_success() {
            return Err(anyhow!("Failed to sign in as {}: HTTP {}", username, resp.status()));
        }

        tracing::info!("Signed in to Keycloak as {}", username);
        Ok(resp.json().await?)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<OAuthTokenResponse> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("client_id", self.config.keycloak_client_id.as_str()),
            ("refresh_token", refresh_token),
        ];
        if let Some(secret) = &self.config.keycloak_client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let resp = self
            .client
            .post(self.config.keycloak_token_url())
            .form(&params)
            .send()
            .await
            .context("Keycloak is unreachable")?;

        if !resp.status().is_success() {
            return Err(anyhow!("Failed to refresh token: HTTP {}", resp.status()));
        }

        Ok(resp.json().await?)
    }

    pub async fn logout(&self) -> Result<()> {
        let refresh_token = match self.session.lock().await.take().and_then(|s| s.refresh_token) {
            Some(token) => token,
            None => return Ok(()),
        };

        let mut params = vec![
            ("client_id", self.config.keycloak_client_id.as_str()),
            ("refresh_token", refresh_token.as_str()),
        ];
        if let Some(secret) = &self.config.keycloak_client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let resp = self
            .client
            .post(self.config.keycloak_logout_url())
            .form(&params)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(anyhow!("Failed to logout: HTTP {}", resp.status()));
        }

        Ok(())
    }

    /// Claims of whoever the current access token belongs to.
    pub async fn session_user(&self) -> Result<SessionUser> {
        let token = self.access_token().await?;
        decode_claims(&token)
    }
}

/// Reads the claims without checking the signature. The dashboard only
/// displays them; the cluster API does the real validation.
pub fn decode_claims(token: &str) -> Result<SessionUser> {
    let header = jsonwebtoken::decode_header(token).context("Access token is not a JWT")?;

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data: TokenData<SessionUser> = decode(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}
