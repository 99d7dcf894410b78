//! UniFi Protect API client.
//!
//! Handles login for both UniFi OS consoles (cookie session plus CSRF token)
//! and legacy standalone servers (bearer token plus download access key),
//! lists cameras and builds footage export requests.

pub mod error;
pub mod types;

use std::time::Duration;

use chrono::NaiveDateTime;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::json;
use tokio::sync::RwLock;

pub use error::ProtectError;
pub use types::Camera;

use types::{millis_from_local, AccessKeyResponse, Bootstrap};

const CSRF_HEADER: &str = "x-csrf-token";

/// Connection settings for [`ProtectClient`].
#[derive(Clone)]
pub struct ClientConfig {
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub not_unifi_os: bool,
    pub verify_ssl: bool,
    pub timeout: Duration,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("not_unifi_os", &self.not_unifi_os)
            .field("verify_ssl", &self.verify_ssl)
            .finish_non_exhaustive()
    }
}

/// Credentials replayed on every API request.
#[derive(Debug, Default, Clone)]
struct AuthState {
    headers: HeaderMap,
    /// Legacy servers only: appended to export URLs.
    access_key: Option<String>,
}

/// Authenticated Protect client.
///
/// Session cookies live in the `reqwest` cookie store; explicit tokens are
/// kept behind a lock so a fetch can re-login after the session expires.
pub struct ProtectClient {
    http: Client,
    config: ClientConfig,
    base_url: String,
    auth: RwLock<AuthState>,
}

impl std::fmt::Debug for ProtectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectClient")
            .field("base_url", &self.base_url)
            .field("not_unifi_os", &self.config.not_unifi_os)
            .finish_non_exhaustive()
    }
}

impl ProtectClient {
    /// Build the HTTP client and log in.
    pub async fn connect(config: ClientConfig) -> Result<Self, ProtectError> {
        let http = Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .timeout(config.timeout)
            .build()?;
        let client = Self {
            http,
            base_url: base_url(&config.address, config.port),
            config,
            auth: RwLock::new(AuthState::default()),
        };
        client.login().await?;
        Ok(client)
    }

    /// `https://address:port`, for log messages.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_root(&self) -> String {
        api_root(&self.base_url, self.config.not_unifi_os)
    }

    /// Log in again, replacing the stored credentials.
    pub async fn relogin(&self) -> Result<(), ProtectError> {
        tracing::info!("Re-authenticating with {}", self.base_url);
        self.login().await
    }

    async fn login(&self) -> Result<(), ProtectError> {
        let state = if self.config.not_unifi_os {
            self.login_legacy().await?
        } else {
            self.login_unifi_os().await?
        };
        *self.auth.write().await = state;
        tracing::debug!("Logged in to {}", self.base_url);
        Ok(())
    }

    async fn login_unifi_os(&self) -> Result<AuthState, ProtectError> {
        let response = self
            .http
            .post(format!("{}/api/auth/login", self.base_url))
            .json(&json!({
                "username": self.config.username,
                "password": self.config.password,
                "remember": false,
            }))
            .send()
            .await?;
        let response = self.check_login(response)?;

        let mut headers = HeaderMap::new();
        if let Some(csrf) = response.headers().get(CSRF_HEADER) {
            headers.insert(CSRF_HEADER, csrf.clone());
        }
        Ok(AuthState {
            headers,
            access_key: None,
        })
    }

    async fn login_legacy(&self) -> Result<AuthState, ProtectError> {
        let response = self
            .http
            .post(format!("{}/api/auth", self.base_url))
            .json(&json!({
                "username": self.config.username,
                "password": self.config.password,
            }))
            .send()
            .await?;
        let response = self.check_login(response)?;

        let token = response
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ProtectError::MissingToken(self.base_url.clone()))?;
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))?,
        );

        let endpoint = format!("{}/api/auth/access-key", self.base_url);
        let response = self
            .http
            .post(&endpoint)
            .headers(headers.clone())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProtectError::Status {
                status: response.status().as_u16(),
                endpoint,
            });
        }
        let key: AccessKeyResponse = response.json().await?;

        Ok(AuthState {
            headers,
            access_key: Some(key.access_key),
        })
    }

    fn check_login(&self, response: Response) -> Result<Response, ProtectError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ProtectError::Login {
                address: self.base_url.clone(),
                status: response.status().as_u16(),
            })
        }
    }

    /// Snapshot of the cameras known to the server.
    pub async fn cameras(&self) -> Result<Vec<Camera>, ProtectError> {
        let endpoint = format!("{}/bootstrap", self.api_root());
        let headers = self.auth.read().await.headers.clone();
        let response = self.http.get(&endpoint).headers(headers).send().await?;
        if !response.status().is_success() {
            return Err(ProtectError::Status {
                status: response.status().as_u16(),
                endpoint,
            });
        }
        let body = response.text().await?;
        let bootstrap: Bootstrap = serde_json::from_str(&body)?;
        Ok(bootstrap.into_cameras())
    }

    /// Start a footage export for `camera` covering `[start, end)`.
    ///
    /// Status checking is left to the caller so it can classify failures.
    pub async fn export(
        &self,
        camera: &Camera,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Response, reqwest::Error> {
        let auth = self.auth.read().await.clone();
        export_request(
            &self.http,
            &self.api_root(),
            &camera.id,
            start,
            end,
            auth.access_key.as_deref(),
        )
        .headers(auth.headers)
        .send()
        .await
    }
}

fn base_url(address: &str, port: u16) -> String {
    format!("https://{}:{}", address, port)
}

fn api_root(base_url: &str, not_unifi_os: bool) -> String {
    if not_unifi_os {
        format!("{}/api", base_url)
    } else {
        format!("{}/proxy/protect/api", base_url)
    }
}

/// `GET <api>/video/export` with millisecond bounds; legacy servers also
/// need the download access key.
fn export_request(
    http: &Client,
    api_root: &str,
    camera_id: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
    access_key: Option<&str>,
) -> RequestBuilder {
    let mut query = vec![
        ("camera", camera_id.to_string()),
        ("start", millis_from_local(start).to_string()),
        ("end", millis_from_local(end).to_string()),
    ];
    if let Some(key) = access_key {
        query.push(("accessKey", key.to_string()));
    }
    http.get(format!("{}/video/export", api_root)).query(&query)
}
