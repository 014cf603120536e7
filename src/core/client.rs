//! HTTP adapter for the rewards service.
//!
//! Three calls, each a single attempt with no retry: profile read, earnings
//! read, and the widget connectivity ping. Every request carries the bearer
//! token plus a browser-like header set; the service runs an anti-bot
//! challenge and rejects requests that don't look like they came from its
//! web widget.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, ORIGIN, REFERER, USER_AGENT,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ApiConfig;
use crate::core::error::{ConfigError, RequestError, Result};
use crate::core::proxy::{Proxy, ProxyKind};
use crate::core::registry::mask_token;

// =============================================================================
// Endpoints
// =============================================================================

// Paths under `api.base_url`. The base URL default is a placeholder; see
// `ApiConfig`.
pub const PROFILE_PATH: &str = "/user/profile";
pub const STATS_PATH: &str = "/user/earnings";
pub const PING_PATH: &str = "/widget/connect";

/// Shown when the profile payload lacks a field.
pub const PROFILE_PLACEHOLDER: &str = "N/A";

/// Longest error body kept in a [`RequestError::Status`]. Challenge pages are
/// full HTML documents.
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub profile: String,
    pub stats: String,
    pub ping: String,
}

impl Endpoints {
    pub fn from_base(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            profile: format!("{base}{PROFILE_PATH}"),
            stats: format!("{base}{STATS_PATH}"),
            ping: format!("{base}{PING_PATH}"),
        }
    }
}

// =============================================================================
// Payloads
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stats {
    pub points_today: f64,
    pub total_points: f64,
}

#[derive(Debug, Serialize)]
struct PingRequest {
    connected: bool,
}

/// The service wraps results in `{"data": {...}}`; fall back to the root
/// object when the wrapper is absent.
fn payload(body: &Value) -> &Value {
    match body.get("data") {
        Some(data) if data.is_object() => data,
        _ => body,
    }
}

fn string_field(body: &Value, key: &str) -> String {
    match body.get(key) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => PROFILE_PLACEHOLDER.to_string(),
    }
}

/// Numeric field that may also arrive as a numeric string. Absent or
/// unparseable values read as zero.
fn number_field(body: &Value, key: &str) -> f64 {
    match body.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

pub fn parse_profile(body: &Value) -> Profile {
    let data = payload(body);
    Profile {
        username: string_field(data, "username"),
        email: string_field(data, "email"),
    }
}

pub fn parse_stats(body: &Value) -> Stats {
    let data = payload(body);
    Stats {
        points_today: number_field(data, "total_points_today"),
        total_points: number_field(data, "total_points_balance"),
    }
}

// =============================================================================
// Trait
// =============================================================================

/// Operations the refresh cycle needs from the remote service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RewardsApi: Send + Sync {
    /// Read username and email for the token's account.
    async fn fetch_profile(&self, token: &str, proxy: Option<Proxy>) -> Result<Profile>;

    /// Report the widget as connected. Any success status counts.
    async fn ping(&self, token: &str, proxy: Option<Proxy>) -> Result<()>;

    /// Read today's and lifetime points.
    async fn fetch_stats(&self, token: &str, proxy: Option<Proxy>) -> Result<Stats>;
}

// =============================================================================
// reqwest implementation
// =============================================================================

/// [`RewardsApi`] over reqwest. One underlying client is kept per distinct
/// proxy (plus one for direct connections) so connection pools are reused
/// across cycles.
pub struct RewardsClient {
    endpoints: Endpoints,
    headers: HeaderMap,
    clients: Mutex<HashMap<Option<String>, Client>>,
}

impl RewardsClient {
    pub fn new(config: &ApiConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            endpoints: Endpoints::from_base(&config.base_url),
            headers: build_browser_headers(config)?,
            clients: Mutex::new(HashMap::new()),
        })
    }

    /// Client routed through `proxy`, or direct. Fails before any network
    /// activity when the proxy's scheme is unsupported.
    fn client_for(&self, proxy: Option<&Proxy>) -> std::result::Result<Client, ConfigError> {
        let key = proxy.map(Proxy::url);
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = Client::builder().default_headers(self.headers.clone());
        if let Some(proxy) = proxy {
            builder = builder.proxy(to_reqwest_proxy(proxy)?);
        }
        let client = builder.build().map_err(ConfigError::ClientBuild)?;

        debug!(
            route = %proxy.map(Proxy::endpoint).unwrap_or_else(|| "direct".to_string()),
            "Built HTTP client"
        );
        clients.insert(key, client.clone());
        Ok(client)
    }

    async fn send(request: RequestBuilder) -> std::result::Result<Response, RequestError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RequestError::status(status.as_u16(), truncate(&body)));
        }
        Ok(response)
    }

    async fn send_json(request: RequestBuilder) -> std::result::Result<Value, RequestError> {
        let response = Self::send(request).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| RequestError::Payload(e.to_string()))
    }
}

#[async_trait]
impl RewardsApi for RewardsClient {
    async fn fetch_profile(&self, token: &str, proxy: Option<Proxy>) -> Result<Profile> {
        let client = self.client_for(proxy.as_ref())?;
        debug!(token = %mask_token(token, 8), "Fetching profile");
        let body = Self::send_json(client.get(&self.endpoints.profile).bearer_auth(token)).await?;
        Ok(parse_profile(&body))
    }

    async fn ping(&self, token: &str, proxy: Option<Proxy>) -> Result<()> {
        let client = self.client_for(proxy.as_ref())?;
        debug!(token = %mask_token(token, 8), "Sending connectivity ping");
        Self::send(
            client
                .post(&self.endpoints.ping)
                .bearer_auth(token)
                .json(&PingRequest { connected: true }),
        )
        .await?;
        Ok(())
    }

    async fn fetch_stats(&self, token: &str, proxy: Option<Proxy>) -> Result<Stats> {
        let client = self.client_for(proxy.as_ref())?;
        debug!(token = %mask_token(token, 8), "Fetching earnings");
        let body = Self::send_json(client.get(&self.endpoints.stats).bearer_auth(token)).await?;
        Ok(parse_stats(&body))
    }
}

/// Map a descriptor onto a reqwest proxy of the matching tunnel type.
fn to_reqwest_proxy(proxy: &Proxy) -> std::result::Result<reqwest::Proxy, ConfigError> {
    let kind = proxy.kind()?;
    let mut tunnel = reqwest::Proxy::all(proxy.endpoint()).map_err(ConfigError::ClientBuild)?;
    // SOCKS4 has no password authentication.
    if let (Some(auth), false) = (&proxy.auth, kind == ProxyKind::Socks4) {
        tunnel = tunnel.basic_auth(&auth.username, &auth.password);
    }
    Ok(tunnel)
}

fn build_browser_headers(config: &ApiConfig) -> std::result::Result<HeaderMap, ConfigError> {
    let value = |v: &str| {
        HeaderValue::from_str(v).map_err(|e| ConfigError::InvalidHeader(format!("{v:?}: {e}")))
    };

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, value(&config.user_agent)?);
    headers.insert(REFERER, value(&config.referer)?);
    headers.insert(ORIGIN, value(&config.origin)?);
    headers.insert(ACCEPT_LANGUAGE, value(&config.accept_language)?);
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    Ok(headers)
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
