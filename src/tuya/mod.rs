pub mod models;

use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;

use self::models::{
    Command, DeviceProperty, DeviceStatusResponse, SendCommandRequest, SendCommandResponse,
    TokenResponse, TokenResult,
};

type HmacSha256 = Hmac<Sha256>;

/// Failure modes of the Tuya Cloud API, split so callers can tell an
/// unreachable cloud from a reachable one that rejected the call.
#[derive(Debug, Error)]
pub enum TuyaError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Tuya API error: code={code}, msg={msg}")]
    Device { code: i32, msg: String },

    #[error("malformed Tuya response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Tuya response: success=true but result field is missing")]
    MissingResult,

    #[error("invalid request header: {0}")]
    Header(String),
}

#[derive(Debug, Clone)]
pub struct TuyaClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    /// Unix timestamp (seconds) when this token expires
    expires_at: i64,
}

impl TuyaClient {
    pub fn new(config: &Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                http: Client::new(),
                base_url: config.tuya_base_url.clone(),
                client_id: config.tuya_client_id.clone(),
                client_secret: config.tuya_client_secret.clone(),
                token: Mutex::new(None),
            }),
        }
    }

    /// Returns a valid access token, refreshing it if necessary.
    async fn access_token(&self) -> Result<String, TuyaError> {
        let mut guard = self.inner.token.lock().await;
        let now = chrono::Utc::now().timestamp();

        if let Some(ref cached) = *guard {
            // Refresh 60 s before expiry
            if cached.expires_at > now + 60 {
                return Ok(cached.access_token.clone());
            }
        }

        info!("Fetching new Tuya access token");
        let token = self.fetch_token().await?;
        let expires_at = now + token.expire_time;
        let access_token = token.access_token.clone();

        *guard = Some(CachedToken {
            access_token: token.access_token,
            expires_at,
        });

        Ok(access_token)
    }

    async fn fetch_token(&self) -> Result<TokenResult, TuyaError> {
        let path = "/v1.0/token?grant_type=1";
        let url = format!("{}{}", self.inner.base_url, path);
        debug!(url = %url, "Requesting Tuya token");

        let headers = build_signed_headers(
            "GET",
            path,
            &[],
            &self.inner.client_id,
            &self.inner.client_secret,
            None,
        );

        let bytes = self
            .inner
            .http
            .get(&url)
            .headers(to_header_map(headers)?)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        serde_json::from_slice::<TokenResponse>(&bytes)?.into_result()
    }

    /// Fetch all data-point (DP) properties for a device.
    ///
    /// No retries: a failed poll is the caller's problem — the collector
    /// records it and the next tick is the next attempt.
    pub async fn get_device_status(
        &self,
        device_id: &str,
    ) -> Result<Vec<DeviceProperty>, TuyaError> {
        let token = self.access_token().await?;
        let path = format!("/v1.0/devices/{}/status", device_id);
        let url = format!("{}{}", self.inner.base_url, path);
        debug!(device_id = %device_id, url = %url, "Fetching device status");

        let headers = build_signed_headers(
            "GET",
            &path,
            &[],
            &self.inner.client_id,
            &self.inner.client_secret,
            Some(&token),
        );

        let bytes = self
            .inner
            .http
            .get(&url)
            .headers(to_header_map(headers)?)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        serde_json::from_slice::<DeviceStatusResponse>(&bytes)?.into_result()
    }

    /// Send one or more commands to a device.
    pub async fn send_commands(
        &self,
        device_id: &str,
        commands: Vec<Command>,
    ) -> Result<bool, TuyaError> {
        let token = self.access_token().await?;
        let path = format!("/v1.0/devices/{}/commands", device_id);
        let url = format!("{}{}", self.inner.base_url, path);
        debug!(device_id = %device_id, "Sending commands to device");

        let body = SendCommandRequest { commands };
        let body_bytes = serde_json::to_vec(&body)?;

        let headers = build_signed_headers(
            "POST",
            &path,
            &body_bytes,
            &self.inner.client_id,
            &self.inner.client_secret,
            Some(&token),
        );

        let bytes = self
            .inner
            .http
            .post(&url)
            .headers(to_header_map(headers)?)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        serde_json::from_slice::<SendCommandResponse>(&bytes)?.into_result()
    }
}

// ---------------------------------------------------------------------------
// Signing helpers
// ---------------------------------------------------------------------------

/// Deterministic signing inputs used by tests.
#[derive(Debug)]
pub(crate) struct SigningContext<'a> {
    pub method: &'a str,
    pub path_and_query: &'a str,
    pub body_bytes: &'a [u8],
    pub access_token: Option<&'a str>,
    /// 13-digit Unix timestamp in milliseconds
    pub t: &'a str,
    pub nonce: &'a str,
}

/// Build the Tuya-required signed request headers.
///
/// - `access_token`: `None` for token-fetch calls; `Some(token)` for all others.
/// - `body_bytes`: raw request body (empty slice for GET requests).
///
/// Tuya signing specification:
/// <https://developer.tuya.com/en/docs/iot/singnature?id=Ka43a5mtx1gsc>
pub(crate) fn build_signed_headers(
    method: &str,
    path_and_query: &str,
    body_bytes: &[u8],
    client_id: &str,
    secret: &str,
    access_token: Option<&str>,
) -> HashMap<String, String> {
    let t = chrono::Utc::now().timestamp_millis().to_string();
    let nonce = Uuid::new_v4().to_string();
    let ctx = SigningContext {
        method,
        path_and_query,
        body_bytes,
        access_token,
        t: &t,
        nonce: &nonce,
    };
    build_signed_headers_inner(client_id, secret, &ctx)
}

/// Inner implementation that accepts an explicit `SigningContext` so that
/// unit tests can inject deterministic timestamp and nonce values.
pub(crate) fn build_signed_headers_inner(
    client_id: &str,
    secret: &str,
    ctx: &SigningContext<'_>,
) -> HashMap<String, String> {
    let SigningContext { method, path_and_query, body_bytes, access_token, t, nonce } = ctx;
    // 1. SHA-256 of the request body (empty body → well-known hash).
    let content_sha256 = {
        let mut hasher = Sha256::new();
        hasher.update(body_bytes);
        hex::encode(hasher.finalize())
    };

    // 2. Build stringToSign.
    //    Format: HTTPMethod\nContent-SHA256\nHeaders\nUrl
    //    We send no custom Signature-Headers, so the Headers segment is empty.
    let string_to_sign = format!("{}\n{}\n\n{}", method, content_sha256, path_and_query);

    // 3. Build the string to HMAC.
    //    Token calls:   client_id + t + nonce + stringToSign
    //    Other calls:   client_id + access_token + t + nonce + stringToSign
    let str_to_hmac = match access_token {
        None => format!("{}{}{}{}", client_id, t, nonce, string_to_sign),
        Some(token) => format!("{}{}{}{}{}", client_id, token, t, nonce, string_to_sign),
    };

    // 4. HMAC-SHA256, uppercase hex.
    let sign = {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
        mac.update(str_to_hmac.as_bytes());
        hex::encode(mac.finalize().into_bytes()).to_uppercase()
    };

    // 5. Assemble headers.
    let mut headers = HashMap::new();
    headers.insert("client_id".to_owned(), client_id.to_owned());
    headers.insert("t".to_owned(), t.to_string());
    headers.insert("nonce".to_owned(), nonce.to_string());
    headers.insert("sign_method".to_owned(), "HMAC-SHA256".to_owned());
    headers.insert("sign".to_owned(), sign);
    if let Some(token) = access_token {
        headers.insert("access_token".to_owned(), token.to_string());
    }

    headers
}

/// Convert our string `HashMap` into a `reqwest::header::HeaderMap`.
fn to_header_map(map: HashMap<String, String>) -> Result<reqwest::header::HeaderMap, TuyaError> {
    let mut header_map = reqwest::header::HeaderMap::new();
    for (k, v) in map {
        let name = reqwest::header::HeaderName::from_bytes(k.as_bytes())
            .map_err(|e| TuyaError::Header(format!("invalid header name {k}: {e}")))?;
        let value = reqwest::header::HeaderValue::from_str(&v)
            .map_err(|e| TuyaError::Header(format!("invalid header value for {k}: {e}")))?;
        header_map.insert(name, value);
    }
    Ok(header_map)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
