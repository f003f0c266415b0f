//! OAuth2 client-side helpers.
//!
//! 1. Build the consent URL and a CSRF `state`
//! 2. Receive the callback on a loopback listener
//! 3. Exchange the code for tokens, refresh them later, revoke on disconnect
//!
//! Tokens are issued by the identity provider; nothing here mints them.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::keyring_store;
use crate::error::OAuthError;
use crate::storage::Config;

const CLIENT_ID_ENV: &str = "TASKSYNC_CLIENT_ID";
const CLIENT_SECRET_ENV: &str = "TASKSYNC_CLIENT_SECRET";
pub const CLIENT_ID_KEY: &str = "oauth_client_id";
pub const CLIENT_SECRET_KEY: &str = "oauth_client_secret";

/// OAuth client settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub revoke_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
    pub redirect_port: u16,
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

/// Tokens obtained from the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

impl TokenSet {
    fn from_response(resp: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            expires_at: resp
                .expires_in
                .map(|secs| now + chrono::Duration::seconds(secs)),
            scopes: resp
                .scope
                .map(|s| s.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
        }
    }
}

fn resolve_secret(configured: Option<&str>, env_key: &str, keyring_key: &str) -> Option<String> {
    configured
        .map(str::to_string)
        .filter(|v| !v.trim().is_empty())
        .or_else(|| std::env::var(env_key).ok().filter(|v| !v.trim().is_empty()))
        .or_else(|| keyring_store::get(keyring_key).ok().flatten())
}

impl OAuthConfig {
    /// Resolve client credentials (config file, then environment, then OS
    /// keyring) and endpoints from `config`.
    pub fn from_config(config: &Config) -> Result<Self, OAuthError> {
        let missing = || OAuthError::CredentialsNotConfigured {
            service: config.oauth.auth_url.clone(),
        };
        let client_id =
            resolve_secret(config.oauth.client_id.as_deref(), CLIENT_ID_ENV, CLIENT_ID_KEY)
                .ok_or_else(missing)?;
        let client_secret = resolve_secret(
            config.oauth.client_secret.as_deref(),
            CLIENT_SECRET_ENV,
            CLIENT_SECRET_KEY,
        )
        .ok_or_else(missing)?;

        Ok(Self {
            client_id,
            client_secret,
            auth_url: config.oauth.auth_url.clone(),
            token_url: config.oauth.token_url.clone(),
            revoke_url: config.oauth.revoke_url.clone(),
            userinfo_url: config.oauth.userinfo_url.clone(),
            scopes: config.oauth.scopes.clone(),
            redirect_port: config.oauth.redirect_port,
        })
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.redirect_port)
    }

    /// Consent URL requesting offline access, so a refresh token is issued.
    pub fn authorization_url(&self, state: &str) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri()),
            urlencoding::encode(&scopes),
            urlencoding::encode(state),
        )
    }
}

/// Generate a random URL-safe state parameter for CSRF protection.
pub fn generate_state() -> Result<String, OAuthError> {
    use base64::prelude::*;
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| OAuthError::AuthorizationFailed(format!("failed to generate state: {e}")))?;
    Ok(BASE64_URL_SAFE_NO_PAD.encode(bytes))
}

async fn token_request(
    http: &Client,
    config: &OAuthConfig,
    params: &[(&str, &str)],
) -> Result<TokenResponse, String> {
    let resp = http
        .post(&config.token_url)
        .form(params)
        .send()
        .await
        .map_err(|e| format!("HTTP request failed: {e}"))?;

    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| format!("Failed to read response: {e}"))?;

    if !status.is_success() {
        return Err(format!("{status} - {body}"));
    }

    serde_json::from_str(&body).map_err(|e| format!("Failed to parse token response: {e}"))
}

/// Exchange an authorization code (from the callback) for tokens.
pub async fn exchange_code(
    http: &Client,
    config: &OAuthConfig,
    code: &str,
) -> Result<TokenSet, OAuthError> {
    let redirect_uri = config.redirect_uri();
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("code", code),
        ("grant_type", "authorization_code"),
        ("redirect_uri", redirect_uri.as_str()),
    ];
    let resp = token_request(http, config, &params)
        .await
        .map_err(OAuthError::TokenExchangeFailed)?;
    Ok(TokenSet::from_response(resp, Utc::now()))
}

/// Use a refresh token to obtain a new access token.
///
/// Providers usually omit `refresh_token` on refresh; the old one is kept.
/// A rejection from the provider is [`OAuthError::TokenRefreshFailed`]; a
/// 5xx or 429 is [`OAuthError::ProviderUnavailable`]; a transport failure
/// is [`OAuthError::Http`].
pub async fn refresh(
    http: &Client,
    config: &OAuthConfig,
    refresh_token: &str,
) -> Result<TokenSet, OAuthError> {
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];
    let resp = http.post(&config.token_url).form(&params).send().await?;
    let status = resp.status();
    let body = resp.text().await?;
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(OAuthError::ProviderUnavailable(format!("{status} - {body}")));
    }
    if !status.is_success() {
        return Err(OAuthError::TokenRefreshFailed(format!("{status} - {body}")));
    }
    let parsed: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| OAuthError::TokenRefreshFailed(format!("Failed to parse response: {e}")))?;

    let mut tokens = TokenSet::from_response(parsed, Utc::now());
    if tokens.refresh_token.is_none() {
        tokens.refresh_token = Some(refresh_token.to_string());
    }
    Ok(tokens)
}

/// Ask the provider to revoke `token`.
pub async fn revoke(http: &Client, config: &OAuthConfig, token: &str) -> Result<(), OAuthError> {
    let resp = http
        .post(&config.revoke_url)
        .form(&[("token", token)])
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(OAuthError::RevokeFailed(format!("{status} - {body}")));
    }
    Ok(())
}

/// Fetch the email address of the account behind `access_token`.
pub async fn fetch_email(
    http: &Client,
    config: &OAuthConfig,
    access_token: &str,
) -> Result<Option<String>, OAuthError> {
    #[derive(Deserialize)]
    struct UserInfo {
        #[serde(default)]
        email: Option<String>,
    }

    let resp = http
        .get(&config.userinfo_url)
        .bearer_auth(access_token)
        .send()
        .await?;
    if !resp.status().is_success() {
        return Ok(None);
    }
    let info: UserInfo = resp.json().await?;
    Ok(info.email)
}

fn send_html_response(stream: &mut TcpStream, status: &str, title: &str, message: &str) {
    let body = format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head><body><h2>{title}</h2><p>{message}</p><p>You can close this tab.</p></body></html>"
    );
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len(),
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

/// Outcome of parsing one request to the loopback listener.
#[derive(Debug, PartialEq)]
enum CallbackRequest {
    Code(String),
    ProviderError(String),
    StateMismatch,
    Ignored,
}

fn parse_callback_request(request: &str, expected_state: &str) -> CallbackRequest {
    let first_line = request.lines().next().unwrap_or_default();
    let mut parts = first_line.split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        return CallbackRequest::Ignored;
    };
    let Ok(url) = url::Url::parse(&format!("http://localhost{target}")) else {
        return CallbackRequest::Ignored;
    };
    if url.path() != "/callback" {
        return CallbackRequest::Ignored;
    }

    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    if let Some(err) = params.get("error") {
        let msg = params.get("error_description").unwrap_or(err);
        return CallbackRequest::ProviderError(msg.clone());
    }
    if params.get("state").map(String::as_str) != Some(expected_state) {
        return CallbackRequest::StateMismatch;
    }
    match params.get("code") {
        Some(code) => CallbackRequest::Code(code.clone()),
        None => CallbackRequest::Ignored,
    }
}

/// Wait on `listener` for the provider's redirect and return the code.
///
/// Blocking; run it off the async runtime.
pub fn wait_for_callback(
    listener: &TcpListener,
    expected_state: &str,
    timeout: Duration,
) -> Result<String, OAuthError> {
    listener.set_nonblocking(true)?;
    let deadline = Instant::now() + timeout;

    loop {
        if Instant::now() >= deadline {
            return Err(OAuthError::CallbackTimeout {
                timeout_secs: timeout.as_secs(),
            });
        }

        match listener.accept() {
            Ok((mut stream, _addr)) => {
                stream.set_nonblocking(false)?;
                let mut buf = [0u8; 8192];
                let size = stream.read(&mut buf)?;
                if size == 0 {
                    continue;
                }
                let request = String::from_utf8_lossy(&buf[..size]);

                match parse_callback_request(&request, expected_state) {
                    CallbackRequest::Code(code) => {
                        send_html_response(
                            &mut stream,
                            "200 OK",
                            "Connected",
                            "Authentication succeeded.",
                        );
                        return Ok(code);
                    }
                    CallbackRequest::ProviderError(msg) => {
                        send_html_response(
                            &mut stream,
                            "400 Bad Request",
                            "Authorization canceled",
                            &msg,
                        );
                        return Err(OAuthError::AuthorizationFailed(msg));
                    }
                    CallbackRequest::StateMismatch => {
                        send_html_response(
                            &mut stream,
                            "400 Bad Request",
                            "OAuth Error",
                            "State mismatch. Please retry.",
                        );
                        return Err(OAuthError::InvalidCallback("state mismatch".into()));
                    }
                    CallbackRequest::Ignored => {
                        send_html_response(
                            &mut stream,
                            "404 Not Found",
                            "Not Found",
                            "Callback endpoint not found.",
                        );
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => return Err(e.into()),
        }
    }
}
