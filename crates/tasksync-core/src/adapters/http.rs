//! Authorized HTTP client shared by both adapters.
//!
//! Every vendor call goes through [`AuthorizedClient::send_json`], which
//! performs at most one token refresh and one retry when the vendor answers
//! 401.

use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::models::{GoogleCredentials, Service};
use crate::util::compact_text;

/// OAuth2 refresh-token grant used to mint new access tokens
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshGrant {
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl RefreshGrant {
    /// Build a grant from stored Google credentials, if they carry a refresh token
    pub fn from_google(credentials: &GoogleCredentials) -> Option<Self> {
        let refresh_token = crate::util::normalize_text_option(credentials.refresh_token.clone())?;
        Some(Self {
            token_uri: credentials.token_uri.clone(),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            refresh_token,
        })
    }
}

impl fmt::Debug for RefreshGrant {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RefreshGrant")
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

/// Bearer-token HTTP client for one vendor account
pub struct AuthorizedClient {
    service: Service,
    client: reqwest::Client,
    access_token: RwLock<String>,
    refresh: Option<RefreshGrant>,
}

impl fmt::Debug for AuthorizedClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthorizedClient")
            .field("service", &self.service)
            .field("access_token", &"[REDACTED]")
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}

impl AuthorizedClient {
    /// Build a client with a per-request timeout and extra default headers
    pub fn new(
        service: Service,
        access_token: impl Into<String>,
        refresh: Option<RefreshGrant>,
        timeout: Duration,
        extra_headers: HeaderMap,
    ) -> Result<Self> {
        let mut headers = extra_headers;
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            service,
            client,
            access_token: RwLock::new(access_token.into()),
            refresh,
        })
    }

    pub const fn service(&self) -> Service {
        self.service
    }

    /// Send a request and decode the JSON response.
    ///
    /// A 401 triggers one refresh and one retry when a refresh grant is
    /// configured. A second 401, or a 401 without a grant, is
    /// `Error::Unauthorized`.
    pub async fn send_json(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let response = self.dispatch(method.clone(), url, query, body).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return self.decode(response).await;
        }

        let Some(grant) = self.refresh.as_ref() else {
            return self.decode(response).await;
        };

        tracing::debug!(service = %self.service, "Access token rejected, refreshing");
        self.refresh_access_token(grant).await?;
        let retried = self.dispatch(method, url, query, body).await?;
        self.decode(retried).await
    }

    async fn dispatch(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let token = self.access_token.read().await.clone();
        let mut request = self.client.request(method, url).bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn decode(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized {
                service: self.service,
                message: parse_api_error(status, &body),
            });
        }
        if !status.is_success() {
            return Err(Error::Api {
                service: self.service,
                status: status.as_u16(),
                message: parse_api_error(status, &body),
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn refresh_access_token(&self, grant: &RefreshGrant) -> Result<()> {
        let response = self
            .client
            .post(&grant.token_uri)
            .form(&[
                ("client_id", grant.client_id.as_str()),
                ("client_secret", grant.client_secret.as_str()),
                ("refresh_token", grant.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(service = %self.service, status = status.as_u16(), "Token refresh failed");
            return Err(Error::Unauthorized {
                service: self.service,
                message: format!("token refresh failed: {}", parse_api_error(status, &body)),
            });
        }

        let payload = response.json::<RefreshResponse>().await?;
        let token = payload.access_token.trim().to_string();
        if token.is_empty() {
            return Err(Error::Unauthorized {
                service: self.service,
                message: "token refresh returned an empty access token".to_string(),
            });
        }

        *self.access_token.write().await = token;
        tracing::info!(service = %self.service, "Refreshed access token");
        Ok(())
    }
}

/// Pull a human-readable message out of a vendor error body.
///
/// Understands Notion (`message`), Google (`error.message`), and OAuth
/// (`error_description` / `error`) shapes.
pub fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<Value>(body) {
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| payload.pointer("/error/message").and_then(Value::as_str))
            .or_else(|| payload.get("error_description").and_then(Value::as_str))
            .or_else(|| payload.get("error").and_then(Value::as_str));
        if let Some(message) = message {
            return format!("{} ({})", compact_text(message), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}
