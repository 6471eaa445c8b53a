//! Authorization-code flows for connecting Notion and Google Tasks

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tasksync_core::adapters::parse_api_error;
use tasksync_core::models::{GoogleCredentials, NotionCredentials};
use tasksync_core::Service;
use url::Url;

use crate::config::{AppConfig, OAuthClientConfig};
use crate::error::AppError;

const GOOGLE_TASKS_SCOPE: &str = "https://www.googleapis.com/auth/tasks";

#[derive(Debug, Deserialize)]
struct NotionTokenResponse {
    access_token: String,
    workspace_id: Option<String>,
    workspace_name: Option<String>,
    bot_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Builds authorization URLs and redeems callback codes
#[derive(Clone)]
pub struct OAuthClient {
    client: reqwest::Client,
    config: Arc<AppConfig>,
}

impl OAuthClient {
    pub fn new(config: Arc<AppConfig>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.adapter.http_timeout)
            .build()
            .map_err(|error| AppError::internal(format!("HTTP client setup failed: {error}")))?;
        Ok(Self { client, config })
    }

    pub fn redirect_uri(&self, service: Service) -> String {
        format!(
            "{}/oauth/{}/callback",
            self.config.public_base_url,
            service.as_str()
        )
    }

    /// URL the user visits to grant access; `state` comes back on the callback
    pub fn authorization_url(&self, service: Service, state: &str) -> Result<String, AppError> {
        let redirect_uri = self.redirect_uri(service);
        let url = match service {
            Service::Notion => Url::parse_with_params(
                &self.config.notion_oauth.authorization_url,
                &[
                    ("client_id", self.config.notion_oauth.client_id.as_str()),
                    ("response_type", "code"),
                    ("owner", "user"),
                    ("redirect_uri", redirect_uri.as_str()),
                    ("state", state),
                ],
            ),
            Service::GoogleTasks => Url::parse_with_params(
                &self.config.google_oauth.authorization_url,
                &[
                    ("client_id", self.config.google_oauth.client_id.as_str()),
                    ("response_type", "code"),
                    ("redirect_uri", redirect_uri.as_str()),
                    ("scope", GOOGLE_TASKS_SCOPE),
                    ("access_type", "offline"),
                    ("include_granted_scopes", "true"),
                    ("prompt", "consent"),
                    ("state", state),
                ],
            ),
        }
        .map_err(|error| AppError::Config(format!("Invalid authorization URL: {error}")))?;
        Ok(url.into())
    }

    pub async fn exchange_notion(&self, code: &str) -> Result<NotionCredentials, AppError> {
        let oauth = &self.config.notion_oauth;
        let redirect_uri = self.redirect_uri(Service::Notion);
        let response = self
            .client
            .post(&oauth.token_url)
            .basic_auth(&oauth.client_id, Some(&oauth.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|error| AppError::external(format!("Notion token request failed: {error}")))?;

        let token: NotionTokenResponse = read_token_response(Service::Notion, response).await?;
        Ok(NotionCredentials {
            access_token: token.access_token,
            workspace_id: token.workspace_id,
            workspace_name: token.workspace_name,
            bot_id: token.bot_id,
        })
    }

    pub async fn exchange_google(&self, code: &str) -> Result<GoogleCredentials, AppError> {
        let oauth: &OAuthClientConfig = &self.config.google_oauth;
        let redirect_uri = self.redirect_uri(Service::GoogleTasks);
        let response = self
            .client
            .post(&oauth.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri.as_str()),
                ("client_id", oauth.client_id.as_str()),
                ("client_secret", oauth.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|error| AppError::external(format!("Google token request failed: {error}")))?;

        let token: GoogleTokenResponse =
            read_token_response(Service::GoogleTasks, response).await?;
        Ok(GoogleCredentials {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            token_uri: oauth.token_url.clone(),
            client_id: oauth.client_id.clone(),
            client_secret: oauth.client_secret.clone(),
            expires_at: token
                .expires_in
                .map(|seconds| Utc::now().timestamp() + seconds),
        })
    }
}

async fn read_token_response<T: serde::de::DeserializeOwned>(
    service: Service,
    response: reqwest::Response,
) -> Result<T, AppError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|error| AppError::external(format!("{service} token response unreadable: {error}")))?;
    if !status.is_success() {
        return Err(AppError::external(format!(
            "{service} token exchange failed: {}",
            parse_api_error(status, &body)
        )));
    }
    serde_json::from_str(&body).map_err(|error| {
        AppError::external(format!("{service} token response is malformed: {error}"))
    })
}
