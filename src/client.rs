//! HTTP client for a running Studio server.
//!
//! Used by the CLI's `status` and `build --remote` commands. Configuration is
//! via environment variables:
//! - `STUDIO_URL` - Base URL (default: `http://127.0.0.1:3000/api/v1`)
//! - `STUDIO_API_KEY` - API key, when the server requires one
//! - `STUDIO_USER` - User to act as; honoured only by servers that trust
//!   identity headers

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::{BuildOutcome, BuildStatus};

const DEFAULT_URL: &str = "http://127.0.0.1:3000/api/v1";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: API key required or invalid")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Server error: {0}")]
    Server(String),
}

#[derive(Debug, Clone)]
pub struct StudioClient {
    base_url: String,
    api_key: Option<String>,
    user: Option<String>,
    client: Client,
}

impl StudioClient {
    pub fn from_env() -> Self {
        let base_url = std::env::var("STUDIO_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        let api_key = std::env::var("STUDIO_API_KEY").ok();
        let client = Self::new(base_url, api_key);
        match std::env::var("STUDIO_USER") {
            Ok(user) if !user.trim().is_empty() => client.as_user(user),
            _ => client,
        }
    }

    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            user: None,
            client: Client::new(),
        }
    }

    /// Acts as `user` on the server instead of its default principal.
    pub fn as_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        if let Some(ref user) = self.user {
            req = req.header("X-Studio-User", user);
        }
        req
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(body)),
            StatusCode::BAD_REQUEST => Err(ClientError::BadRequest(body)),
            StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
            StatusCode::FORBIDDEN => Err(ClientError::Forbidden(body)),
            _ => Err(ClientError::Server(format!("{}: {}", status, body))),
        }
    }

    pub async fn health(&self) -> Result<serde_json::Value, ClientError> {
        let response = self.request(reqwest::Method::GET, "/health").send().await?;
        self.handle_response(response).await
    }

    pub async fn build_status(&self, app_name: &str) -> Result<BuildStatus, ClientError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/apps/{}/build-status", app_name))
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn trigger_build(&self, app_name: &str) -> Result<BuildOutcome, ClientError> {
        let response = self
            .request(reqwest::Method::POST, &format!("/apps/{}/build", app_name))
            .send()
            .await?;
        self.handle_response(response).await
    }
}
