//! HTTP client for the shoplist item server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use shoplist_core::{ItemId, RemoteError, RemoteItem, RemoteService};

/// Health check response
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error body returned by the server
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[allow(dead_code)]
    error: String,
    message: String,
}

/// [`RemoteService`] over the server's REST API.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemote {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn item_url(&self, id: &ItemId) -> String {
        self.url(&format!("/items/{}", id))
    }

    /// Checks that the server is up.
    pub async fn health(&self) -> Result<HealthResponse, RemoteError> {
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(send_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response, None).await);
        }
        response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

fn send_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout
    } else if e.is_connect() {
        RemoteError::Unavailable(e.to_string())
    } else {
        RemoteError::Transport(e.to_string())
    }
}

async fn error_from_response(response: reqwest::Response, id: Option<&ItemId>) -> RemoteError {
    let status = response.status();
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };

    match (status, id) {
        (StatusCode::NOT_FOUND, Some(id)) => RemoteError::NotFound(id.clone()),
        (StatusCode::SERVICE_UNAVAILABLE, _) => RemoteError::Unavailable(message),
        _ => RemoteError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    id: Option<&ItemId>,
) -> Result<T, RemoteError> {
    if !response.status().is_success() {
        return Err(error_from_response(response, id).await);
    }
    response
        .json()
        .await
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn list(&self) -> Result<Vec<RemoteItem>, RemoteError> {
        let response = self
            .client
            .get(self.url("/items"))
            .send()
            .await
            .map_err(send_error)?;
        decode(response, None).await
    }

    async fn add(&self, item: &RemoteItem) -> Result<RemoteItem, RemoteError> {
        let response = self
            .client
            .post(self.url("/items"))
            .json(item)
            .send()
            .await
            .map_err(send_error)?;
        decode(response, Some(&item.id)).await
    }

    async fn update(&self, id: &ItemId, item: &RemoteItem) -> Result<RemoteItem, RemoteError> {
        let response = self
            .client
            .put(self.item_url(id))
            .json(item)
            .send()
            .await
            .map_err(send_error)?;
        decode(response, Some(id)).await
    }

    async fn delete(&self, id: &ItemId) -> Result<(), RemoteError> {
        let response = self
            .client
            .delete(self.item_url(id))
            .send()
            .await
            .map_err(send_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response, Some(id)).await)
        }
    }
}
