//! HTTP client for the remote inference platform.
//!
//! Every response is decoded into an explicit type at this boundary; callers
//! never probe loosely-shaped JSON.

pub mod catalog;
pub mod chat;
pub mod types;
pub mod vector_stores;

pub use chat::{DeltaStream, SseDecoder, SseEvent};
pub use types::{
    ChatChoice, ChatCompletion, ChatMessage, ChatRequest, HealthInfo, ModelInfo, ModelType,
    ProviderInfo, Role,
};

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("cannot reach {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed stream event: {0}")]
    Stream(String),
}

impl ClientError {
    /// Whether the remote service could not be reached at all
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ClientError::Connect { .. })
    }

    /// Whether the service answered 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ClientError::Connect {
                url: url.to_string(),
                reason: err.to_string(),
            }
        } else {
            ClientError::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

/// Classify an error chain as a connectivity failure
pub fn is_connectivity_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<ClientError>()
            .is_some_and(ClientError::is_connectivity)
    })
}

#[derive(serde::Deserialize)]
pub(crate) struct ListResponse<T> {
    pub data: Vec<T>,
}

/// Client for a remote inference platform server
#[derive(Clone)]
pub struct StackClient {
    base_url: String,
    http: reqwest::Client,
}

impl StackClient {
    /// Create a client for the given base URL
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Create a client for `http://{host}:{port}`
    pub fn from_host(host: &str, port: u16) -> Self {
        Self::new(&format!("http://{}:{}", host, port))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Shared HTTP client, reused for document downloads
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Health check
    pub async fn health(&self) -> Result<HealthInfo, ClientError> {
        self.get_json("health").await
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(url, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                url: url.to_string(),
                status,
                body,
            });
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, ClientError> {
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::from_reqwest(url, e))?;
        serde_json::from_str(&text).map_err(|source| ClientError::Decode {
            url: url.to_string(),
            source,
        })
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        tracing::debug!(%url, "GET");
        let response = self.send(self.http.get(&url), &url).await?;
        Self::decode(response, &url).await
    }

    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        tracing::debug!(%url, "POST");
        let response = self.send(self.http.post(&url).json(body), &url).await?;
        Self::decode(response, &url).await
    }

    pub(crate) async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T, ClientError> {
        let url = self.url(path);
        tracing::debug!(%url, "POST multipart");
        let response = self.send(self.http.post(&url).multipart(form), &url).await?;
        Self::decode(response, &url).await
    }

    pub(crate) async fn post_raw<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, ClientError> {
        let url = self.url(path);
        tracing::debug!(%url, "POST (streaming)");
        self.send(self.http.post(&url).json(body), &url).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), ClientError> {
        let url = self.url(path);
        tracing::debug!(%url, "DELETE");
        self.send(self.http.delete(&url), &url).await?;
        Ok(())
    }
}
