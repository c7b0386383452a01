use super::{CalculateRequest, MathResult, ToolSpec};
use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Deserialize)]
struct ToolList {
    tools: Vec<ToolSpec>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Client for the math microservice
#[derive(Clone)]
pub struct MathClient {
    base_url: String,
    http: reqwest::Client,
}

impl MathClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Health status string reported by the service
    pub async fn health(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct Health {
            status: String,
        }
        let health: Health = self.get("health").await?;
        Ok(health.status)
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolSpec>> {
        let list: ToolList = self.get("mcp/tools").await?;
        Ok(list.tools)
    }

    /// Run a calculation; a rejected request surfaces the service's message
    pub async fn calculate(&self, request: &CalculateRequest) -> Result<MathResult> {
        let url = format!("{}/calculate", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to reach math service at {}", self.base_url))?;
        Self::decode(response).await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach math service at {}", self.base_url))?;
        Self::decode(response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read math service response")?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or(text);
            bail!("Math service returned {}: {}", status, message);
        }

        serde_json::from_str(&text).context("Failed to parse math service response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        assert_eq!(
            MathClient::new("http://localhost:8080/").base_url(),
            "http://localhost:8080"
        );
    }

    #[tokio::test]
    async fn unreachable_service_is_an_error() {
        let client = MathClient::new("http://127.0.0.1:1");
        let err = client.health().await.unwrap_err();
        assert!(err.to_string().contains("Failed to reach math service"));
    }
}
