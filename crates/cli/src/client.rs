//! API client for the telemetry server

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use telemetry_lib::proto::{EdgesRequest, EdgesResponse};
use telemetry_lib::{HealthResponse, ReadinessResponse};
use url::Url;

pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    /// Make a GET request; any non-2xx status is an error
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path)?)
            .send()
            .await
            .context("Failed to send request")?;

        decode(checked(response).await?).await
    }

    /// Make a POST request with a JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(self.url(path)?)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        decode(checked(response).await?).await
    }

    /// Fetch one page of edges
    pub async fn edges(&self, request: &EdgesRequest) -> Result<EdgesResponse> {
        self.post("api/v1/edges", request).await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get("healthz").await
    }

    /// Readiness, including the not-ready answer served with a 503
    pub async fn readiness(&self) -> Result<ReadinessResponse> {
        let response = self
            .client
            .get(self.url("readyz")?)
            .send()
            .await
            .context("Failed to reach telemetry server")?;

        if response.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return decode(response).await;
        }
        decode(checked(response).await?).await
    }
}

async fn checked(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("API error ({}): {}", status, body)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    response.json().await.context("Failed to parse response")
}
