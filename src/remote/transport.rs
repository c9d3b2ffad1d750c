// ABOUTME: Generic JSON request/response over HTTP with deployment-dependent routing
// ABOUTME: Non-2xx responses become Transport errors carrying status and raw body; no retries here

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

use super::routing::RouteStrategy;
use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
pub struct Transport {
    client: Client,
    route: Arc<dyn RouteStrategy>,
    credentials: Option<Credentials>,
}

impl Transport {
    pub fn new(route: Arc<dyn RouteStrategy>, credentials: Option<Credentials>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("blup-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AnalysisError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            route,
            credentials,
        })
    }

    pub fn base_url(&self) -> String {
        self.route.resolve_base_url()
    }

    fn builder(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.credentials {
            Some(creds) => builder.basic_auth(&creds.username, Some(&creds.password)),
            None => builder,
        }
    }

    fn json_builder<B>(&self, endpoint: &str, method: Method, body: Option<&B>) -> RequestBuilder
    where
        B: Serialize + ?Sized,
    {
        let url = self.route.url_for(endpoint);
        debug!(%method, endpoint, "API request");

        let builder = self.builder(method, &url);
        match body {
            Some(body) => builder.json(body),
            None => builder,
        }
    }

    /// Sends the request; any non-2xx answer becomes `Transport` with the
    /// raw body, whatever its content type.
    async fn dispatch(&self, endpoint: &str, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(|e| {
            error!(endpoint, error = %e, "API request failed");
            AnalysisError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        error!(endpoint, status = status.as_u16(), "API request failed");
        Err(AnalysisError::Transport {
            status: status.as_u16(),
            body,
        })
    }

    /// Sends `body` (if any) as JSON and parses the response as `T`.
    pub async fn request<T, B>(&self, endpoint: &str, method: Method, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let builder = self.json_builder(endpoint, method, body);
        let text = self.dispatch(endpoint, builder).await?.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            error!(endpoint, error = %e, "Failed to parse API response");
            AnalysisError::Parse(format!("{} ({})", e, endpoint))
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.request::<T, ()>(endpoint, Method::GET, None).await
    }

    pub async fn post<T, B>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(endpoint, Method::POST, Some(body)).await
    }

    /// Like `request`, but the response body is ignored. Used for endpoints
    /// that acknowledge with an empty or free-form body.
    pub async fn send<B>(&self, endpoint: &str, method: Method, body: Option<&B>) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let builder = self.json_builder(endpoint, method, body);
        self.dispatch(endpoint, builder).await?;
        Ok(())
    }

    pub async fn delete(&self, endpoint: &str) -> Result<()> {
        self.send::<()>(endpoint, Method::DELETE, None).await
    }

    /// Fetches a binary artifact. When `expected_type` is given, a response
    /// declaring a different content type is rejected.
    pub async fn request_bytes(
        &self,
        endpoint: &str,
        expected_type: Option<&str>,
    ) -> Result<Vec<u8>> {
        let url = self.route.download_url_for(endpoint);
        debug!(endpoint, "Download request");

        let mut builder = self.builder(Method::GET, &url);
        if let Some(accept) = expected_type {
            builder = builder.header(reqwest::header::ACCEPT, accept);
        }
        let response = self.dispatch(endpoint, builder).await?;

        if let Some(expected) = expected_type {
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            if let Some(content_type) = content_type {
                if !content_type.contains(expected) {
                    error!(endpoint, %content_type, "Unexpected download content type");
                    return Err(AnalysisError::Parse(format!(
                        "Unexpected content type: {}",
                        content_type
                    )));
                }
            }
        }

        Ok(response.bytes().await?.to_vec())
    }
}
