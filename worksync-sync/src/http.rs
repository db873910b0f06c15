//! reqwest-backed service implementations.
//!
//! Endpoints:
//! - `GET   {base}/context/{id}`
//! - `PATCH {base}/context/{id}`
//! - `POST  {base}/ai-coder/execute`
//!
//! The bearer token, when present, comes from `WORKSYNC_TOKEN` and is never
//! written to the config file.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, Url};

use worksync_core::{
    Config, ContextId, ContextRecord, ContextUpdate, ExecuteRequest, ExecuteResponse,
};

use crate::error::ServiceError;
use crate::service::{ContextService, GenerationService};

/// Shared client + base URL + optional bearer token.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpClient {
    /// Every request made through this client is bounded by `timeout`.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        token: Option<String>,
    ) -> Result<Self, ServiceError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| ServiceError::InvalidUrl(format!("{base_url}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(ServiceError::InvalidUrl(format!("{base_url}: not a base URL")));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: parsed,
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Base URL with `segments` appended, each percent-encoded on its own.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Map non-2xx responses to [`ServiceError::Http`] with the body attached.
async fn check(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Http {
        status: status.as_u16(),
        body,
    })
}

#[derive(Debug, Clone)]
pub struct HttpContextService {
    http: HttpClient,
}

impl HttpContextService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        Ok(Self::new(HttpClient::new(
            &config.server_url,
            config.context_timeout(),
            Config::token(),
        )?))
    }

    fn context_url(&self, id: &ContextId) -> Url {
        self.http.url(&["context", id.0.as_str()])
    }
}

#[async_trait]
impl ContextService for HttpContextService {
    async fn get(&self, id: &ContextId) -> Result<ContextRecord, ServiceError> {
        let request = self.http.authorize(self.http.client.get(self.context_url(id)));
        let response = check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn patch(&self, id: &ContextId, update: &ContextUpdate) -> Result<(), ServiceError> {
        let request = self
            .http
            .authorize(self.http.client.patch(self.context_url(id)))
            .json(update);
        check(request.send().await?).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct HttpGenerationService {
    http: HttpClient,
}

impl HttpGenerationService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        Ok(Self::new(HttpClient::new(
            &config.server_url,
            config.generation_timeout(),
            Config::token(),
        )?))
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn execute(&self, request: &ExecuteRequest) -> Result<ExecuteResponse, ServiceError> {
        let builder = self
            .http
            .authorize(self.http.client.post(self.http.url(&["ai-coder", "execute"])))
            .json(request);
        let response = check(builder.send().await?).await?;
        Ok(response.json().await?)
    }
}
