//! `ContentClient` - CRL content API client implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;
use url::Url;

use super::api::LocalContentApi;
use super::error::ContentApiError;
use super::events::normalize_events;
use super::params::{ParamValue, QueryParams};

/// Default timeout for list requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default User-Agent.
const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Endpoint path fragments appended to the API root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Events endpoint (also the prefix of per-place event URLs).
    pub events: String,
    /// Places endpoint.
    pub places: String,
    /// Cities endpoint.
    pub cities: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            events: String::from("events/"),
            places: String::from("places/"),
            cities: String::from("cities/"),
        }
    }
}

/// CRL content API client.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct ContentClient {
    /// HTTP client with default headers applied.
    http_client: Client,
    /// API root all endpoints are appended to.
    api_root: Url,
    /// Endpoint fragments.
    endpoints: Endpoints,
    /// Referrer used when the caller gives none.
    default_referer: Option<String>,
    /// Timeout for list requests.
    timeout: Duration,
}

/// Builder for `ContentClient`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct ContentClientBuilder {
    api_root: Option<Url>,
    endpoints: Option<Endpoints>,
    headers: Vec<(String, String)>,
    default_referer: Option<String>,
    user_agent: Option<String>,
    timeout: Option<Duration>,
}

impl ContentClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            api_root: None,
            endpoints: None,
            headers: Vec::new(),
            default_referer: None,
            user_agent: None,
            timeout: None,
        }
    }

    /// Sets the API root (required).
    #[must_use]
    pub fn api_root(mut self, url: Url) -> Self {
        self.api_root = Some(url);
        self
    }

    /// Overrides the endpoint fragments.
    #[must_use]
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Adds a header sent with every request.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the referrer used when a call does not supply one.
    #[must_use]
    pub fn default_referer(mut self, referer: impl Into<String>) -> Self {
        self.default_referer = Some(referer.into());
        self
    }

    /// Sets the User-Agent (default: `crl-api/<version>`).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the timeout for list requests (default: 10s).
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - `api_root` is not set.
    /// - A default header name or value is invalid.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<ContentClient> {
        let api_root = self.api_root.context("api_root is required")?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let header_name = HeaderName::try_from(name.as_str())
                .with_context(|| format!("invalid header name: {name}"))?;
            let header_value = HeaderValue::try_from(value.as_str())
                .with_context(|| format!("invalid value for header {name}"))?;
            headers.insert(header_name, header_value);
        }

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| String::from(DEFAULT_USER_AGENT));

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .default_headers(headers)
            .gzip(true)
            .build()
            .context("failed to build HTTP client")?;

        Ok(ContentClient {
            http_client,
            api_root,
            endpoints: self.endpoints.unwrap_or_default(),
            default_referer: self.default_referer,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
        })
    }
}

impl ContentClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> ContentClientBuilder {
        ContentClientBuilder::new()
    }

    /// Appends `path` to the API root as plain string concatenation.
    fn endpoint_url(&self, path: &str) -> Result<Url, ContentApiError> {
        Url::parse(&format!("{}{path}", self.api_root)).map_err(|source| ContentApiError::Url {
            path: String::from(path),
            source,
        })
    }

    /// Picks the caller's referrer, falling back to the configured default.
    fn resolve_referer<'a>(&'a self, referer: Option<&'a str>) -> Option<&'a str> {
        referer.or(self.default_referer.as_deref())
    }

    /// Reads the body and decodes it as JSON.
    async fn read_json(response: reqwest::Response, url: &Url) -> Result<Value, ContentApiError> {
        let body = response
            .text()
            .await
            .map_err(|e| ContentApiError::from_reqwest(e, url.as_str()))?;
        tracing::debug!(%url, body_len = body.len(), "CRL API response body received");
        serde_json::from_str(&body).map_err(|source| ContentApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// Sends a GET with query params, referrer and timeout, and checks the status.
    #[instrument(skip_all, fields(path = path))]
    async fn get_checked(
        &self,
        path: &str,
        params: &QueryParams,
        referer: Option<&str>,
    ) -> Result<Value, ContentApiError> {
        let url = self.endpoint_url(path)?;

        let mut request = self
            .http_client
            .get(url.clone())
            .query(&params.to_query())
            .timeout(self.timeout);
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }

        tracing::debug!(%url, ?referer, "CRL API request");

        let response = request
            .send()
            .await
            .map_err(|e| ContentApiError::from_reqwest(e, url.as_str()))?;
        let response = response
            .error_for_status()
            .map_err(|e| ContentApiError::from_reqwest(e, url.as_str()))?;

        Self::read_json(response, &url).await
    }
}

impl LocalContentApi for ContentClient {
    #[instrument(skip_all)]
    async fn place_events(&self, place_id: &str) -> Result<Value, ContentApiError> {
        let url = self.endpoint_url(&format!("{}{place_id}/", self.endpoints.events))?;

        let mut request = self.http_client.get(url.clone());
        if let Some(referer) = self.default_referer.as_deref() {
            request = request.header(REFERER, referer);
        }

        tracing::debug!(%url, "CRL API request");

        let response = request
            .send()
            .await
            .map_err(|e| ContentApiError::from_reqwest(e, url.as_str()))?;

        Self::read_json(response, &url).await
    }

    #[instrument(skip_all)]
    async fn cities(
        &self,
        params: &QueryParams,
        referer: Option<&str>,
        _ttl: u64,
    ) -> Result<Value, ContentApiError> {
        let referer = self.resolve_referer(referer);
        self.get_checked(&self.endpoints.cities, params, referer)
            .await
    }

    #[instrument(skip_all)]
    async fn places(
        &self,
        params: &QueryParams,
        referer: Option<&str>,
    ) -> Result<Value, ContentApiError> {
        let referer = self.resolve_referer(referer);
        self.get_checked(&self.endpoints.places, params, referer)
            .await
    }

    #[instrument(skip_all)]
    async fn events_list(
        &self,
        params: &QueryParams,
        referer: Option<&str>,
    ) -> Result<Value, ContentApiError> {
        let referer = referer
            .or_else(|| params.get("ref").and_then(ParamValue::as_str))
            .or(self.default_referer.as_deref());

        let mut body = self
            .get_checked(&self.endpoints.events, params, referer)
            .await?;
        normalize_events(&mut body)?;
        Ok(body)
    }
}
