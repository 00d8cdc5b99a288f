use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use harvester_core::WorkUnit;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, COOKIE, RETRY_AFTER};
use reqwest::StatusCode;
use url::Url;

use crate::{FailureKind, FetchError, Payload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
    pub user_agent: String,
    pub headers: Vec<(String, String)>,
    /// Raw `Cookie` header value sent with every request.
    pub cookie: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 32 * 1024 * 1024,
            user_agent: concat!("harvester/", env!("CARGO_PKG_VERSION")).to_string(),
            headers: vec![
                (
                    "Accept".to_string(),
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
                ),
                ("Accept-Language".to_string(), "en-US,en;q=0.5".to_string()),
            ],
            cookie: None,
        }
    }
}

/// Where units are fetched from, and how a unit maps to a request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Paginated search listing; units are `Page(n)`, sent as `page=n`.
    SearchPages { base_url: String },
    /// OAI-PMH `ListRecords`; units are `Start` and `Token`.
    OaiPmh {
        endpoint: String,
        metadata_prefix: String,
        set: Option<String>,
    },
}

impl Source {
    pub fn request_url(&self, unit: &WorkUnit) -> Result<Url, FetchError> {
        match (self, unit) {
            (Source::SearchPages { base_url }, WorkUnit::Page(page)) => {
                let mut url = parse_url(base_url)?;
                let kept: Vec<(String, String)> = url
                    .query_pairs()
                    .filter(|(key, _)| key != "page")
                    .map(|(key, value)| (key.into_owned(), value.into_owned()))
                    .collect();
                url.query_pairs_mut()
                    .clear()
                    .extend_pairs(kept)
                    .append_pair("page", &page.to_string());
                Ok(url)
            }
            (
                Source::OaiPmh {
                    endpoint,
                    metadata_prefix,
                    set,
                },
                WorkUnit::Start,
            ) => {
                let mut url = parse_url(endpoint)?;
                {
                    let mut query = url.query_pairs_mut();
                    query
                        .clear()
                        .append_pair("verb", "ListRecords")
                        .append_pair("metadataPrefix", metadata_prefix);
                    if let Some(set) = set {
                        query.append_pair("set", set);
                    }
                }
                Ok(url)
            }
            (Source::OaiPmh { endpoint, .. }, WorkUnit::Token(token)) => {
                let mut url = parse_url(endpoint)?;
                url.query_pairs_mut()
                    .clear()
                    .append_pair("verb", "ListRecords")
                    .append_pair("resumptionToken", token);
                Ok(url)
            }
            (source, unit) => Err(FetchError::new(
                FailureKind::InvalidRequest,
                format!("{unit} cannot be fetched from {source:?}"),
            )),
        }
    }
}

fn parse_url(raw: &str) -> Result<Url, FetchError> {
    Url::parse(raw).map_err(|err| FetchError::new(FailureKind::InvalidRequest, err.to_string()))
}

/// Performs exactly one request per call; retries belong to the caller.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, unit: &WorkUnit) -> Result<Payload, FetchError>;
}

/// Fetcher over a single pooled `reqwest::Client`, shared by all units.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    source: Source,
    client: reqwest::Client,
    max_bytes: u64,
}

impl ReqwestFetcher {
    pub fn new(source: Source, settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.as_str())
            .default_headers(build_headers(&settings)?)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            source,
            client,
            max_bytes: settings.max_bytes,
        })
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    fn too_large(&self, actual: u64) -> FetchError {
        FetchError::new(
            FailureKind::TooLarge {
                max_bytes: self.max_bytes,
                actual: Some(actual),
            },
            "response too large",
        )
    }
}

fn build_headers(settings: &FetchSettings) -> Result<HeaderMap, FetchError> {
    let invalid = |err: String| FetchError::new(FailureKind::InvalidRequest, err);
    let mut headers = HeaderMap::new();
    for (name, value) in &settings.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
        let value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
        headers.insert(name, value);
    }
    if let Some(cookie) = settings.cookie.as_deref() {
        let value = HeaderValue::from_str(cookie).map_err(|e| invalid(e.to_string()))?;
        headers.insert(COOKIE, value);
    }
    Ok(headers)
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, unit: &WorkUnit) -> Result<Payload, FetchError> {
        let url = self.source.request_url(unit)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            let retry_after = retry_after_hint(response.headers());
            return Err(FetchError::new(
                FailureKind::ServerBusy { retry_after },
                status.to_string(),
            ));
        }
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.max_bytes {
                return Err(self.too_large(content_len));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > self.max_bytes {
                return Err(self.too_large(next_len));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(Payload {
            body: Bytes::from(body),
            content_type,
        })
    }
}

/// Only the delta-seconds form of `Retry-After` is understood.
fn retry_after_hint(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
