//! Fetcher collaborator
//!
//! Abstract transport for fetching artifact source by identifier. The core
//! never retries and imposes no timeouts; both belong to the fetcher.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ApertureError, ApertureResult};

/// A request for an artifact's source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// The identifier, conventionally a URL
    pub url: String,
    /// HTTP-style method name
    pub method: String,
}

impl FetchRequest {
    /// Build a GET request for an identifier
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
        }
    }
}

/// Fetched payload. The pipeline requires text; a binary payload fails the
/// attempt with a type-mismatch error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    /// Observed payload kind, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
        }
    }

    /// Raw bytes of the payload, whichever form it took
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

/// Response handed to the verification gate and, when text, instantiated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub payload: Payload,
    pub headers: HashMap<String, String>,
}

impl FetchResponse {
    /// Build a header-less text response
    pub fn text(payload: impl Into<String>) -> Self {
        Self {
            payload: Payload::Text(payload.into()),
            headers: HashMap::new(),
        }
    }
}

/// Abstract transport interface.
///
/// Implementations own everything HTTP-specific: headers, redirects,
/// transport-level retries, timeouts. Failures surface as errors consumed by
/// the loader pipeline and recorded as the identifier's terminal state.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> ApertureResult<FetchResponse>;
}

/// Default fetcher: a blocking HTTP GET driven through `spawn_blocking`
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> ApertureResult<FetchResponse> {
        if !request.method.eq_ignore_ascii_case("GET") {
            return Err(ApertureError::fetch(
                &request.url,
                format!("unsupported method {}", request.method),
            ));
        }

        let agent = self.agent.clone();
        let url = request.url.clone();
        debug!(%url, "fetching artifact source");

        let result = tokio::task::spawn_blocking(move || -> Result<FetchResponse, String> {
            let mut response = agent.get(url.as_str()).call().map_err(|e| e.to_string())?;

            let mut headers = HashMap::new();
            for (name, value) in response.headers() {
                if let Ok(value) = value.to_str() {
                    headers.insert(name.as_str().to_string(), value.to_string());
                }
            }

            let body = response
                .body_mut()
                .read_to_string()
                .map_err(|e| e.to_string())?;

            Ok(FetchResponse {
                payload: Payload::Text(body),
                headers,
            })
        })
        .await
        .map_err(|e| ApertureError::internal(format!("fetch task failed: {e}")))?;

        result.map_err(|reason| ApertureError::fetch(request.url, reason))
    }
}
