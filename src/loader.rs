//! Loader facade
//!
//! Public entry point dispatching between "load by identifier" (through the
//! single-flight cache) and "instantiate inline source" (explicitly opted-in,
//! bypassing fetch, verification, and cache).

use std::sync::Arc;

use tracing::{debug, warn};

use crate::capability::CapabilityEnvironment;
use crate::coalesce::{Claim, SingleFlight};
use crate::error::{ApertureError, ApertureResult};
use crate::fetch::{FetchRequest, Fetcher, HttpFetcher, Payload};
use crate::instantiate::{Artifact, Instantiator};
use crate::verify::Verifier;

/// What to load: a remote identifier, or raw source text supplied inline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// An opaque identifier naming a remote artifact (conventionally a URL)
    Remote(String),
    /// Raw source text; only honored when the caller opted into inline mode
    Inline(String),
}

/// Per-call options for [`Loader::open`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Inline sources bypass fetch, verification, and the cache; the caller
    /// owns their trustworthiness and must opt in explicitly.
    pub allow_inline_source: bool,
}

/// Builder for [`Loader`]. A verifier is mandatory; the fetcher and the
/// capability environment fall back to defaults when omitted.
#[derive(Default)]
pub struct LoaderBuilder {
    fetcher: Option<Arc<dyn Fetcher>>,
    verifier: Option<Arc<dyn Verifier>>,
    capabilities: Option<CapabilityEnvironment>,
}

impl LoaderBuilder {
    pub fn fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    pub fn verifier(mut self, verifier: impl Verifier + 'static) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    pub fn capabilities(mut self, capabilities: CapabilityEnvironment) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Build the loader. Fails fast with
    /// [`ApertureError::MissingVerifier`] when no verifier was supplied.
    pub fn build(self) -> ApertureResult<Loader> {
        let verifier = self.verifier.ok_or(ApertureError::MissingVerifier)?;
        Ok(Loader {
            inner: Arc::new(LoaderInner {
                fetcher: self
                    .fetcher
                    .unwrap_or_else(|| Arc::new(HttpFetcher::default())),
                verifier,
                capabilities: self.capabilities.unwrap_or_default(),
                instantiator: Instantiator::new(),
                flights: SingleFlight::new(),
            }),
        })
    }
}

struct LoaderInner {
    fetcher: Arc<dyn Fetcher>,
    verifier: Arc<dyn Verifier>,
    capabilities: CapabilityEnvironment,
    instantiator: Instantiator,
    flights: SingleFlight<Arc<Artifact>>,
}

/// The artifact loader. Cheap to clone; clones share one cache.
#[derive(Clone)]
pub struct Loader {
    inner: Arc<LoaderInner>,
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("capabilities", &self.inner.capabilities)
            .finish_non_exhaustive()
    }
}

impl Loader {
    pub fn builder() -> LoaderBuilder {
        LoaderBuilder::default()
    }

    /// Open a source and return its artifact.
    ///
    /// Remote sources go through the single-flight cache: concurrent opens
    /// for one identifier share a single fetch-verify-instantiate pipeline,
    /// and a failed identifier stays failed for this loader's lifetime.
    /// Inline sources require `options.allow_inline_source` and bypass the
    /// cache and the verification gate entirely.
    pub async fn open(&self, source: Source, options: &OpenOptions) -> ApertureResult<Arc<Artifact>> {
        match source {
            Source::Inline(text) => {
                if !options.allow_inline_source {
                    return Err(ApertureError::InlineNotAllowed);
                }
                self.inner
                    .instantiator
                    .instantiate(&text, &self.inner.capabilities)
                    .map(Arc::new)
            }
            Source::Remote(id) => self.resolve(&id).await,
        }
    }

    /// Resolve an identifier to its artifact through the coalescer
    async fn resolve(&self, id: &str) -> ApertureResult<Arc<Artifact>> {
        match self.inner.flights.claim(id) {
            Claim::Resolved(artifact) => Ok(artifact),
            Claim::Failed => Err(ApertureError::NotInstantiable { id: id.to_string() }),
            Claim::Joined(rx) => rx
                .await
                .unwrap_or_else(|_| Err(abandoned(id))),
            Claim::Lead(rx) => {
                // Detached task: the pipeline runs to completion even if the
                // leading caller is dropped, so joined waiters still resolve.
                let loader = self.clone();
                let flight_id = id.to_string();
                tokio::spawn(async move {
                    let outcome = loader.run_pipeline(&flight_id).await;
                    if let Err(error) = &outcome {
                        warn!(id = %flight_id, %error, "flight failed");
                    }
                    loader.inner.flights.complete(&flight_id, outcome);
                });
                rx.await.unwrap_or_else(|_| Err(abandoned(id)))
            }
        }
    }

    /// The fetch-verify-instantiate pipeline, run exactly once per in-flight
    /// episode. Every failure is normalized to an `ApertureError` here; the
    /// coalescer records it as the identifier's terminal state.
    async fn run_pipeline(&self, id: &str) -> ApertureResult<Arc<Artifact>> {
        let response = self.inner.fetcher.fetch(FetchRequest::get(id)).await?;

        let text = match &response.payload {
            Payload::Text(text) => text.clone(),
            other => {
                return Err(ApertureError::PayloadType {
                    id: id.to_string(),
                    kind: other.kind(),
                })
            }
        };

        match self.inner.verifier.verify(&response).await {
            Ok(true) => debug!(%id, "payload verified"),
            Ok(false) => {
                return Err(ApertureError::Verification { id: id.to_string() });
            }
            Err(error) => {
                debug!(%id, %error, "verifier failed");
                return Err(ApertureError::Verification { id: id.to_string() });
            }
        }

        let artifact = self
            .inner
            .instantiator
            .instantiate(&text, &self.inner.capabilities)?;
        Ok(Arc::new(artifact))
    }
}

/// The pipeline task disappeared without completing its flight. Only
/// reachable if the task panicked or the runtime shut down underneath it.
fn abandoned(id: &str) -> ApertureError {
    ApertureError::internal(format!("in-flight request for \"{id}\" was abandoned"))
}
