//! Aperture - single-flight loader for remote, signed WebAssembly artifacts
//!
//! An application hands Aperture an identifier (conventionally a URL); the
//! loader fetches the source, passes it through a mandatory verification
//! gate, instantiates it behind an explicit capability allow-list, and caches
//! the resulting callable for every later request. Concurrent requests for an
//! unresolved identifier share exactly one fetch and one instantiation, and
//! all of them observe the same success-or-failure outcome. A failed
//! identifier stays failed for the loader's lifetime; there are no automatic
//! retries, no eviction, and no versioning.
//!
//! # Core concepts
//!
//! - [`Loader`]: the facade. Built with [`LoaderBuilder`] (a [`Verifier`] is
//!   mandatory; fetcher and capabilities have defaults), opened with
//!   [`Loader::open`].
//! - [`Source`]: a remote identifier, or inline source text gated behind
//!   [`OpenOptions::allow_inline_source`].
//! - [`Artifact`]: an instantiated wasm module whose exported `default`
//!   function is the callable; shared as `Arc<Artifact>`.
//! - [`CapabilityEnvironment`]: the only bridge between host and loaded
//!   code; an immutable name-to-host-function allow-list.
//! - [`Fetcher`] / [`Verifier`]: the transport and authenticity
//!   collaborators, injected at construction.
//!
//! # Example
//!
//! ```no_run
//! use aperture::{DigestVerifier, Loader, OpenOptions, Source};
//!
//! # async fn demo() -> aperture::ApertureResult<()> {
//! let loader = Loader::builder()
//!     .verifier(DigestVerifier::new([
//!         "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
//!     ]))
//!     .build()?;
//!
//! let artifact = loader
//!     .open(
//!         Source::Remote("https://plugins.example.com/greet.wat".to_string()),
//!         &OpenOptions::default(),
//!     )
//!     .await?;
//! let _results = artifact.call(&[])?;
//! # Ok(())
//! # }
//! ```

pub mod capability;
mod coalesce;
pub mod error;
pub mod fetch;
pub mod instantiate;
pub mod loader;
pub mod verify;

pub use capability::{Capability, CapabilityEnvironment, CAPABILITY_NAMESPACE};
pub use error::{ApertureError, ApertureResult};
pub use fetch::{FetchRequest, FetchResponse, Fetcher, HttpFetcher, Payload};
pub use instantiate::{Artifact, Instantiator, EXPORT_SLOT};
pub use loader::{Loader, LoaderBuilder, OpenOptions, Source};
pub use verify::{DigestVerifier, Verifier};

// Convenience re-exports of the wasmtime value types that appear in the
// capability and artifact call surfaces.
pub use wasmtime::{Val, ValType};
