//! Capability environment for instantiated artifacts
//!
//! Artifacts never get ambient access to the host. Instead, every host
//! function they may import is named in an explicit allow-list built once at
//! loader construction and shared across all instantiations. Imports outside
//! the allow-list resolve to inert stubs that trap when called.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;
use wasmtime::{Val, ValType};

/// Import namespace under which capabilities are exposed to artifacts
pub const CAPABILITY_NAMESPACE: &str = "host";

/// Host callback invoked when an artifact calls a capability.
///
/// Receives the call parameters and writes into the (pre-sized) results
/// slice. Returning `Err` traps the calling artifact.
pub type CapabilityFn = Arc<dyn Fn(&[Val], &mut [Val]) -> Result<(), String> + Send + Sync>;

/// A single named host function an artifact may import
#[derive(Clone)]
pub struct Capability {
    params: Vec<ValType>,
    results: Vec<ValType>,
    handler: CapabilityFn,
}

impl Capability {
    /// Create a capability from a wasm signature and a host callback
    pub fn new(
        params: Vec<ValType>,
        results: Vec<ValType>,
        handler: impl Fn(&[Val], &mut [Val]) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            params,
            results,
            handler: Arc::new(handler),
        }
    }

    /// Parameter types of the wasm signature
    pub fn params(&self) -> &[ValType] {
        &self.params
    }

    /// Result types of the wasm signature
    pub fn results(&self) -> &[ValType] {
        &self.results
    }

    pub(crate) fn handler(&self) -> CapabilityFn {
        Arc::clone(&self.handler)
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("params", &self.params)
            .field("results", &self.results)
            .finish_non_exhaustive()
    }
}

/// Immutable mapping from capability name to host function.
///
/// Built once, then shared by reference across every instantiation. The
/// instantiator exposes exactly these names under [`CAPABILITY_NAMESPACE`];
/// no other host symbol is reachable from evaluated source.
#[derive(Clone)]
pub struct CapabilityEnvironment {
    entries: BTreeMap<String, Capability>,
}

impl CapabilityEnvironment {
    /// An environment exposing no capabilities at all
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// The default minimal allow-list: `log` and `now`.
    ///
    /// - `host.log(i64)`: records the value on the host's structured log
    /// - `host.now() -> i64`: milliseconds since the Unix epoch
    pub fn minimal() -> Self {
        Self::empty()
            .with_capability(
                "log",
                Capability::new(vec![ValType::I64], vec![], |params, _results| {
                    let value = params.first().and_then(Val::i64).unwrap_or(0);
                    debug!(target: "aperture::artifact", value, "artifact log");
                    Ok(())
                }),
            )
            .with_capability(
                "now",
                Capability::new(vec![], vec![ValType::I64], |_params, results| {
                    let millis = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map(|d| d.as_millis() as i64)
                        .unwrap_or(0);
                    results[0] = Val::I64(millis);
                    Ok(())
                }),
            )
    }

    /// Add a named capability (builder-style; consumes and returns self)
    pub fn with_capability(mut self, name: impl Into<String>, capability: Capability) -> Self {
        self.entries.insert(name.into(), capability);
        self
    }

    /// Look up a capability by name
    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.entries.get(name)
    }

    /// Names in the allow-list, in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &Capability)> {
        self.entries.iter().map(|(name, cap)| (name.as_str(), cap))
    }
}

impl Default for CapabilityEnvironment {
    fn default() -> Self {
        Self::minimal()
    }
}

impl fmt::Debug for CapabilityEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityEnvironment")
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
