//! Artifact instantiation
//!
//! Turns raw source text (WebAssembly, text or binary form) plus a
//! [`CapabilityEnvironment`] into a callable [`Artifact`]. The evaluation
//! scope contains exactly the capability bindings and nothing else; the
//! artifact must export a function named `default`.

use std::fmt;
use std::sync::Mutex;

use tracing::debug;
use wasmtime::{Engine, Extern, Func, FuncType, Linker, Module, Store, Val};

use crate::capability::{CapabilityEnvironment, CAPABILITY_NAMESPACE};
use crate::error::{ApertureError, ApertureResult};

/// The well-known export slot artifacts must fill with a function
pub const EXPORT_SLOT: &str = "default";

/// Compiles and instantiates source text against a capability allow-list.
///
/// One instantiator (and its compilation engine) is shared across all
/// instantiations performed by a loader.
pub struct Instantiator {
    engine: Engine,
}

impl Instantiator {
    pub fn new() -> Self {
        Self {
            engine: Engine::default(),
        }
    }

    /// Instantiate `source` with exactly the bindings named by `capabilities`.
    ///
    /// Compile failures surface as [`ApertureError::Evaluation`]. A missing
    /// or non-function `default` export surfaces as
    /// [`ApertureError::Instantiation`] carrying the observed export kind.
    pub fn instantiate(
        &self,
        source: &str,
        capabilities: &CapabilityEnvironment,
    ) -> ApertureResult<Artifact> {
        let module = Module::new(&self.engine, source)
            .map_err(|e| ApertureError::evaluation(e.to_string()))?;

        let mut linker: Linker<()> = Linker::new(&self.engine);
        for (name, capability) in capabilities.iter() {
            let ty = FuncType::new(
                &self.engine,
                capability.params().iter().cloned(),
                capability.results().iter().cloned(),
            );
            let handler = capability.handler();
            let capability_name = name.to_string();
            linker
                .func_new(CAPABILITY_NAMESPACE, name, ty, move |_caller, params, results| {
                    handler(params, results).map_err(|reason| {
                        wasmtime::Error::msg(format!(
                            "capability \"{capability_name}\" failed: {reason}"
                        ))
                    })
                })
                .map_err(|e| ApertureError::internal(e.to_string()))?;
        }

        // Imports outside the allow-list become inert trap-on-call stubs so
        // evaluated source can never reach host code by guessing names.
        linker
            .define_unknown_imports_as_traps(&module)
            .map_err(|e| ApertureError::internal(e.to_string()))?;

        let mut store = Store::new(&self.engine, ());
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| ApertureError::evaluation(e.to_string()))?;

        match instance.get_export(&mut store, EXPORT_SLOT) {
            Some(Extern::Func(func)) => {
                debug!(export = EXPORT_SLOT, "instantiated artifact");
                Ok(Artifact {
                    inner: Mutex::new(ArtifactInner { store, func }),
                })
            }
            other => Err(ApertureError::Instantiation {
                kind: export_kind(other.as_ref()),
            }),
        }
    }
}

impl Default for Instantiator {
    fn default() -> Self {
        Self::new()
    }
}

/// Report the observed kind of the `default` export for the error message
fn export_kind(export: Option<&Extern>) -> &'static str {
    match export {
        None => "missing",
        Some(Extern::Func(_)) => "function",
        Some(Extern::Global(_)) => "global",
        Some(Extern::Table(_)) => "table",
        Some(Extern::Memory(_)) => "memory",
        Some(_) => "unknown",
    }
}

/// An instantiated callable produced from verified source.
///
/// Shared as `Arc<Artifact>` by every caller for the same identifier. Calls
/// are serialized through an internal mutex because a wasmtime store is
/// single-threaded.
pub struct Artifact {
    inner: Mutex<ArtifactInner>,
}

struct ArtifactInner {
    store: Store<()>,
    func: Func,
}

impl Artifact {
    /// Invoke the artifact's `default` export.
    ///
    /// Runtime traps surface as [`ApertureError::Trap`]; they do not affect
    /// the loader's cache entry for the artifact.
    pub fn call(&self, params: &[Val]) -> ApertureResult<Vec<Val>> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| ApertureError::internal("artifact lock poisoned"))?;
        let func = inner.func;
        let arity = func.ty(&inner.store).results().len();
        let mut results = vec![Val::I32(0); arity];
        func.call(&mut inner.store, params, &mut results)
            .map_err(|e| ApertureError::Trap {
                // Render the whole error chain; the top-level trap message
                // alone drops the capability failure that caused it.
                reason: e
                    .chain()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(": "),
            })?;
        Ok(results)
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact").finish_non_exhaustive()
    }
}
