//! Error types for Aperture
//!
//! All modules use `ApertureResult<T>` as their return type.
//!
//! Every variant carries owned strings rather than source errors so the enum
//! is `Clone`: a single pipeline failure is delivered to every caller queued
//! on the same identifier.

use thiserror::Error;

/// Result type alias for Aperture operations
pub type ApertureResult<T> = Result<T, ApertureError>;

/// All errors that can occur in Aperture
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApertureError {
    // Construction errors
    #[error("To build a loader, you **must** supply a verifier")]
    MissingVerifier,

    // Policy errors
    #[error("Attempted to instantiate inline source, but allow_inline_source was not set")]
    InlineNotAllowed,

    // Pipeline errors
    #[error("Fetching \"{id}\" failed: {reason}")]
    Fetch { id: String, reason: String },

    #[error("Expected text payload for \"{id}\", encountered {kind}")]
    PayloadType { id: String, kind: &'static str },

    #[error("Failed to verify \"{id}\"")]
    Verification { id: String },

    #[error("Expected a callable default export, encountered {kind}. Did you forget to export a `default` function?")]
    Instantiation { kind: &'static str },

    #[error("Source failed to compile: {reason}")]
    Evaluation { reason: String },

    // Terminal-failure arrivals
    #[error("Artifact at \"{id}\" could not be instantiated")]
    NotInstantiable { id: String },

    // Artifact runtime errors
    #[error("Artifact call trapped: {reason}")]
    Trap { reason: String },

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApertureError {
    /// Create a fetch error for an identifier
    pub fn fetch(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create an evaluation error from a compile or instantiation failure
    pub fn evaluation(reason: impl Into<String>) -> Self {
        Self::Evaluation {
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }

    /// Check if the error marks a terminal cache state (no retry will help
    /// within this loader instance)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. }
                | Self::PayloadType { .. }
                | Self::Verification { .. }
                | Self::Instantiation { .. }
                | Self::Evaluation { .. }
                | Self::NotInstantiable { .. }
        )
    }
}
