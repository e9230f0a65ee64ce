//! Verification gate
//!
//! The loader refuses to instantiate unverified payloads. The predicate
//! itself is supplied by the caller; building one (signing schemes, key
//! management) is out of scope here. A SHA-256 digest allow-list is shipped
//! as a minimal implementation.

use std::collections::HashSet;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::ApertureResult;
use crate::fetch::FetchResponse;

/// Asynchronous authenticity predicate, called once per fetch attempt after
/// the fetch completes and before instantiation.
///
/// `Ok(false)` and `Err(_)` are treated identically: the attempt fails,
/// nothing is instantiated, nothing is cached as resolved.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, response: &FetchResponse) -> ApertureResult<bool>;
}

/// Verifier accepting payloads whose SHA-256 digest is on an allow-list
pub struct DigestVerifier {
    allowed: HashSet<String>,
}

impl DigestVerifier {
    /// Build from hex-encoded SHA-256 digests (case-insensitive)
    pub fn new(digests: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed: digests
                .into_iter()
                .map(|d| d.into().to_lowercase())
                .collect(),
        }
    }

    /// Hex-encoded SHA-256 digest of a payload, for building allow-lists
    pub fn digest(payload: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl Verifier for DigestVerifier {
    async fn verify(&self, response: &FetchResponse) -> ApertureResult<bool> {
        let digest = Self::digest(response.payload.as_bytes());
        Ok(self.allowed.contains(&digest))
    }
}
