// ABOUTME: Image store trait: pull, inspect and remove primitives.
// ABOUTME: Errors distinguish "not found" and "in use" from other failures.

use crate::types::{ImageId, ImageRef};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;

/// The three primitives the coordinator needs from an image store.
///
/// Implementations are called without the coordinator's lock held, so a
/// slow call only delays the operation that issued it.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Fetch `repository:tag` from its registry.
    async fn pull(
        &self,
        repository: &str,
        tag: &str,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), StoreError>;

    /// Resolve a local reference to its content ID.
    async fn inspect(&self, reference: &ImageRef) -> Result<ImageId, StoreError>;

    /// Delete an image by ID, without forcing.
    async fn remove(&self, id: &ImageId) -> Result<(), StoreError>;
}

/// Errors from image store operations.
///
/// `Clone` so a single pull outcome can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("image in use, cannot remove: {0}")]
    InUse(String),

    #[error("authentication failed for registry: {0}")]
    AuthenticationFailed(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Credentials for a registry pull.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub server: Option<String>,
}

impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .finish()
    }
}
