// ABOUTME: Bollard-based image store for the Docker Engine API.
// ABOUTME: Serves both Docker and Podman through the Docker-compatible socket.

use super::image::{ImageStore, RegistryAuth, StoreError};
use super::types::{RuntimeInfo, RuntimeType};
use crate::types::{ImageId, ImageRef};
use async_trait::async_trait;
use bollard::Docker;
use bollard::errors::Error as EngineError;
use bollard::query_parameters::{CreateImageOptions, RemoveImageOptions};
use futures::StreamExt;

/// Socket request timeout in seconds; pulls of large images are slow.
const REQUEST_TIMEOUT_SECS: u64 = 600;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_pull_error(e: EngineError, image_name: &str) -> StoreError {
    match &e {
        EngineError::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => StoreError::NotFound(message.clone()),
        EngineError::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 401 => StoreError::AuthenticationFailed(message.clone()),
        _ => StoreError::PullFailed(format!("{}: {}", image_name, e)),
    }
}

fn map_inspect_error(e: EngineError, image_name: &str) -> StoreError {
    match &e {
        EngineError::DockerResponseServerError { status_code, .. } if *status_code == 404 => {
            StoreError::NotFound(image_name.to_string())
        }
        _ => StoreError::Runtime(format!("failed to inspect {}: {}", image_name, e)),
    }
}

fn map_remove_error(e: EngineError, id: &ImageId) -> StoreError {
    match &e {
        EngineError::DockerResponseServerError { status_code, .. } if *status_code == 404 => {
            StoreError::NotFound(id.to_string())
        }
        EngineError::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => StoreError::InUse(message.clone()),
        _ => StoreError::Runtime(format!("failed to remove {}: {}", id, e)),
    }
}

// =============================================================================
// BollardStore
// =============================================================================

/// Image store backed by a local Docker or Podman engine.
pub struct BollardStore {
    client: Docker,
    runtime_type: RuntimeType,
}

impl BollardStore {
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
        }
    }

    /// Connect to the engine socket described by `info`.
    ///
    /// Use with [`detect_local`](super::detect_local) or
    /// [`resolve_runtime`](super::resolve_runtime).
    pub fn connect(info: &RuntimeInfo) -> Result<Self, StoreError> {
        let client = Docker::connect_with_unix(
            &info.socket_path,
            REQUEST_TIMEOUT_SECS,
            bollard::API_DEFAULT_VERSION,
        )
        .map_err(|e| {
            StoreError::Runtime(format!("failed to connect to {}: {}", info.socket_path, e))
        })?;
        Ok(Self::new(client, info.runtime_type))
    }

    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }
}

#[async_trait]
impl ImageStore for BollardStore {
    async fn pull(
        &self,
        repository: &str,
        tag: &str,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), StoreError> {
        let image_name = format!("{}:{}", repository, tag);

        let opts = CreateImageOptions {
            from_image: Some(repository.to_string()),
            tag: Some(tag.to_string()),
            ..Default::default()
        };

        let credentials = auth.map(|a| bollard::auth::DockerCredentials {
            username: Some(a.username.clone()),
            password: Some(a.password.clone()),
            serveraddress: a.server.clone(),
            ..Default::default()
        });

        // Errors can arrive mid-stream, so the whole progress stream is drained.
        let mut stream = self.client.create_image(Some(opts), None, credentials);
        while let Some(result) = stream.next().await {
            result.map_err(|e| map_pull_error(e, &image_name))?;
        }

        Ok(())
    }

    async fn inspect(&self, reference: &ImageRef) -> Result<ImageId, StoreError> {
        let image_name = reference.to_string();

        let details = self
            .client
            .inspect_image(&image_name)
            .await
            .map_err(|e| map_inspect_error(e, &image_name))?;

        details
            .id
            .filter(|id| !id.is_empty())
            .map(ImageId::new)
            .ok_or_else(|| {
                StoreError::Runtime(format!("inspect of {} returned no image id", image_name))
            })
    }

    async fn remove(&self, id: &ImageId) -> Result<(), StoreError> {
        let opts = RemoveImageOptions {
            force: false,
            ..Default::default()
        };

        self.client
            .remove_image(id.as_str(), Some(opts), None)
            .await
            .map_err(|e| map_remove_error(e, id))?;

        Ok(())
    }
}
