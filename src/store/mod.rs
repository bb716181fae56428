// ABOUTME: Image-store capability consumed by the coordinator.
// ABOUTME: Defines the ImageStore trait and its Docker Engine API adapter.

mod detection;
mod engine;
mod image;
mod types;

pub use detection::{DetectionError, detect_local, resolve_runtime};
pub use engine::BollardStore;
pub use image::{ImageStore, RegistryAuth, StoreError};
pub use types::{RuntimeConfig, RuntimeInfo, RuntimeType};
