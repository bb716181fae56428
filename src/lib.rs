// ABOUTME: Library root for imagekeeper - node-local image lifecycle coordination.
// ABOUTME: Deduplicates pulls, counts image references and garbage-collects unused images.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod store;
pub mod types;

pub use coordinator::{Coordinator, CoordinatorSettings, PullError, PullErrorKind};
