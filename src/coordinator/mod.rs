// ABOUTME: Image lifecycle coordination: pull dedup, reference counts, delayed removal.
// ABOUTME: Exports the Coordinator handle, its settings, and the pull error taxonomy.

mod classify;
mod error;
mod handle;
mod pull;
mod refcount;
mod removal;

pub use classify::{ErrorClassifier, IMAGE_NOT_FOUND_PATTERN, MessageClassifier};
pub use error::{PullError, PullErrorKind};
pub use handle::{
    Coordinator, CoordinatorSettings, CoordinatorSnapshot, DEFAULT_REMOVE_DELAY, PendingRemovalInfo,
};
pub use removal::REMOVE_ATTEMPTS;
