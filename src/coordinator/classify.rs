// ABOUTME: Recoverable/fatal verdicts for pull and inspect failures.
// ABOUTME: Pluggable; the default matches the store's "image not found" wording.

use regex::Regex;
use snafu::IntoError;
use std::sync::LazyLock;

use super::error::{InspectSnafu, PullError, PullSnafu};
use crate::store::StoreError;
use crate::types::ImageRef;

/// Matches the image-not-found error text the engine reports on pull.
pub const IMAGE_NOT_FOUND_PATTERN: &str = r"Error: image .+ not found";

static IMAGE_NOT_FOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(IMAGE_NOT_FOUND_PATTERN).expect("IMAGE_NOT_FOUND_PATTERN is a valid regex")
});

/// Turns a raw store failure into a [`PullError`] with a retry verdict.
///
/// Implementations must be pure: no retries, no side effects.
pub trait ErrorClassifier: Send + Sync {
    /// Whether a pull failure means the image does not exist.
    fn is_fatal_pull(&self, err: &StoreError) -> bool;

    fn classify_pull(&self, reference: &ImageRef, err: StoreError) -> PullError {
        PullSnafu {
            reference: reference.to_string(),
            recoverable: !self.is_fatal_pull(&err),
        }
        .into_error(err)
    }

    /// Inspect failures are infrastructure trouble, never "does not exist".
    fn classify_inspect(&self, reference: &ImageRef, err: StoreError) -> PullError {
        InspectSnafu {
            reference: reference.to_string(),
        }
        .into_error(err)
    }
}

/// Classifies by error text, and by the structured not-found status when
/// the store reports one.
///
/// Text matching depends on upstream message wording; prefer stores that
/// surface [`StoreError::NotFound`].
#[derive(Debug, Clone)]
pub struct MessageClassifier {
    not_found: Regex,
}

impl MessageClassifier {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            not_found: Regex::new(pattern)?,
        })
    }
}

impl Default for MessageClassifier {
    fn default() -> Self {
        Self {
            not_found: IMAGE_NOT_FOUND.clone(),
        }
    }
}

impl ErrorClassifier for MessageClassifier {
    fn is_fatal_pull(&self, err: &StoreError) -> bool {
        matches!(err, StoreError::NotFound(_)) || self.not_found.is_match(&err.to_string())
    }
}
