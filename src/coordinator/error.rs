// ABOUTME: Pull error taxonomy with a recoverability verdict.
// ABOUTME: Uses SNAFU so callers branch on kind() rather than message text.

use snafu::Snafu;

use crate::store::StoreError;

/// Failure of a coordinated pull, shared by every waiter on the same future.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PullError {
    #[snafu(display("failed to pull `{reference}`: {source}"))]
    Pull {
        reference: String,
        source: StoreError,
        recoverable: bool,
    },

    #[snafu(display("failed to inspect `{reference}`: {source}"))]
    Inspect {
        reference: String,
        source: StoreError,
    },

    #[snafu(display("pull of `{reference}` ended before producing a result"))]
    Abandoned { reference: String },
}

/// Whether a failed pull is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullErrorKind {
    /// Transient failure; retrying the whole pull may succeed.
    Recoverable,
    /// The image does not exist at the registry.
    Fatal,
}

impl PullError {
    pub fn kind(&self) -> PullErrorKind {
        match self {
            PullError::Pull {
                recoverable: false, ..
            } => PullErrorKind::Fatal,
            _ => PullErrorKind::Recoverable,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind() == PullErrorKind::Recoverable
    }

    /// The reference the failed pull was for.
    pub fn reference(&self) -> &str {
        match self {
            PullError::Pull { reference, .. }
            | PullError::Inspect { reference, .. }
            | PullError::Abandoned { reference } => reference,
        }
    }

    /// The raw store failure, when there is one.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            PullError::Pull { source, .. } | PullError::Inspect { source, .. } => Some(source),
            PullError::Abandoned { .. } => None,
        }
    }
}
