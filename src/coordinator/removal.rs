// ABOUTME: Delayed, cancellable removal of images whose last reference was released.
// ABOUTME: Races the grace delay against a cancellation token, then retries removal.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::store::{ImageStore, StoreError};
use crate::types::ImageId;

/// Removal calls made before giving up on an image.
pub const REMOVE_ATTEMPTS: u32 = 3;

/// How a removal task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RemovalOutcome {
    /// A fresh reference arrived before the delay elapsed.
    Cancelled,
    Removed,
    /// The store no longer had the image.
    AlreadyGone,
    /// The store refused because something still uses the image.
    InUse,
    /// Every attempt failed with an unclassified error.
    GaveUp,
}

#[derive(Debug)]
pub(crate) struct PendingRemoval {
    token: CancellationToken,
    generation: u64,
    armed_at: DateTime<Utc>,
}

/// What the caller needs to start the task it just armed.
#[derive(Debug)]
pub(crate) struct ArmedRemoval {
    pub(crate) token: CancellationToken,
    pub(crate) generation: u64,
}

/// Armed removal tasks keyed by image ID.
///
/// An entry exists exactly while its task is armed and has neither fired
/// to completion nor been cancelled.
#[derive(Debug, Default)]
pub(crate) struct PendingRemovals {
    pending: HashMap<ImageId, PendingRemoval>,
    next_generation: u64,
}

impl PendingRemovals {
    pub(crate) fn arm(&mut self, id: &ImageId) -> ArmedRemoval {
        self.next_generation += 1;
        let generation = self.next_generation;
        let token = CancellationToken::new();

        let previous = self.pending.insert(
            id.clone(),
            PendingRemoval {
                token: token.clone(),
                generation,
                armed_at: Utc::now(),
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
        }

        ArmedRemoval { token, generation }
    }

    /// Cancel the armed removal for `id`, if any.
    pub(crate) fn cancel(&mut self, id: &ImageId) -> bool {
        match self.pending.remove(id) {
            Some(pending) => {
                pending.token.cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        for (_, pending) in self.pending.drain() {
            pending.token.cancel();
        }
        cancelled
    }

    /// Clear the entry of a task that reached a terminal outcome.
    ///
    /// Only clears if the entry still belongs to that task's generation; a
    /// newer removal armed in the meantime is left in place.
    pub(crate) fn finish(&mut self, id: &ImageId, generation: u64) -> bool {
        if self
            .pending
            .get(id)
            .is_some_and(|pending| pending.generation == generation)
        {
            self.pending.remove(id);
            return true;
        }
        false
    }

    pub(crate) fn contains(&self, id: &ImageId) -> bool {
        self.pending.contains_key(id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&ImageId, DateTime<Utc>)> {
        self.pending.iter().map(|(id, pending)| (id, pending.armed_at))
    }
}

/// Body of a removal task.
///
/// Cancellation is only observed while waiting out the delay. Once removal
/// has started it runs its attempts to completion.
pub(crate) async fn run_removal(
    store: &dyn ImageStore,
    id: &ImageId,
    delay: Duration,
    token: &CancellationToken,
) -> RemovalOutcome {
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!(image_id = %id, "image removal cancelled");
            return RemovalOutcome::Cancelled;
        }
        _ = tokio::time::sleep(delay) => {}
    }

    for attempt in 1..=REMOVE_ATTEMPTS {
        match store.remove(id).await {
            Ok(()) => {
                debug!(image_id = %id, "cleanup removed downloaded image");
                return RemovalOutcome::Removed;
            }
            Err(StoreError::NotFound(_)) => {
                debug!(image_id = %id, "unable to cleanup image: does not exist");
                return RemovalOutcome::AlreadyGone;
            }
            Err(StoreError::InUse(_)) => {
                debug!(image_id = %id, "unable to cleanup image: still in use");
                return RemovalOutcome::InUse;
            }
            Err(e) => {
                debug!(image_id = %id, attempt, error = %e, "failed to remove image");
            }
        }
    }

    debug!(image_id = %id, attempts = REMOVE_ATTEMPTS, "giving up on image removal");
    RemovalOutcome::GaveUp
}
