// ABOUTME: Pull deduplication: one in-flight fetch per image reference.
// ABOUTME: A watch-channel result cell is resolved once and observed by every waiter.

use std::collections::HashMap;

use tokio::sync::watch;
use tracing::{debug, error};

use super::classify::ErrorClassifier;
use super::error::{AbandonedSnafu, PullError};
use crate::store::{ImageStore, RegistryAuth};
use crate::types::{ImageId, ImageRef};

pub(crate) type PullOutcome = Result<ImageId, PullError>;

/// Shared handle on the result of one underlying pull.
///
/// Cloning is cheap; every clone observes the same resolved value.
#[derive(Debug, Clone)]
pub(crate) struct PullFuture {
    reference: ImageRef,
    rx: watch::Receiver<Option<PullOutcome>>,
}

impl PullFuture {
    pub(crate) fn is_resolved(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Suspend until the pull resolves.
    ///
    /// If the writer goes away without resolving (the pull task panicked or
    /// the runtime shut down), waiters get a recoverable
    /// [`PullError::Abandoned`].
    pub(crate) async fn wait(&self) -> PullOutcome {
        let mut rx = self.rx.clone();
        let outcome = match rx.wait_for(|value| value.is_some()).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };

        outcome.unwrap_or_else(|| {
            Err(AbandonedSnafu {
                reference: self.reference.to_string(),
            }
            .build())
        })
    }

    /// The writer is gone and never resolved the cell.
    fn is_abandoned(&self) -> bool {
        !self.is_resolved() && self.rx.has_changed().is_err()
    }
}

/// The single writer of a [`PullFuture`]. Resolving consumes it.
#[derive(Debug)]
pub(crate) struct PullResolver {
    generation: u64,
    tx: watch::Sender<Option<PullOutcome>>,
}

impl PullResolver {
    fn resolve(self, outcome: PullOutcome) {
        // send_replace stores the value even when no waiter is subscribed.
        self.tx.send_replace(Some(outcome));
    }
}

/// Result of asking for a pull future.
#[derive(Debug)]
pub(crate) enum Acquired {
    /// A pull for this reference is already in flight.
    Joined(PullFuture),
    /// No pull was in flight; the caller must run one and resolve it.
    Started(PullFuture, PullResolver),
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    future: PullFuture,
}

/// In-flight pulls keyed by canonical image reference.
///
/// Entries are removed when resolved, so the map only ever holds pulls that
/// are still running.
#[derive(Debug, Default)]
pub(crate) struct InFlightPulls {
    pulls: HashMap<ImageRef, InFlight>,
    next_generation: u64,
}

impl InFlightPulls {
    pub(crate) fn acquire(&mut self, reference: &ImageRef) -> Acquired {
        if let Some(existing) = self.pulls.get(reference) {
            if !existing.future.is_abandoned() {
                return Acquired::Joined(existing.future.clone());
            }
            debug!(image = %reference, "replacing abandoned pull");
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let (tx, rx) = watch::channel(None);
        let future = PullFuture {
            reference: reference.clone(),
            rx,
        };
        self.pulls.insert(
            reference.clone(),
            InFlight {
                generation,
                future: future.clone(),
            },
        );

        Acquired::Started(future, PullResolver { generation, tx })
    }

    /// Drop the entry owned by `resolver`, then resolve it.
    ///
    /// Both happen under the caller's lock, so no acquirer can join a future
    /// after it leaves the map without also seeing it resolved.
    pub(crate) fn complete(
        &mut self,
        reference: &ImageRef,
        resolver: PullResolver,
        outcome: PullOutcome,
    ) {
        if self
            .pulls
            .get(reference)
            .is_some_and(|entry| entry.generation == resolver.generation)
        {
            self.pulls.remove(reference);
        }
        resolver.resolve(outcome);
    }

    /// Whether a live pull is in flight. Abandoned entries do not count.
    pub(crate) fn contains(&self, reference: &ImageRef) -> bool {
        self.pulls
            .get(reference)
            .is_some_and(|entry| !entry.future.is_abandoned())
    }

    pub(crate) fn references(&self) -> impl Iterator<Item = &ImageRef> {
        self.pulls
            .iter()
            .filter(|(_, entry)| !entry.future.is_abandoned())
            .map(|(reference, _)| reference)
    }
}

/// Body of the background pull task: pull, then inspect for the image ID.
///
/// Inspect is never attempted after a failed pull.
pub(crate) async fn fetch(
    store: &dyn ImageStore,
    classifier: &dyn ErrorClassifier,
    reference: &ImageRef,
    auth: Option<&RegistryAuth>,
) -> PullOutcome {
    let repository = reference.repository();
    let tag = reference.pull_tag();

    if let Err(e) = store.pull(&repository, tag, auth).await {
        error!(image = %reference, error = %e, "failed pulling image");
        return Err(classifier.classify_pull(reference, e));
    }
    debug!(image = %reference, "image pull succeeded");

    match store.inspect(reference).await {
        Ok(id) => Ok(id),
        Err(e) => {
            error!(image = %reference, error = %e, "failed getting image id");
            Err(classifier.classify_inspect(reference, e))
        }
    }
}
