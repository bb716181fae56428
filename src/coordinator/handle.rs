// ABOUTME: Coordinator composition root and sole public surface.
// ABOUTME: One lock guards pulls, counts and pending removals; store calls run unlocked.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use super::classify::{ErrorClassifier, MessageClassifier};
use super::error::PullError;
use super::pull::{self, Acquired, InFlightPulls, PullResolver};
use super::refcount::{Decrement, ReferenceCounts};
use super::removal::{self, ArmedRemoval, PendingRemovals, RemovalOutcome};
use crate::store::{ImageStore, RegistryAuth};
use crate::types::{ImageId, ImageRef};

/// Grace period between an image's last release and its removal.
pub const DEFAULT_REMOVE_DELAY: Duration = Duration::from_secs(3 * 60);

/// Coordinator behaviour fixed at construction.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Count references and remove unreferenced images.
    pub cleanup: bool,
    /// Delay between the count reaching zero and the removal attempt.
    pub remove_delay: Duration,
    /// Credentials used when a pull is requested without any.
    pub auth: Option<RegistryAuth>,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            cleanup: true,
            remove_delay: DEFAULT_REMOVE_DELAY,
            auth: None,
        }
    }
}

/// Point-in-time view of the coordinator's bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorSnapshot {
    pub references: HashMap<ImageId, u32>,
    pub pending_removals: Vec<PendingRemovalInfo>,
    pub pulls_in_flight: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingRemovalInfo {
    pub image_id: ImageId,
    pub armed_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    pulls: InFlightPulls,
    counts: ReferenceCounts,
    removals: PendingRemovals,
}

struct Inner {
    settings: CoordinatorSettings,
    store: Arc<dyn ImageStore>,
    classifier: Arc<dyn ErrorClassifier>,
    state: Mutex<State>,
}

/// Coordinates pulls and removals of images shared by concurrent tasks.
///
/// Build one per process at startup and hand out clones; every clone shares
/// the same state. Background pulls and removals are spawned onto the
/// current Tokio runtime, so the coordinator must be used from within one.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    pub fn new(settings: CoordinatorSettings, store: Arc<dyn ImageStore>) -> Self {
        Self::with_classifier(settings, store, Arc::new(MessageClassifier::default()))
    }

    pub fn with_classifier(
        settings: CoordinatorSettings,
        store: Arc<dyn ImageStore>,
        classifier: Arc<dyn ErrorClassifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                store,
                classifier,
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.inner.settings
    }

    /// Pull an image and return its ID, sharing one underlying pull between
    /// all concurrent callers of the same reference.
    ///
    /// The first caller's credentials are used for the shared pull; without
    /// any, the configured default credentials apply. With cleanup enabled a
    /// successful pull also takes a reference on the image, which the caller
    /// must hand back with [`release_reference`](Self::release_reference).
    pub async fn pull_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<ImageId, PullError> {
        let acquired = self.inner.state.lock().pulls.acquire(reference);

        let future = match acquired {
            Acquired::Joined(future) => future,
            Acquired::Started(future, resolver) => {
                let auth = auth.or(self.inner.settings.auth.as_ref()).cloned();
                self.spawn_pull(reference.clone(), auth, resolver);
                future
            }
        };

        let id = future.wait().await?;

        if self.inner.settings.cleanup {
            self.increment_reference(&id, reference);
        }

        Ok(id)
    }

    /// Record one more user of `id`, cancelling any pending removal.
    pub fn increment_reference(&self, id: &ImageId, reference: &ImageRef) {
        let mut state = self.inner.state.lock();
        let count = state.counts.increment(id);
        debug!(image = %reference, image_id = %id, count, "image reference count incremented");

        if state.removals.cancel(id) {
            debug!(image = %reference, image_id = %id, "cancelling removal of image");
        }
    }

    /// Drop one user of `id`. The last release arms a delayed removal.
    ///
    /// Releasing an ID that is not reference counted only logs a warning.
    pub fn release_reference(&self, id: &ImageId) {
        let armed = {
            let mut state = self.inner.state.lock();
            match state.counts.decrement(id) {
                Decrement::Untracked => {
                    warn!(image_id = %id, "release of image that is not reference counted");
                    return;
                }
                Decrement::Remaining(count) => {
                    debug!(image_id = %id, count, "image reference count decremented");
                    return;
                }
                Decrement::Released => {
                    debug!(image_id = %id, count = 0, "image reference count decremented");
                    if !self.inner.settings.cleanup {
                        return;
                    }
                    state.removals.arm(id)
                }
            }
        };

        self.spawn_removal(id.clone(), armed);
    }

    pub fn reference_count(&self, id: &ImageId) -> Option<u32> {
        self.inner.state.lock().counts.get(id)
    }

    pub fn is_removal_pending(&self, id: &ImageId) -> bool {
        self.inner.state.lock().removals.contains(id)
    }

    pub fn is_pull_in_flight(&self, reference: &ImageRef) -> bool {
        self.inner.state.lock().pulls.contains(reference)
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        let state = self.inner.state.lock();

        let references = state
            .counts
            .iter()
            .map(|(id, count)| (id.clone(), count))
            .collect();

        let mut pending_removals: Vec<_> = state
            .removals
            .iter()
            .map(|(id, armed_at)| PendingRemovalInfo {
                image_id: id.clone(),
                armed_at,
            })
            .collect();
        pending_removals.sort_by_key(|info| info.armed_at);

        let mut pulls_in_flight: Vec<_> =
            state.pulls.references().map(ToString::to_string).collect();
        pulls_in_flight.sort();

        CoordinatorSnapshot {
            references,
            pending_removals,
            pulls_in_flight,
        }
    }

    /// Cancel every armed removal. Returns how many were cancelled.
    ///
    /// Removals already contacting the store are not interrupted.
    pub fn shutdown(&self) -> usize {
        let cancelled = self.inner.state.lock().removals.cancel_all();
        if cancelled > 0 {
            debug!(cancelled, "cancelled pending image removals");
        }
        cancelled
    }

    fn spawn_pull(&self, reference: ImageRef, auth: Option<RegistryAuth>, resolver: PullResolver) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = pull::fetch(
                inner.store.as_ref(),
                inner.classifier.as_ref(),
                &reference,
                auth.as_ref(),
            )
            .await;
            inner.state.lock().pulls.complete(&reference, resolver, outcome);
        });
    }

    fn spawn_removal(&self, id: ImageId, armed: ArmedRemoval) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = removal::run_removal(
                inner.store.as_ref(),
                &id,
                inner.settings.remove_delay,
                &armed.token,
            )
            .await;

            // A cancelled task's entry was already removed by the canceller.
            if outcome != RemovalOutcome::Cancelled {
                inner.state.lock().removals.finish(&id, armed.generation);
            }
        });
    }
}
