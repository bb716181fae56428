// ABOUTME: Test support utilities.
// ABOUTME: Provides a scripted in-memory image store and tracing setup.

use async_trait::async_trait;
use imagekeeper::store::{ImageStore, RegistryAuth, StoreError};
use imagekeeper::types::{ImageId, ImageRef};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::from_default_env().add_directive("imagekeeper=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A recorded call to [`ImageStore::pull`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullCall {
    pub repository: String,
    pub tag: String,
    pub auth: Option<RegistryAuth>,
}

/// In-memory image store with scripted results and call counters.
///
/// Pulls succeed and inspect returns the configured ID unless scripted
/// otherwise. Scripted removal results are consumed in order; once the
/// script is exhausted, removals succeed.
pub struct MockStore {
    image_id: ImageId,
    pull_delay: Duration,
    remove_delay: Duration,
    pull_error: Mutex<Option<StoreError>>,
    inspect_error: Mutex<Option<StoreError>>,
    remove_script: Mutex<VecDeque<Result<(), StoreError>>>,
    pull_calls: Mutex<Vec<PullCall>>,
    inspect_calls: AtomicUsize,
    remove_calls: Mutex<Vec<ImageId>>,
}

#[allow(dead_code)]
impl MockStore {
    pub fn new(image_id: &str) -> Self {
        Self {
            image_id: ImageId::new(image_id),
            pull_delay: Duration::ZERO,
            remove_delay: Duration::ZERO,
            pull_error: Mutex::new(None),
            inspect_error: Mutex::new(None),
            remove_script: Mutex::new(VecDeque::new()),
            pull_calls: Mutex::new(Vec::new()),
            inspect_calls: AtomicUsize::new(0),
            remove_calls: Mutex::new(Vec::new()),
        }
    }

    /// Make every pull take `delay` so concurrent callers overlap.
    pub fn with_pull_delay(mut self, delay: Duration) -> Self {
        self.pull_delay = delay;
        self
    }

    /// Make every removal attempt take `delay` before its scripted result.
    pub fn with_remove_delay(mut self, delay: Duration) -> Self {
        self.remove_delay = delay;
        self
    }

    pub fn fail_pull(self, err: StoreError) -> Self {
        *self.pull_error.lock() = Some(err);
        self
    }

    pub fn fail_inspect(self, err: StoreError) -> Self {
        *self.inspect_error.lock() = Some(err);
        self
    }

    pub fn script_removals(self, results: Vec<Result<(), StoreError>>) -> Self {
        *self.remove_script.lock() = results.into();
        self
    }

    pub fn pull_calls(&self) -> Vec<PullCall> {
        self.pull_calls.lock().clone()
    }

    pub fn pull_count(&self) -> usize {
        self.pull_calls.lock().len()
    }

    pub fn inspect_count(&self) -> usize {
        self.inspect_calls.load(Ordering::SeqCst)
    }

    pub fn removed(&self) -> Vec<ImageId> {
        self.remove_calls.lock().clone()
    }

    pub fn remove_count(&self) -> usize {
        self.remove_calls.lock().len()
    }
}

#[async_trait]
impl ImageStore for MockStore {
    async fn pull(
        &self,
        repository: &str,
        tag: &str,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), StoreError> {
        self.pull_calls.lock().push(PullCall {
            repository: repository.to_string(),
            tag: tag.to_string(),
            auth: auth.cloned(),
        });

        if !self.pull_delay.is_zero() {
            tokio::time::sleep(self.pull_delay).await;
        }

        let scripted = self.pull_error.lock().clone();
        match scripted {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn inspect(&self, _reference: &ImageRef) -> Result<ImageId, StoreError> {
        self.inspect_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.inspect_error.lock().clone();
        match scripted {
            Some(err) => Err(err),
            None => Ok(self.image_id.clone()),
        }
    }

    async fn remove(&self, id: &ImageId) -> Result<(), StoreError> {
        self.remove_calls.lock().push(id.clone());

        if !self.remove_delay.is_zero() {
            tokio::time::sleep(self.remove_delay).await;
        }

        let scripted = self.remove_script.lock().pop_front();
        scripted.unwrap_or(Ok(()))
    }
}
