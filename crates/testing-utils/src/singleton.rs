//! Create-once, share-everywhere cell for expensive test infrastructure.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

/// Holds at most one `Arc<T>`, built by the first caller of [`SharedCell::get_or_try_init`].
///
/// Uses double-checked locking: a cheap read of the slot, then the init lock,
/// then a second read before running the initializer. Concurrent first callers
/// block on the init lock and all observe the same instance. A failed
/// initializer leaves the cell empty.
pub struct SharedCell<T> {
    slot: RwLock<Option<Arc<T>>>,
    init_lock: Mutex<()>,
}

impl<T> SharedCell<T> {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
            init_lock: Mutex::new(()),
        }
    }

    pub async fn get(&self) -> Option<Arc<T>> {
        self.slot.read().await.clone()
    }

    pub async fn get_or_try_init<F, Fut, E>(&self, init: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(existing) = self.get().await {
            return Ok(existing);
        }

        let _guard = self.init_lock.lock().await;

        // another caller may have finished while we waited for the lock
        if let Some(existing) = self.get().await {
            return Ok(existing);
        }

        let instance = Arc::new(init().await?);
        *self.slot.write().await = Some(Arc::clone(&instance));
        Ok(instance)
    }

    /// Removes the instance so it can be torn down. Waits for any in-flight init.
    ///
    /// Succeeds only when the cell holds the last handle; otherwise the
    /// instance stays in place and the number of other handles is returned.
    pub async fn take_unique(&self) -> Result<Option<T>, usize> {
        let _guard = self.init_lock.lock().await;
        let mut slot = self.slot.write().await;

        let Some(instance) = slot.take() else {
            return Ok(None);
        };
        match Arc::try_unwrap(instance) {
            Ok(value) => Ok(Some(value)),
            Err(shared) => {
                let others = Arc::strong_count(&shared) - 1;
                *slot = Some(shared);
                Err(others)
            }
        }
    }
}

impl<T> Default for SharedCell<T> {
    fn default() -> Self {
        Self::new()
    }
}
