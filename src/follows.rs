//! Follow-state cache for maestro follow buttons.
//!
//! DESIGN
//! ======
//! Every surface showing a follow button for the same maestro must agree on
//! its state, so "does the viewer follow maestro X" is cached process-wide
//! and loaded through [`FollowBackend`] at most once per maestro. Each
//! maestro gets a `watch` channel carrying `Option<bool>`: `None` while
//! unknown, `Some` once loaded or toggled. Toggles write the backend first
//! and update the cache only on success.

#[cfg(test)]
#[path = "follows_test.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::warn;

use crate::provider::ProviderError;

/// Remote reads/writes for follow relationships.
#[async_trait::async_trait]
pub trait FollowBackend: Send + Sync {
    /// Whether `user_id` currently follows `maestro_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the backend could not be reached or
    /// answered unexpectedly.
    async fn is_following(&self, user_id: &str, maestro_id: &str) -> Result<bool, ProviderError>;

    /// Create or remove the follow relationship.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the write failed; the cache is left
    /// untouched in that case.
    async fn set_following(&self, user_id: &str, maestro_id: &str, following: bool) -> Result<(), ProviderError>;
}

struct FollowStateInner {
    /// Known follow status per maestro id.
    cache: HashMap<String, bool>,
    /// Notification channel per maestro id, created on first subscribe.
    channels: HashMap<String, watch::Sender<Option<bool>>>,
}

/// Process-wide follow-status cache, shared by cloning.
#[derive(Clone)]
pub struct FollowState {
    backend: Arc<dyn FollowBackend>,
    shared: Arc<Mutex<FollowStateInner>>,
}

impl FollowState {
    #[must_use]
    pub fn new(backend: Arc<dyn FollowBackend>) -> Self {
        Self {
            backend,
            shared: Arc::new(Mutex::new(FollowStateInner {
                cache: HashMap::new(),
                channels: HashMap::new(),
            })),
        }
    }

    /// Cached status for `maestro_id`; `None` while unknown.
    #[must_use]
    pub fn status(&self, maestro_id: &str) -> Option<bool> {
        self.lock_inner().cache.get(maestro_id).copied()
    }

    /// Register for status changes of one maestro. The receiver starts at
    /// the cached value. Drop the receiver to unsubscribe.
    #[must_use]
    pub fn subscribe(&self, maestro_id: &str) -> watch::Receiver<Option<bool>> {
        let mut inner = self.lock_inner();
        let initial = inner.cache.get(maestro_id).copied();
        inner
            .channels
            .entry(maestro_id.to_owned())
            .or_insert_with(|| watch::channel(initial).0)
            .subscribe()
    }

    /// Resolve the follow status for `maestro_id`, loading through the
    /// backend on a cache miss.
    ///
    /// `viewer` is the signed-in user's id; signed-out viewers resolve to
    /// not-following without a backend call and without polluting the
    /// cache. A failed lookup is cached as not-following.
    pub async fn load(&self, viewer: Option<&str>, maestro_id: &str) -> bool {
        if let Some(value) = self.status(maestro_id) {
            return value;
        }

        let Some(user_id) = viewer else {
            self.publish(maestro_id, Some(false));
            return false;
        };

        let value = match self.backend.is_following(user_id, maestro_id).await {
            Ok(value) => value,
            Err(e) => {
                warn!(maestro_id = %maestro_id, error = %e, "follow lookup failed");
                false
            }
        };

        self.store(maestro_id, value);
        value
    }

    /// Flip the follow relationship for `maestro_id`.
    ///
    /// Returns `Ok(None)` without touching the backend while the current
    /// status is still unknown (mirroring a button that is disabled until
    /// loaded), `Ok(Some(next))` after a successful write.
    ///
    /// # Errors
    ///
    /// Propagates the backend write error; cache and subscribers keep the
    /// previous value.
    pub async fn toggle(&self, user_id: &str, maestro_id: &str) -> Result<Option<bool>, ProviderError> {
        let Some(current) = self.status(maestro_id) else {
            return Ok(None);
        };
        let next = !current;

        self.backend.set_following(user_id, maestro_id, next).await?;

        self.store(maestro_id, next);
        Ok(Some(next))
    }

    /// Forget everything, e.g. on sign-out. Subscribers observe `None`.
    pub fn clear(&self) {
        let mut inner = self.lock_inner();
        inner.cache.clear();
        for tx in inner.channels.values() {
            tx.send_replace(None);
        }
    }

    fn store(&self, maestro_id: &str, value: bool) {
        let mut inner = self.lock_inner();
        inner.cache.insert(maestro_id.to_owned(), value);
        if let Some(tx) = inner.channels.get(maestro_id) {
            tx.send_replace(Some(value));
        }
    }

    fn publish(&self, maestro_id: &str, value: Option<bool>) {
        let inner = self.lock_inner();
        if let Some(tx) = inner.channels.get(maestro_id) {
            tx.send_replace(value);
        }
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, FollowStateInner> {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
