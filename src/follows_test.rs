use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

// =============================================================================
// MockFollowBackend
// =============================================================================

#[derive(Default)]
struct MockFollowBackend {
    /// `(user_id, maestro_id)` pairs currently following.
    follows: Mutex<HashSet<(String, String)>>,
    fail: Mutex<bool>,
    read_calls: AtomicUsize,
    write_calls: AtomicUsize,
}

impl MockFollowBackend {
    fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn following(user_id: &str, maestro_id: &str) -> Arc<Self> {
        let backend = Self::default();
        backend
            .follows
            .lock()
            .unwrap()
            .insert((user_id.to_owned(), maestro_id.to_owned()));
        Arc::new(backend)
    }

    fn failing() -> Arc<Self> {
        let backend = Self::default();
        *backend.fail.lock().unwrap() = true;
        Arc::new(backend)
    }

    fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl FollowBackend for MockFollowBackend {
    async fn is_following(&self, user_id: &str, maestro_id: &str) -> Result<bool, ProviderError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock().unwrap() {
            return Err(ProviderError::Transport("connection refused".into()));
        }
        let key = (user_id.to_owned(), maestro_id.to_owned());
        Ok(self.follows.lock().unwrap().contains(&key))
    }

    async fn set_following(&self, user_id: &str, maestro_id: &str, following: bool) -> Result<(), ProviderError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock().unwrap() {
            return Err(ProviderError::Transport("connection refused".into()));
        }
        let key = (user_id.to_owned(), maestro_id.to_owned());
        let mut follows = self.follows.lock().unwrap();
        if following {
            follows.insert(key);
        } else {
            follows.remove(&key);
        }
        Ok(())
    }
}

// =============================================================================
// load
// =============================================================================

#[tokio::test]
async fn load_signed_out_resolves_false_without_backend_call() {
    let backend = MockFollowBackend::empty();
    let follows = FollowState::new(backend.clone());
    assert!(!follows.load(None, "m1").await);
    assert_eq!(backend.read_calls(), 0);
}

#[tokio::test]
async fn load_signed_out_does_not_pollute_cache() {
    let backend = MockFollowBackend::following("u1", "m1");
    let follows = FollowState::new(backend.clone());

    assert!(!follows.load(None, "m1").await);
    assert!(follows.status("m1").is_none());

    // A signed-in load afterwards still reaches the backend.
    assert!(follows.load(Some("u1"), "m1").await);
    assert_eq!(backend.read_calls(), 1);
}

#[tokio::test]
async fn load_caches_backend_result() {
    let backend = MockFollowBackend::following("u1", "m1");
    let follows = FollowState::new(backend.clone());

    assert!(follows.load(Some("u1"), "m1").await);
    assert!(follows.load(Some("u1"), "m1").await);
    assert_eq!(backend.read_calls(), 1);
    assert_eq!(follows.status("m1"), Some(true));
}

#[tokio::test]
async fn load_caches_per_maestro() {
    let backend = MockFollowBackend::following("u1", "m1");
    let follows = FollowState::new(backend.clone());

    assert!(follows.load(Some("u1"), "m1").await);
    assert!(!follows.load(Some("u1"), "m2").await);
    assert_eq!(backend.read_calls(), 2);
    assert_eq!(follows.status("m1"), Some(true));
    assert_eq!(follows.status("m2"), Some(false));
}

#[tokio::test]
async fn load_failure_cached_as_not_following() {
    let backend = MockFollowBackend::failing();
    let follows = FollowState::new(backend.clone());

    assert!(!follows.load(Some("u1"), "m1").await);
    assert_eq!(follows.status("m1"), Some(false));

    // Cached: the failed lookup is not retried.
    assert!(!follows.load(Some("u1"), "m1").await);
    assert_eq!(backend.read_calls(), 1);
}

// =============================================================================
// toggle
// =============================================================================

#[tokio::test]
async fn toggle_before_load_is_noop() {
    let backend = MockFollowBackend::empty();
    let follows = FollowState::new(backend.clone());

    assert_eq!(follows.toggle("u1", "m1").await.unwrap(), None);
    assert_eq!(backend.write_calls(), 0);
}

#[tokio::test]
async fn toggle_follows_then_unfollows() {
    let backend = MockFollowBackend::empty();
    let follows = FollowState::new(backend.clone());
    follows.load(Some("u1"), "m1").await;

    assert_eq!(follows.toggle("u1", "m1").await.unwrap(), Some(true));
    assert_eq!(follows.status("m1"), Some(true));
    assert!(backend.is_following("u1", "m1").await.unwrap());

    assert_eq!(follows.toggle("u1", "m1").await.unwrap(), Some(false));
    assert_eq!(follows.status("m1"), Some(false));
    assert!(!backend.is_following("u1", "m1").await.unwrap());
}

#[tokio::test]
async fn toggle_backend_error_leaves_cache_unchanged() {
    let backend = MockFollowBackend::empty();
    let follows = FollowState::new(backend.clone());
    follows.load(Some("u1"), "m1").await;

    *backend.fail.lock().unwrap() = true;
    assert!(follows.toggle("u1", "m1").await.is_err());
    assert_eq!(follows.status("m1"), Some(false));
}

// =============================================================================
// Subscriptions
// =============================================================================

#[tokio::test]
async fn subscriber_sees_load_and_toggle_updates() {
    let backend = MockFollowBackend::empty();
    let follows = FollowState::new(backend.clone());
    let mut rx = follows.subscribe("m1");
    assert_eq!(*rx.borrow_and_update(), None);

    follows.load(Some("u1"), "m1").await;
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), Some(false));

    follows.toggle("u1", "m1").await.unwrap();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), Some(true));
}

#[tokio::test]
async fn subscriber_starts_at_cached_value() {
    let backend = MockFollowBackend::following("u1", "m1");
    let follows = FollowState::new(backend);
    follows.load(Some("u1"), "m1").await;

    let mut rx = follows.subscribe("m1");
    assert_eq!(*rx.borrow_and_update(), Some(true));
}

#[tokio::test]
async fn subscribers_to_other_maestros_not_notified() {
    let backend = MockFollowBackend::empty();
    let follows = FollowState::new(backend);
    let rx_other = follows.subscribe("m2");

    follows.load(Some("u1"), "m1").await;
    assert!(!rx_other.has_changed().unwrap());
}

// =============================================================================
// clear
// =============================================================================

#[tokio::test]
async fn clear_wipes_cache_and_notifies() {
    let backend = MockFollowBackend::following("u1", "m1");
    let follows = FollowState::new(backend.clone());
    follows.load(Some("u1"), "m1").await;
    let mut rx = follows.subscribe("m1");

    follows.clear();
    assert!(follows.status("m1").is_none());
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), None);

    // After sign-in again the backend is consulted afresh.
    follows.load(Some("u1"), "m1").await;
    assert_eq!(backend.read_calls(), 2);
}
