//! Session/profile synchronizer — the single source of truth for "who is
//! signed in, and what do we know about them".
//!
//! DESIGN
//! ======
//! One `ProfileSync` instance per process, cloned into every consumer.
//! The current [`SyncSnapshot`] lives in a `tokio::sync::watch` channel:
//! reads are lock-free borrows, updates are whole-snapshot swaps, and
//! subscribers observe swaps in order. A resolve pass queries the identity
//! provider, publishes a provisional session-only summary immediately, then
//! enriches it from the profile store without blocking consumers.
//!
//! At most one resolve pass is in flight at a time; triggers arriving
//! mid-flight are dropped, not queued. An epoch counter fences stale
//! results: sign-out bumps the epoch, so a profile fetch that was already
//! running can never resurrect the cleared summary.
//!
//! ERROR HANDLING
//! ==============
//! A failed session query downgrades to "signed out" rather than an error
//! state, so the UI never hangs on a spinner. A failed profile fetch is
//! logged and swallowed; the session-only summary stays usable.

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::provider::{IdentityProvider, ProfileStore, SessionEvent};
use crate::state::{AuthStatus, ProfileSummary, SyncSnapshot};

/// What a call to [`ProfileSync::refresh`] actually did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// This call ran the resolve pass to completion.
    Refreshed,
    /// Another resolve pass was already in flight; this call did nothing.
    AlreadyInFlight,
}

#[derive(Default)]
struct Guard {
    /// Bumped on every accepted refresh and every sign-out. Results from a
    /// pass whose epoch is no longer current are discarded.
    epoch: u64,
    in_flight: bool,
}

struct Shared {
    snapshot: watch::Sender<SyncSnapshot>,
    guard: Mutex<Guard>,
}

/// Process-wide session/profile state, shared by cloning.
#[derive(Clone)]
pub struct ProfileSync {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    shared: Arc<Shared>,
}

impl ProfileSync {
    /// Create a synchronizer in the [`AuthStatus::Pending`] state.
    ///
    /// Call [`ProfileSync::refresh`] once at startup to resolve the initial
    /// session, and [`ProfileSync::attach_events`] to follow provider
    /// notifications after that.
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        let (snapshot, _) = watch::channel(SyncSnapshot::pending());
        Self {
            identity,
            profiles,
            shared: Arc::new(Shared { snapshot, guard: Mutex::new(Guard::default()) }),
        }
    }

    /// Latest known state, for rendering. Never blocks on the network.
    #[must_use]
    pub fn current_state(&self) -> SyncSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Register for state-change notifications.
    ///
    /// Each snapshot swap is delivered in order; a receiver that falls
    /// behind skips straight to the latest snapshot. Drop the receiver to
    /// unsubscribe.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Force a re-fetch of session and profile data.
    ///
    /// Idempotent: while a resolve pass is already running this is a no-op
    /// and returns [`RefreshOutcome::AlreadyInFlight`], so concurrent calls
    /// collapse into a single network sequence.
    pub async fn refresh(&self) -> RefreshOutcome {
        let epoch = {
            let mut guard = self.lock_guard();
            if guard.in_flight {
                return RefreshOutcome::AlreadyInFlight;
            }
            guard.in_flight = true;
            guard.epoch += 1;
            guard.epoch
        };

        self.resolve(epoch).await;

        self.lock_guard().in_flight = false;
        RefreshOutcome::Refreshed
    }

    /// Apply one provider notification.
    ///
    /// Session-establishing events run the guarded resolve pass; a
    /// session-ending event clears state immediately, without any network
    /// wait.
    pub async fn handle_event(&self, event: SessionEvent) {
        let kind = event.kind();
        match event {
            SessionEvent::SignedIn(_) | SessionEvent::TokenRefreshed(_) => {
                if self.refresh().await == RefreshOutcome::AlreadyInFlight {
                    debug!(kind, "session event dropped: resolve already in flight");
                }
            }
            SessionEvent::SignedOut => self.clear(),
        }
    }

    /// Spawn a background task that feeds provider notifications into
    /// [`ProfileSync::handle_event`]. The task ends when the sender side of
    /// `events` is dropped.
    pub fn attach_events(&self, mut events: mpsc::Receiver<SessionEvent>) -> JoinHandle<()> {
        let sync = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                sync.handle_event(event).await;
            }
            debug!("session event stream closed");
        })
    }

    async fn resolve(&self, epoch: u64) {
        let session = match self.identity.current_session().await {
            Ok(Some(session)) => session,
            Ok(None) => {
                self.apply(epoch, SyncSnapshot::signed_out());
                return;
            }
            Err(e) => {
                debug!(error = %e, "session query failed; treating as signed out");
                self.apply(epoch, SyncSnapshot::signed_out());
                return;
            }
        };

        // Provisional summary: session fields now, profile fields later. A
        // refresh for the same user keeps the already-enriched summary so
        // name/avatar do not blank out mid-refresh.
        let provisional = match self.current_state().profile {
            Some(existing) if existing.id == session.user_id => existing,
            _ => ProfileSummary::from_session(&session),
        };
        let applied = self.apply(
            epoch,
            SyncSnapshot { status: AuthStatus::Authenticated, profile: Some(provisional) },
        );
        if !applied {
            return;
        }

        match self.profiles.fetch_profile_fields(&session.user_id).await {
            Ok(fields) => {
                // No profile row clears back to session-only fields.
                let summary = ProfileSummary::from_session(&session).with_fields(fields.unwrap_or_default());
                self.apply(
                    epoch,
                    SyncSnapshot { status: AuthStatus::Authenticated, profile: Some(summary) },
                );
            }
            Err(e) => {
                warn!(user_id = %session.user_id, error = %e, "profile enrichment failed; keeping session summary");
            }
        }
    }

    /// Swap the snapshot if `epoch` is still current. The guard lock is held
    /// across the swap so an epoch check and its publish are atomic with
    /// respect to [`ProfileSync::clear`].
    fn apply(&self, epoch: u64, snapshot: SyncSnapshot) -> bool {
        let guard = self.lock_guard();
        if guard.epoch != epoch {
            debug!("discarding stale resolve result");
            return false;
        }
        self.shared.snapshot.send_replace(snapshot);
        true
    }

    fn clear(&self) {
        let mut guard = self.lock_guard();
        guard.epoch += 1;
        self.shared.snapshot.send_replace(SyncSnapshot::signed_out());
    }

    fn lock_guard(&self) -> std::sync::MutexGuard<'_, Guard> {
        self.shared
            .guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
