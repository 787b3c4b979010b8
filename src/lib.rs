//! Client-side session, profile, and follow state for Kelas Nusantara.
//!
//! ARCHITECTURE
//! ============
//! All persistence and authentication live in a hosted backend; this crate
//! is the state layer UI shells embed on top of it. [`sync::ProfileSync`]
//! owns the "who is signed in" snapshot shared by navigation chrome,
//! profile views, and gated actions. [`follows::FollowState`] caches
//! follow/unfollow status per maestro. The `services` module holds the
//! HTTP clients for the backend's auth and profile endpoints; everything
//! above them talks through the traits in [`provider`] so tests and
//! alternative backends can swap in.

pub mod follows;
pub mod media;
pub mod provider;
pub mod services;
pub mod state;
pub mod sync;

pub use provider::{IdentityProvider, ProfileFields, ProfileStore, ProviderError, Session, SessionEvent};
pub use state::{AuthStatus, ProfileSummary, SyncSnapshot};
pub use sync::{ProfileSync, RefreshOutcome};
