//! Auth-session state shared across the client.
//!
//! SYSTEM CONTEXT
//! ==============
//! Used by route guards and user-aware components to coordinate login
//! redirects and identity-dependent rendering. Written only by
//! [`crate::sync::ProfileSync`]; everyone else holds read-only snapshots.

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};

use crate::provider::{ProfileFields, Session};

/// Whether a visitor is currently authenticated.
///
/// Starts at [`AuthStatus::Pending`] on process start and resolves once the
/// identity provider has been queried.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    /// The initial session query has not resolved yet.
    #[default]
    Pending,
    /// A session exists for the current visitor.
    Authenticated,
    /// No session exists (or the session query failed).
    Unauthenticated,
}

/// Cached, denormalized view of the signed-in user's public attributes.
///
/// `id` and `email` come straight from the session; `full_name` and
/// `avatar_url` are filled in from the profile record once the secondary
/// fetch completes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    /// Stable identifier issued by the identity provider.
    pub id: String,
    /// Email address, if the provider exposes one.
    pub email: Option<String>,
    /// Display name from the profile record.
    pub full_name: Option<String>,
    /// Avatar image URL from the profile record.
    pub avatar_url: Option<String>,
}

impl ProfileSummary {
    /// Build the provisional summary available before the profile fetch.
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        Self {
            id: session.user_id.clone(),
            email: session.email.clone(),
            full_name: None,
            avatar_url: None,
        }
    }

    /// Merge profile-record fields into the summary.
    #[must_use]
    pub fn with_fields(mut self, fields: ProfileFields) -> Self {
        self.full_name = fields.full_name;
        self.avatar_url = fields.avatar_url;
        self
    }
}

/// The atomically-swapped unit of shared state: status plus summary.
///
/// Invariant: `profile` is `None`, or holds at least the session-derived
/// fields. It is never present while `status` is
/// [`AuthStatus::Unauthenticated`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub status: AuthStatus,
    pub profile: Option<ProfileSummary>,
}

impl SyncSnapshot {
    /// Snapshot for a process that has not resolved its session yet.
    #[must_use]
    pub fn pending() -> Self {
        Self { status: AuthStatus::Pending, profile: None }
    }

    /// Snapshot for a signed-out visitor.
    #[must_use]
    pub fn signed_out() -> Self {
        Self { status: AuthStatus::Unauthenticated, profile: None }
    }

    /// True once a session has resolved for the current visitor.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated
    }
}
