//! Contracts for the hosted identity provider and profile store.
//!
//! ARCHITECTURE
//! ============
//! The synchronizer never talks HTTP directly; it consumes these traits.
//! `services::identity` and `services::profiles` provide the real
//! backend-facing implementations, tests provide mocks. Session change
//! notifications arrive as [`SessionEvent`] values over an mpsc channel
//! rather than a callback set, so delivery order is explicit.

#[cfg(test)]
#[path = "provider_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};

/// The authenticated-identity record for the current visitor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Stable subject identifier. Opaque; the provider owns the format.
    pub user_id: String,
    /// Email address, if the provider exposes one.
    pub email: Option<String>,
}

/// A change notification pushed by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new session was established.
    SignedIn(Session),
    /// An existing session had its token refreshed.
    TokenRefreshed(Session),
    /// The session ended.
    SignedOut,
}

impl SessionEvent {
    /// Short event name for log records.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SignedIn(_) => "signed_in",
            Self::TokenRefreshed(_) => "token_refreshed",
            Self::SignedOut => "signed_out",
        }
    }
}

/// Fields read from the secondary profile record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFields {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Errors produced by remote identity/profile reads.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The request never reached the backend (DNS, connect, TLS).
    #[error("transport error: {0}")]
    Transport(String),
    /// The backend answered with a non-success status.
    #[error("unexpected response: status {status}")]
    UnexpectedResponse { status: u16, body: String },
    /// The response body could not be deserialized.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// One-shot session queries against the identity provider.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Return the current session, or `None` when signed out.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the provider could not be reached or
    /// answered unexpectedly. Callers that only need "signed in or not"
    /// treat errors the same as `None`.
    async fn current_session(&self) -> Result<Option<Session>, ProviderError>;
}

/// Primary-key reads against the profile record store.
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the profile fields for `user_id`; `Ok(None)` when no row exists.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the store could not be reached or
    /// answered unexpectedly.
    async fn fetch_profile_fields(&self, user_id: &str) -> Result<Option<ProfileFields>, ProviderError>;
}
