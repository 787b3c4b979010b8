//! Identity client — password sign-in, sign-out, session queries.
//!
//! DESIGN
//! ======
//! Wraps the backend's token-grant auth API. Sign-in and token refresh
//! store the granted tokens locally and emit a [`SessionEvent`] to the
//! attached channel; the synchronizer reacts to those events rather than
//! being called directly, the same way every other consumer does.
//!
//! ERROR HANDLING
//! ==============
//! `current_session` maps 401/403 to `Ok(None)`: an expired or revoked
//! token means "signed out", not a failure. Remote logout is best-effort —
//! the local session is cleared and the sign-out event emitted even when
//! the revocation call fails.

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;

use std::sync::{Mutex, PoisonError};

use reqwest::StatusCode;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::config::BackendConfig;
use crate::provider::{IdentityProvider, ProviderError, Session, SessionEvent};

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Errors produced by sign-in/sign-out operations.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The backend rejected the email/password pair.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The operation needs a stored session and none exists.
    #[error("not signed in")]
    NotSignedIn,

    /// The HTTP request to the auth API failed.
    #[error("auth request failed: {0}")]
    Request(String),

    /// The auth API returned a non-success status.
    #[error("auth response error: status {status}")]
    Api { status: u16, body: String },

    /// The auth API response body could not be deserialized.
    #[error("auth response parse failed: {0}")]
    Parse(String),
}

#[derive(Debug, serde::Deserialize)]
struct AuthUser {
    id: String,
    email: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct GrantResponse {
    access_token: String,
    refresh_token: Option<String>,
    user: AuthUser,
}

impl GrantResponse {
    fn session(&self) -> Session {
        Session { user_id: self.user.id.clone(), email: self.user.email.clone() }
    }
}

struct TokenPair {
    access: String,
    refresh: Option<String>,
}

/// Auth client for the hosted identity provider.
pub struct HostedIdentity {
    config: BackendConfig,
    http: reqwest::Client,
    tokens: Mutex<Option<TokenPair>>,
    events: Mutex<Option<mpsc::Sender<SessionEvent>>>,
}

impl HostedIdentity {
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            tokens: Mutex::new(None),
            events: Mutex::new(None),
        }
    }

    /// Open the session-change stream. Events from sign-in, token refresh,
    /// and sign-out are delivered to the returned receiver; feed it to
    /// [`crate::sync::ProfileSync::attach_events`]. Opening a new stream
    /// replaces any previous one.
    #[must_use]
    pub fn event_stream(&self) -> mpsc::Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        *lock(&self.events) = Some(tx);
        rx
    }

    /// Exchange an email/password pair for a session.
    ///
    /// # Errors
    ///
    /// [`IdentityError::InvalidCredentials`] on a rejected pair, otherwise
    /// transport/response errors from the auth API.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.config.base_url);
        let resp = self
            .http
            .post(&url)
            .header("apikey", &self.config.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        if resp.status() == StatusCode::BAD_REQUEST || resp.status() == StatusCode::UNAUTHORIZED {
            return Err(IdentityError::InvalidCredentials);
        }
        let grant = Self::parse_grant(resp).await?;

        let session = grant.session();
        *lock(&self.tokens) = Some(TokenPair { access: grant.access_token, refresh: grant.refresh_token });
        self.emit(SessionEvent::SignedIn(session.clone())).await;
        Ok(session)
    }

    /// Trade the stored refresh token for a fresh session.
    ///
    /// # Errors
    ///
    /// [`IdentityError::NotSignedIn`] without a stored refresh token,
    /// otherwise transport/response errors from the auth API.
    pub async fn refresh_session(&self) -> Result<Session, IdentityError> {
        let refresh = lock(&self.tokens)
            .as_ref()
            .and_then(|t| t.refresh.clone())
            .ok_or(IdentityError::NotSignedIn)?;

        let url = format!("{}/auth/v1/token?grant_type=refresh_token", self.config.base_url);
        let resp = self
            .http
            .post(&url)
            .header("apikey", &self.config.api_key)
            .json(&serde_json::json!({ "refresh_token": refresh }))
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;
        let grant = Self::parse_grant(resp).await?;

        let session = grant.session();
        *lock(&self.tokens) = Some(TokenPair { access: grant.access_token, refresh: grant.refresh_token });
        self.emit(SessionEvent::TokenRefreshed(session.clone())).await;
        Ok(session)
    }

    /// End the session: revoke remotely (best-effort), drop the stored
    /// tokens, and emit [`SessionEvent::SignedOut`].
    pub async fn sign_out(&self) {
        let tokens = lock(&self.tokens).take();
        if let Some(tokens) = tokens {
            let url = format!("{}/auth/v1/logout", self.config.base_url);
            let result = self
                .http
                .post(&url)
                .header("apikey", &self.config.api_key)
                .bearer_auth(&tokens.access)
                .send()
                .await;
            if let Err(e) = result {
                debug!(error = %e, "remote logout failed; local session cleared anyway");
            }
        }
        self.emit(SessionEvent::SignedOut).await;
    }

    async fn parse_grant(resp: reqwest::Response) -> Result<GrantResponse, IdentityError> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(IdentityError::Api { status, body });
        }
        resp.json::<GrantResponse>()
            .await
            .map_err(|e| IdentityError::Parse(e.to_string()))
    }

    async fn emit(&self, event: SessionEvent) {
        let tx = lock(&self.events).as_ref().cloned();
        if let Some(tx) = tx {
            if tx.send(event).await.is_err() {
                warn!("session event receiver dropped; notification lost");
            }
        }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for HostedIdentity {
    async fn current_session(&self) -> Result<Option<Session>, ProviderError> {
        let access = match lock(&self.tokens).as_ref().map(|t| t.access.clone()) {
            Some(access) => access,
            None => return Ok(None),
        };

        let url = format!("{}/auth/v1/user", self.config.base_url);
        let resp = self
            .http
            .get(&url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(access)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if resp.status() == StatusCode::UNAUTHORIZED || resp.status() == StatusCode::FORBIDDEN {
            // Expired or revoked token: signed out, not an error.
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::UnexpectedResponse { status, body });
        }

        let user: AuthUser = resp
            .json()
            .await
            .map_err(|e| ProviderError::MalformedPayload(e.to_string()))?;
        Ok(Some(Session { user_id: user.id, email: user.email }))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
