//! Hosted-backend configuration loaded from environment.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

const BACKEND_URL_ENV: &str = "KELAS_BACKEND_URL";
const BACKEND_KEY_ENV: &str = "KELAS_BACKEND_KEY";

/// Connection settings for the hosted backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendConfig {
    /// Backend origin, without a trailing slash.
    pub base_url: String,
    /// Publishable API key sent with every request.
    pub api_key: String,
}

impl BackendConfig {
    /// Build a config, trimming any trailing slash off the base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
        }
    }

    /// Load from `KELAS_BACKEND_URL` / `KELAS_BACKEND_KEY`.
    /// Returns `None` if either is missing (backend access disabled).
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var(BACKEND_URL_ENV).ok()?;
        let api_key = std::env::var(BACKEND_KEY_ENV).ok()?;
        Some(Self::new(base_url, api_key))
    }
}
