//! Profile-record reads against the backend's table API.

#[cfg(test)]
#[path = "profiles_test.rs"]
mod tests;

use super::config::BackendConfig;
use crate::provider::{ProfileFields, ProfileStore, ProviderError};

#[derive(Debug, serde::Deserialize)]
struct ProfileRow {
    full_name: Option<String>,
    avatar_url: Option<String>,
}

/// The table API answers single-row filters with a (possibly empty) array.
fn fields_from_rows(rows: Vec<ProfileRow>) -> Option<ProfileFields> {
    rows.into_iter()
        .next()
        .map(|row| ProfileFields { full_name: row.full_name, avatar_url: row.avatar_url })
}

/// Profile store backed by the hosted backend's `profiles` table.
pub struct HostedProfiles {
    config: BackendConfig,
    http: reqwest::Client,
}

impl HostedProfiles {
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        Self { config, http: reqwest::Client::new() }
    }
}

#[async_trait::async_trait]
impl ProfileStore for HostedProfiles {
    async fn fetch_profile_fields(&self, user_id: &str) -> Result<Option<ProfileFields>, ProviderError> {
        let url = format!("{}/rest/v1/profiles", self.config.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("id", format!("eq.{user_id}")), ("select", "full_name,avatar_url".to_owned())])
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::UnexpectedResponse { status, body });
        }

        let rows: Vec<ProfileRow> = resp
            .json()
            .await
            .map_err(|e| ProviderError::MalformedPayload(e.to_string()))?;
        Ok(fields_from_rows(rows))
    }
}
