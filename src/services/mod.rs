//! Hosted-backend clients.
//!
//! ARCHITECTURE
//! ============
//! The backend exposes an auth API (`/auth/v1/...`), a table read API
//! (`/rest/v1/...`), and public object storage (`/storage/v1/...`), all
//! keyed by one publishable API key. These modules hold the HTTP plumbing
//! so the state layer above only sees the traits in [`crate::provider`].

pub mod config;
pub mod identity;
pub mod profiles;
