//! People and project-channel directory.
//!
//! The directory service is externally authoritative; the core only reads it
//! (plus the one availability update behind `/status`). Reads go through
//! [`DirectoryCache`], which keeps a TTL-guarded snapshot and serves the last
//! good copy when the upstream is unavailable.

pub mod cache;
pub mod http;

use async_trait::async_trait;

use crate::core::models::{Availability, Person, ProjectChannelMapping};
use crate::errors::BotError;

pub use cache::{DirectoryCache, DirectorySnapshot, RefreshOutcome};
pub use http::HttpDirectoryService;

#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn list_people(&self) -> Result<Vec<Person>, BotError>;

    async fn list_project_channel_mappings(&self) -> Result<ProjectChannelMapping, BotError>;

    /// Returns `false` when the directory does not know the person.
    async fn set_person_availability(
        &self,
        person_id: &str,
        status: Availability,
    ) -> Result<bool, BotError>;
}
