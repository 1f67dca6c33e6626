use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::DirectoryService;
use crate::core::models::{Person, PersonSummary, ProjectChannelMapping};
use crate::errors::BotError;
use crate::utils::clock::Clock;

/// An immutable view of the directory as of one successful load.
#[derive(Debug, Clone, Default)]
pub struct DirectorySnapshot {
    pub people: Vec<Person>,
    pub channels: ProjectChannelMapping,
}

impl DirectorySnapshot {
    #[must_use]
    pub fn person_by_name(&self, name: &str) -> Option<&Person> {
        let needle = name.trim();
        self.people
            .iter()
            .find(|p| p.name.trim().eq_ignore_ascii_case(needle))
    }

    #[must_use]
    pub fn person_by_email(&self, email: &str) -> Option<&Person> {
        let needle = email.trim();
        if needle.is_empty() {
            return None;
        }
        self.people
            .iter()
            .find(|p| p.email.trim().eq_ignore_ascii_case(needle))
    }

    #[must_use]
    pub fn person_by_external_id(&self, external_id: &str) -> Option<&Person> {
        self.people
            .iter()
            .find(|p| p.external_id.as_deref() == Some(external_id))
    }

    #[must_use]
    pub fn person_by_chat_id(&self, chat_user_id: &str) -> Option<&Person> {
        self.people
            .iter()
            .find(|p| p.chat_user_id.as_deref() == Some(chat_user_id))
    }

    #[must_use]
    pub fn channel_for_project(&self, project_id: &str) -> Option<&str> {
        self.channels.get(project_id).map(String::as_str)
    }

    /// People as handed to the extractor prompt.
    #[must_use]
    pub fn people_summaries(&self) -> Vec<PersonSummary> {
        self.people
            .iter()
            .map(|p| PersonSummary {
                name: p.name.clone(),
                email: p.email.clone(),
            })
            .collect()
    }
}

/// Result of an explicit refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed { people: usize, channels: usize },
    /// Upstream failed; the previous snapshot is still being served.
    ServingStale,
}

#[derive(Default)]
struct CacheState {
    snapshot: Option<Arc<DirectorySnapshot>>,
    checked_at: Option<Instant>,
}

/// TTL-guarded directory snapshot shared by every handler in the process.
///
/// Readers only clone an `Arc` under a short read lock. Loads are serialised by
/// a separate mutex so an expired cache triggers one upstream fetch, not one per
/// concurrent reader.
pub struct DirectoryCache {
    service: Arc<dyn DirectoryService>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    allowed_user_ids: Vec<String>,
    state: RwLock<CacheState>,
    load_lock: Mutex<()>,
}

impl DirectoryCache {
    #[must_use]
    pub fn new(service: Arc<dyn DirectoryService>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            service,
            clock,
            ttl,
            allowed_user_ids: Vec::new(),
            state: RwLock::new(CacheState::default()),
            load_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_allowed_users(mut self, allowed_user_ids: Vec<String>) -> Self {
        self.allowed_user_ids = allowed_user_ids;
        self
    }

    #[must_use]
    pub fn service(&self) -> &Arc<dyn DirectoryService> {
        &self.service
    }

    fn is_fresh(&self, state: &CacheState) -> bool {
        match (&state.snapshot, state.checked_at) {
            (Some(_), Some(at)) => self.clock.now().saturating_duration_since(at) < self.ttl,
            _ => false,
        }
    }

    /// Current snapshot, reloading first when the TTL has expired.
    ///
    /// # Errors
    ///
    /// Fails only when the upstream is down and nothing was ever loaded.
    pub async fn snapshot(&self) -> Result<Arc<DirectorySnapshot>, BotError> {
        {
            let state = self.state.read().await;
            if self.is_fresh(&state)
                && let Some(snapshot) = &state.snapshot
            {
                return Ok(Arc::clone(snapshot));
            }
        }
        self.refresh().await
    }

    /// Reloads if expired. Another caller may have reloaded while we waited.
    ///
    /// # Errors
    ///
    /// Fails only when the upstream is down and nothing was ever loaded.
    pub async fn refresh(&self) -> Result<Arc<DirectorySnapshot>, BotError> {
        let _guard = self.load_lock.lock().await;
        {
            let state = self.state.read().await;
            if self.is_fresh(&state)
                && let Some(snapshot) = &state.snapshot
            {
                return Ok(Arc::clone(snapshot));
            }
        }
        self.load().await.map(|(snapshot, _)| snapshot)
    }

    /// Reloads regardless of the TTL.
    ///
    /// # Errors
    ///
    /// Fails only when the upstream is down and nothing was ever loaded.
    pub async fn force_refresh(&self) -> Result<RefreshOutcome, BotError> {
        let _guard = self.load_lock.lock().await;
        let (snapshot, stale) = self.load().await?;
        if stale {
            return Ok(RefreshOutcome::ServingStale);
        }
        Ok(RefreshOutcome::Refreshed {
            people: snapshot.people.len(),
            channels: snapshot.channels.len(),
        })
    }

    async fn load(&self) -> Result<(Arc<DirectorySnapshot>, bool), BotError> {
        let fetched = tokio::try_join!(
            self.service.list_people(),
            self.service.list_project_channel_mappings()
        );

        let mut state = self.state.write().await;
        match fetched {
            Ok((people, channels)) => {
                info!(
                    people = people.len(),
                    channels = channels.len(),
                    "Directory snapshot loaded"
                );
                let snapshot = Arc::new(DirectorySnapshot { people, channels });
                state.snapshot = Some(Arc::clone(&snapshot));
                state.checked_at = Some(self.clock.now());
                Ok((snapshot, false))
            }
            Err(e) => match state.snapshot.clone() {
                Some(previous) => {
                    warn!(error = %e, "Directory refresh failed, serving last good snapshot");
                    // wait a full TTL before hitting the failing upstream again
                    state.checked_at = Some(self.clock.now());
                    Ok((previous, true))
                }
                None => Err(BotError::DirectoryError(e.to_string())),
            },
        }
    }

    /// A chat user may use the bot when allow-listed or known to the directory.
    pub async fn is_authorized(&self, chat_user_id: &str) -> bool {
        if self.allowed_user_ids.iter().any(|id| id == chat_user_id) {
            return true;
        }
        match self.snapshot().await {
            Ok(snapshot) => snapshot.person_by_chat_id(chat_user_id).is_some(),
            Err(e) => {
                warn!(error = %e, user_id = chat_user_id, "Authorization check without directory");
                false
            }
        }
    }
}
