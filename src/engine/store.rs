//! Session persistence. The engine saves after every transition and loads on
//! resume; expiry belongs to the store.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::state::AgentState;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, state: &AgentState) -> Result<(), StoreError>;
    async fn load(&self, session_id: &str) -> Result<Option<AgentState>, StoreError>;
    async fn delete(&self, session_id: &str) -> Result<(), StoreError>;
}

struct StoredSession {
    // Serialized so a load returns exactly what was saved.
    payload: String,
    expires_at: Instant,
}

/// In-process store with a sliding TTL refreshed on every save.
#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<String, StoredSession>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every expired session; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, stored| stored.expires_at > now);
        before.saturating_sub(self.sessions.len())
    }

    /// Schedule `purge_expired` on a cron expression (seconds field included).
    pub async fn start_sweeper(&self, schedule: &str) -> Result<JobScheduler, JobSchedulerError> {
        let scheduler = JobScheduler::new().await?;
        let store = self.clone();

        let job = Job::new_async(schedule, move |_uuid, _l| {
            let store = store.clone();
            Box::pin(async move {
                let removed = store.purge_expired();
                if removed > 0 {
                    info!("🧹 [STORE] Purged {} expired sessions ({} remain)", removed, store.len());
                }
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;
        info!("🧹 [STORE] Session sweeper scheduled ({})", schedule);
        Ok(scheduler)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, state: &AgentState) -> Result<(), StoreError> {
        let payload = serde_json::to_string(state)?;
        self.sessions.insert(
            state.session_id.clone(),
            StoredSession {
                payload,
                expires_at: Instant::now() + self.ttl,
            },
        );
        debug!("[STORE] Saved session {} at {}", state.session_id, state.current_phase);
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<AgentState>, StoreError> {
        // Copy out so the shard guard is released before any remove.
        let found = self
            .sessions
            .get(session_id)
            .map(|stored| (stored.payload.clone(), stored.expires_at));

        match found {
            Some((payload, expires_at)) if expires_at > Instant::now() => {
                Ok(Some(serde_json::from_str(&payload)?))
            }
            Some(_) => {
                self.sessions.remove(session_id);
                debug!("[STORE] Session {} expired", session_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        self.sessions.remove(session_id);
        Ok(())
    }
}
