//! Process-owned store of signed-in users' clients, keyed by user id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::KindeClient;

#[derive(Debug)]
struct Entry {
    client: Arc<KindeClient>,
    last_seen: Instant,
    refresh: Arc<AsyncMutex<()>>,
}

/// At most one live client per user. Entries idle for longer than the
/// timeout are treated as absent and dropped.
#[derive(Debug)]
pub struct ClientRegistry {
    entries: Mutex<HashMap<String, Entry>>,
    idle_timeout: Duration,
}

impl ClientRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub fn insert(&self, client: Arc<KindeClient>) -> Option<Arc<KindeClient>> {
        self.insert_at(client, Instant::now())
    }

    pub fn get(&self, user_id: &str) -> Option<Arc<KindeClient>> {
        self.get_at(user_id, Instant::now())
    }

    pub fn remove(&self, user_id: &str) -> Option<Arc<KindeClient>> {
        let removed = self.lock().remove(user_id).map(|entry| entry.client);
        if removed.is_some() {
            debug!(user_id, "removed client");
        }
        removed
    }

    /// Removes the entry only while it still holds `client`.
    pub fn remove_if_same(&self, user_id: &str, client: &Arc<KindeClient>) -> bool {
        let mut entries = self.lock();
        match entries.get(user_id) {
            Some(entry) if Arc::ptr_eq(&entry.client, client) => {
                entries.remove(user_id);
                debug!(user_id, "removed client");
                true
            }
            _ => false,
        }
    }

    /// Held while refreshing; shared by every client stored for the user.
    pub fn refresh_lock(&self, user_id: &str) -> Option<Arc<AsyncMutex<()>>> {
        self.lock().get(user_id).map(|entry| entry.refresh.clone())
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn insert_at(&self, client: Arc<KindeClient>, now: Instant) -> Option<Arc<KindeClient>> {
        let user_id = client.user_id().to_string();
        let mut entries = self.lock();
        let refresh = entries
            .get(&user_id)
            .map(|entry| entry.refresh.clone())
            .unwrap_or_default();
        let previous = entries.insert(
            user_id.clone(),
            Entry {
                client,
                last_seen: now,
                refresh,
            },
        );
        drop(entries);
        debug!(user_id = %user_id, replaced = previous.is_some(), "registered client");
        previous.map(|entry| entry.client)
    }

    fn get_at(&self, user_id: &str, now: Instant) -> Option<Arc<KindeClient>> {
        let mut entries = self.lock();
        let entry = entries.get_mut(user_id)?;
        if now.saturating_duration_since(entry.last_seen) < self.idle_timeout {
            entry.last_seen = now;
            return Some(entry.client.clone());
        }
        entries.remove(user_id);
        debug!(user_id, "evicted idle client");
        None
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.last_seen) < self.idle_timeout);
        before - entries.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
