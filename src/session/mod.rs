//! Per-conversation correlation state.
//!
//! A [`SessionStore`] remembers which sender is waiting on a delegated
//! round trip for each conversation. Entries are consumed exactly once by
//! [`SessionStore::take`]. With a TTL configured, stale entries are hidden
//! from `take` and reclaimed by [`SessionStore::evict_expired`].

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::types::{AgentAddress, SessionId};

const DEFAULT_SHARDS: usize = 16;

/// A sender waiting for the result of a delegated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSession {
    pub sender: AgentAddress,
    /// Identifies the extraction request that created this entry. Only used
    /// for logging; replies are still matched by session alone.
    pub request_id: Uuid,
    pub created_at: Instant,
}

impl PendingSession {
    pub fn new(sender: AgentAddress) -> Self {
        Self {
            sender,
            request_id: Uuid::new_v4(),
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Option<Duration>, now: Instant) -> bool {
        ttl.is_some_and(|ttl| now.saturating_duration_since(self.created_at) >= ttl)
    }
}

type Shard = HashMap<SessionId, PendingSession>;

/// Sharded map from session to waiting sender.
///
/// Operations on one key are linearizable; keys in different shards never
/// contend for the same lock.
#[derive(Debug)]
pub struct SessionStore {
    shards: Vec<Mutex<Shard>>,
    ttl: Option<Duration>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Store without expiry.
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    pub fn with_shards(count: usize) -> Self {
        let count = count.max(1);
        Self {
            shards: (0..count).map(|_| Mutex::new(HashMap::new())).collect(),
            ttl: None,
        }
    }

    /// Entries older than `ttl` are treated as abandoned.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Record `sender` as waiting on `session`, replacing any previous entry.
    ///
    /// Returns the live entry that was replaced, if any.
    pub fn put(&self, session: SessionId, sender: AgentAddress) -> Option<PendingSession> {
        self.put_pending(session, PendingSession::new(sender))
    }

    pub fn put_pending(&self, session: SessionId, pending: PendingSession) -> Option<PendingSession> {
        let now = Instant::now();
        let previous = self.shard(&session).insert(session, pending)?;
        (!previous.is_expired(self.ttl, now)).then_some(previous)
    }

    /// Atomically read and remove the entry for `session`.
    pub fn take(&self, session: &SessionId) -> Option<PendingSession> {
        let pending = self.shard(session).remove(session)?;
        (!pending.is_expired(self.ttl, Instant::now())).then_some(pending)
    }

    /// Remove the entry for `session` only if it still belongs to `request_id`.
    pub fn withdraw(&self, session: &SessionId, request_id: Uuid) -> Option<PendingSession> {
        let mut shard = self.shard(session);
        match shard.get(session) {
            Some(pending) if pending.request_id == request_id => shard.remove(session),
            _ => None,
        }
    }

    /// Whether a live entry exists for `session`.
    pub fn contains(&self, session: &SessionId) -> bool {
        let now = Instant::now();
        self.shard(session)
            .get(session)
            .is_some_and(|pending| !pending.is_expired(self.ttl, now))
    }

    /// Number of stored entries, expired ones included until evicted.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| lock(shard).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every expired entry and return what was removed.
    ///
    /// Without a TTL nothing ever expires.
    pub fn evict_expired(&self) -> Vec<(SessionId, PendingSession)> {
        if self.ttl.is_none() {
            return Vec::new();
        }
        let now = Instant::now();
        let mut evicted = Vec::new();
        for shard in &self.shards {
            let mut guard = lock(shard);
            let expired: Vec<SessionId> = guard
                .iter()
                .filter(|(_, pending)| pending.is_expired(self.ttl, now))
                .map(|(session, _)| session.clone())
                .collect();
            for session in expired {
                if let Some(pending) = guard.remove(&session) {
                    evicted.push((session, pending));
                }
            }
        }
        evicted
    }

    fn shard(&self, session: &SessionId) -> MutexGuard<'_, Shard> {
        let mut hasher = DefaultHasher::new();
        session.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        lock(&self.shards[index])
    }
}

fn lock(shard: &Mutex<Shard>) -> MutexGuard<'_, Shard> {
    shard.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sid(s: &str) -> SessionId {
        SessionId::new(s)
    }

    #[test]
    fn last_write_wins() {
        let store = SessionStore::new();
        assert!(store.put(sid("s"), "A".into()).is_none());
        let replaced = store.put(sid("s"), "B".into()).unwrap();
        assert_eq!(replaced.sender, AgentAddress::from("A"));
        assert_eq!(store.take(&sid("s")).unwrap().sender, AgentAddress::from("B"));
    }

    #[test]
    fn take_is_destructive() {
        let store = SessionStore::new();
        store.put(sid("s"), "A".into());
        assert!(store.take(&sid("s")).is_some());
        assert!(store.take(&sid("s")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn withdraw_leaves_newer_entries_alone() {
        let store = SessionStore::new();
        let first = PendingSession::new("A".into());
        let first_id = first.request_id;
        store.put_pending(sid("s"), first);
        store.put(sid("s"), "B".into());

        assert!(store.withdraw(&sid("s"), first_id).is_none());
        assert_eq!(store.take(&sid("s")).unwrap().sender, AgentAddress::from("B"));
    }

    #[test]
    fn sessions_are_independent() {
        let store = SessionStore::with_shards(1);
        store.put(sid("one"), "A".into());
        store.put(sid("two"), "B".into());
        assert_eq!(store.take(&sid("two")).unwrap().sender, AgentAddress::from("B"));
        assert_eq!(store.take(&sid("one")).unwrap().sender, AgentAddress::from("A"));
    }

    #[test]
    fn without_ttl_nothing_is_evicted() {
        let store = SessionStore::new();
        store.put(sid("s"), "A".into());
        assert!(store.evict_expired().is_empty());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_hidden_and_evicted() {
        let store = SessionStore::new().with_ttl(Duration::from_secs(30));
        store.put(sid("old"), "A".into());
        tokio::time::advance(Duration::from_secs(20)).await;
        store.put(sid("fresh"), "B".into());
        tokio::time::advance(Duration::from_secs(15)).await;

        assert!(!store.contains(&sid("old")));
        assert!(store.contains(&sid("fresh")));

        let evicted = store.evict_expired();
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].0, sid("old"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn take_of_expired_entry_returns_none() {
        let store = SessionStore::new().with_ttl(Duration::from_secs(5));
        store.put(sid("s"), "A".into());
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(store.take(&sid("s")).is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_puts_and_takes_do_not_lose_entries() {
        let store = Arc::new(SessionStore::new());
        let mut handles = Vec::new();
        for i in 0..64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let session = SessionId::new(format!("s{i}"));
                store.put(session.clone(), AgentAddress::new(format!("sender-{i}")));
                tokio::task::yield_now().await;
                store.take(&session)
            }));
        }
        for (i, handle) in handles.into_iter().enumerate() {
            let taken = handle.await.unwrap().unwrap();
            assert_eq!(taken.sender, AgentAddress::new(format!("sender-{i}")));
        }
        assert!(store.is_empty());
    }
}
