use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

pub const NO_ACTIVE_AGENT: &str = "None";

/// Per-conversation state carried between turns and between tool calls of
/// one turn.
///
/// `task_id` and `context_id` are minted on the first dispatch and reused for
/// every later dispatch so the remote side can correlate the conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    pub session_id: Option<String>,
    pub session_active: bool,
    pub active_agent: Option<String>,
    pub task_id: Option<String>,
    pub context_id: Option<String>,
    pub input_message_metadata: Option<Map<String, Value>>,
    pub thread_id: Option<String>,
}

impl SessionContext {
    /// Mints a session id on first use and marks the session active.
    /// Calling it again leaves the id unchanged.
    pub fn initialize_session(&mut self) -> &str {
        self.session_active = true;
        self.session_id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
    }

    /// Name of the most recently dispatched agent, or `"None"`.
    pub fn check_active_agent(&self) -> &str {
        self.active_agent.as_deref().unwrap_or(NO_ACTIVE_AGENT)
    }

    /// Reuses the correlation ids of earlier dispatches, minting any that are
    /// missing.
    pub fn correlation_ids(&mut self) -> (String, String) {
        let task_id = self
            .task_id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();
        let context_id = self
            .context_id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();
        (task_id, context_id)
    }
}

pub type SharedSession = Arc<Mutex<SessionContext>>;

pub const DEFAULT_SESSION_IDLE_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

struct SessionEntry {
    session: SharedSession,
    last_seen: Instant,
}

impl SessionEntry {
    /// A turn in flight holds a clone of the session handle.
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.session) > 1
    }
}

/// Session contexts keyed by session id.
///
/// Each context sits behind its own lock. A turn holds that lock for its whole
/// duration, so turns within a session run one at a time while different
/// sessions proceed concurrently.
///
/// Sessions idle for longer than `idle_ttl` are dropped, and the store never
/// keeps more than `max_sessions`. Sessions with a turn in flight are never
/// evicted.
pub struct SessionStore {
    sessions: DashMap<String, SessionEntry>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(DEFAULT_SESSION_IDLE_TTL, DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// The key a request maps to: its session id, else its thread id, else a
    /// fresh id.
    pub fn resolve_key(session_id: Option<&str>, thread_id: Option<&str>) -> String {
        session_id
            .or(thread_id)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }

    pub fn get_or_create(&self, key: &str) -> SharedSession {
        let now = Instant::now();
        let session = {
            let mut entry = self
                .sessions
                .entry(key.to_string())
                .or_insert_with(|| {
                    debug!(session_key = %key, "Creating session context");
                    let context = SessionContext {
                        session_id: Some(key.to_string()),
                        ..Default::default()
                    };
                    SessionEntry {
                        session: Arc::new(Mutex::new(context)),
                        last_seen: now,
                    }
                });
            entry.last_seen = now;
            entry.session.clone()
        };
        self.evict(key);
        session
    }

    pub fn get(&self, key: &str) -> Option<SharedSession> {
        self.sessions.get(key).map(|entry| entry.session.clone())
    }

    /// Drops idle sessions, then the least recently seen ones while the store
    /// is over capacity. `keep` is never evicted.
    fn evict(&self, keep: &str) {
        let ttl = self.idle_ttl;
        self.sessions.retain(|key, entry| {
            key == keep || entry.in_use() || entry.last_seen.elapsed() < ttl
        });

        let excess = self.sessions.len().saturating_sub(self.max_sessions);
        if excess == 0 {
            return;
        }
        let mut candidates: Vec<(Instant, String)> = self
            .sessions
            .iter()
            .filter(|entry| entry.key() != keep && !entry.in_use())
            .map(|entry| (entry.last_seen, entry.key().clone()))
            .collect();
        candidates.sort();
        candidates.truncate(excess);
        for (_, key) in &candidates {
            self.sessions.remove(key);
        }
        debug!(evicted = candidates.len(), "Session store over capacity");
    }

    /// Forgets one session, or all of them when `key` is `None`.
    pub fn reset(&self, key: Option<&str>) {
        match key {
            Some(key) => {
                self.sessions.remove(key);
            }
            None => self.sessions.clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;

        #[test]
        fn initialize_session_is_idempotent() {
            let mut context = SessionContext::default();
            let first = context.initialize_session().to_string();
            let second = context.initialize_session().to_string();
            assert_eq!(first, second);
            assert!(context.session_active);
        }

        #[test]
        fn active_agent_defaults_to_none_literal() {
            let mut context = SessionContext::default();
            assert_eq!(context.check_active_agent(), "None");
            context.active_agent = Some("SportsNewsAgent".to_string());
            assert_eq!(context.check_active_agent(), "SportsNewsAgent");
        }

        #[test]
        fn correlation_ids_persist() {
            let mut context = SessionContext::default();
            let first = context.correlation_ids();
            let second = context.correlation_ids();
            assert_eq!(first, second);
            assert_ne!(first.0, first.1);
        }

        #[test]
        fn session_key_prefers_session_then_thread() {
            assert_eq!(SessionStore::resolve_key(Some("s-1"), Some("t-1")), "s-1");
            assert_eq!(SessionStore::resolve_key(None, Some("t-1")), "t-1");
            let minted = SessionStore::resolve_key(None, None);
            assert!(uuid::Uuid::parse_str(&minted).is_ok());
        }

        #[tokio::test]
        async fn sessions_are_isolated_and_resettable() {
            let store = SessionStore::new();
            let a = store.get_or_create("a");
            let b = store.get_or_create("b");
            a.lock().await.active_agent = Some("SportsResultsAgent".to_string());

            assert_eq!(b.lock().await.check_active_agent(), "None");
            assert_eq!(
                store.get_or_create("a").lock().await.check_active_agent(),
                "SportsResultsAgent"
            );
            assert_eq!(a.lock().await.session_id.as_deref(), Some("a"));

            store.reset(Some("a"));
            assert!(store.get("a").is_none());
            assert_eq!(store.len(), 1);
            store.reset(None);
            assert!(store.is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn idle_sessions_are_evicted() {
            let store = SessionStore::with_limits(Duration::from_secs(60), 100);
            for _ in 0..50 {
                store.get_or_create(&SessionStore::resolve_key(None, None));
            }
            assert_eq!(store.len(), 50);

            tokio::time::advance(Duration::from_secs(30)).await;
            store.get_or_create("recent");
            tokio::time::advance(Duration::from_secs(31)).await;
            store.get_or_create("fresh");

            assert_eq!(store.len(), 2);
            assert!(store.get("recent").is_some());
            assert!(store.get("fresh").is_some());
        }

        #[tokio::test(start_paused = true)]
        async fn capacity_drops_least_recently_seen() {
            let store = SessionStore::with_limits(Duration::from_secs(3600), 3);
            for key in ["a", "b", "c"] {
                store.get_or_create(key);
                tokio::time::advance(Duration::from_secs(1)).await;
            }
            store.get_or_create("a");
            tokio::time::advance(Duration::from_secs(1)).await;
            store.get_or_create("d");

            assert_eq!(store.len(), 3);
            assert!(store.get("b").is_none());
            assert!(store.get("a").is_some());
            assert!(store.get("c").is_some());
        }

        #[tokio::test(start_paused = true)]
        async fn sessions_in_use_survive_eviction() {
            let store = SessionStore::with_limits(Duration::from_secs(60), 1);
            let held = store.get_or_create("busy");
            tokio::time::advance(Duration::from_secs(120)).await;
            store.get_or_create("other");

            assert!(store.get("busy").is_some());
            assert_eq!(store.len(), 2);
            drop(held);
        }
    }
}
