//! In-memory server-side sessions
//!
//! A session is created by the token handshake and carries the security
//! token; later requests present its id in a cookie.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone)]
struct SessionEntry {
    values: HashMap<String, String>,
    expires_at: Instant,
}

/// Session store keyed by random hex ids
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generate a cryptographically secure session id
    fn generate_session_id() -> String {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let bytes: [u8; 32] = rng.gen();
        hex::encode(bytes)
    }

    /// Store values under a new session id and return the id.
    ///
    /// Expired sessions are swept first, so abandoned handshakes don't pile up.
    pub fn create(&self, values: HashMap<String, String>) -> String {
        let purged = self.purge_expired();
        if purged > 0 {
            tracing::debug!("Purged {} expired sessions", purged);
        }

        let id = Self::generate_session_id();
        self.sessions.insert(
            id.clone(),
            SessionEntry {
                values,
                expires_at: Instant::now() + self.ttl,
            },
        );
        id
    }

    /// Values of a live session. Expired sessions are dropped on lookup.
    pub fn get(&self, id: &str) -> Option<HashMap<String, String>> {
        {
            let entry = self.sessions.get(id)?;
            if entry.expires_at > Instant::now() {
                return Some(entry.values.clone());
            }
        }

        self.sessions
            .remove_if(id, |_, entry| entry.expires_at <= Instant::now());
        None
    }

    /// Drop every expired session, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.sessions.len())
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
    use super::*;

    fn values() -> HashMap<String, String> {
        HashMap::from([("SECURITY_TOKEN".to_string(), "abc".to_string())])
    }

    #[test]
    fn test_create_and_get() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.create(values());

        assert_eq!(id.len(), 64); // 32 bytes = 64 hex chars
        assert_eq!(store.get(&id).unwrap().get("SECURITY_TOKEN").unwrap(), "abc");
        assert!(store.get("unknown").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_ids_are_unique() {
        let store = SessionStore::new(Duration::from_secs(60));
        let a = store.create(values());
        let b = store.create(values());
        assert_ne!(a, b);
    }

    #[test]
    fn test_expired_session_is_dropped() {
        let store = SessionStore::new(Duration::ZERO);
        let id = store.create(values());
        assert!(store.get(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let live = SessionStore::new(Duration::from_secs(60));
        live.create(values());
        assert_eq!(live.purge_expired(), 0);

        let dead = SessionStore::new(Duration::ZERO);
        dead.create(values());
        assert_eq!(dead.purge_expired(), 1);
        assert!(dead.is_empty());
    }

    #[test]
    fn test_create_sweeps_expired_sessions() {
        let store = SessionStore::new(Duration::from_millis(50));
        for _ in 0..20 {
            store.create(values());
        }
        assert_eq!(store.len(), 20);

        std::thread::sleep(Duration::from_millis(80));
        let id = store.create(values());

        assert_eq!(store.len(), 1);
        assert!(store.get(&id).is_some());
    }
}
