// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory passphrase holder keyed by session id.
//!
//! Each entry expires after a period of inactivity; every successful
//! `get` or `store` restarts the clock. Nothing here is ever persisted.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use zeroize::Zeroizing;

/// Default inactivity timeout (30 minutes).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Default maximum number of concurrent sessions.
pub const DEFAULT_SESSION_CAPACITY: usize = 1024;

/// A session's keystore passphrase with its inactivity deadline.
pub struct PassphraseHandle {
    passphrase: Zeroizing<String>,
    last_access: Instant,
}

impl PassphraseHandle {
    fn new(passphrase: Zeroizing<String>) -> Self {
        Self {
            passphrase,
            last_access: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.last_access.elapsed() >= ttl
    }
}

impl std::fmt::Debug for PassphraseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassphraseHandle")
            .field("passphrase", &"<redacted>")
            .field("last_access", &self.last_access)
            .finish()
    }
}

/// Session-scoped passphrase store.
///
/// Bounded LRU: when full, the least recently used session is dropped.
pub struct CredentialStore {
    sessions: Mutex<LruCache<String, PassphraseHandle>>,
    ttl: Duration,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_CAPACITY, DEFAULT_SESSION_TTL)
    }
}

impl CredentialStore {
    /// - `capacity`: max number of live sessions (at least 1).
    /// - `ttl`: inactivity timeout per session.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Associate `passphrase` with `session_id`, replacing any previous one.
    pub fn store(&self, session_id: &str, passphrase: Zeroizing<String>) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((evicted, _)) =
            sessions.push(session_id.to_string(), PassphraseHandle::new(passphrase))
        {
            if evicted != session_id {
                tracing::debug!("Session store full; evicted least recently used session");
            }
        }
    }

    /// Passphrase for `session_id`, or `None` when absent or expired.
    pub fn get(&self, session_id: &str) -> Option<Zeroizing<String>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = sessions.get_mut(session_id)?;
        if handle.is_expired(self.ttl) {
            sessions.pop(session_id);
            return None;
        }
        handle.last_access = Instant::now();
        Some(handle.passphrase.clone())
    }

    pub fn remove(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.pop(session_id);
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, handle)| handle.is_expired(self.ttl))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            sessions.pop(id);
        }
        expired.len()
    }

    /// Number of held sessions, expired or not.
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> Zeroizing<String> {
        Zeroizing::new(s.to_string())
    }

    #[test]
    fn store_get_remove() {
        let store = CredentialStore::default();
        assert!(store.get("s1").is_none());

        store.store("s1", secret("password-1"));
        assert_eq!(store.get("s1").unwrap().as_str(), "password-1");

        store.store("s1", secret("password-2"));
        assert_eq!(store.get("s1").unwrap().as_str(), "password-2");

        store.remove("s1");
        assert!(store.get("s1").is_none());
    }

    #[test]
    fn sessions_are_isolated() {
        let store = CredentialStore::default();
        store.store("a", secret("pw-a"));
        store.store("b", secret("pw-b"));
        assert_eq!(store.get("a").unwrap().as_str(), "pw-a");
        assert_eq!(store.get("b").unwrap().as_str(), "pw-b");
    }

    #[test]
    fn expired_session_is_gone() {
        let store = CredentialStore::new(10, Duration::from_millis(1));
        store.store("s1", secret("pw"));

        std::thread::sleep(Duration::from_millis(5));

        assert!(store.get("s1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn access_extends_ttl() {
        let store = CredentialStore::new(10, Duration::from_millis(200));
        store.store("s1", secret("pw"));

        for _ in 0..3 {
            std::thread::sleep(Duration::from_millis(100));
            assert!(store.get("s1").is_some(), "access should keep the session alive");
        }
    }

    #[test]
    fn purge_removes_only_expired() {
        let store = CredentialStore::new(10, Duration::from_millis(50));
        store.store("old", secret("pw"));
        std::thread::sleep(Duration::from_millis(80));
        store.store("new", secret("pw"));

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("new").is_some());
    }

    #[test]
    fn capacity_evicts_least_recent() {
        let store = CredentialStore::new(2, DEFAULT_SESSION_TTL);
        store.store("a", secret("1"));
        store.store("b", secret("2"));
        store.get("a");
        store.store("c", secret("3"));

        assert!(store.get("a").is_some());
        assert!(store.get("b").is_none());
        assert!(store.get("c").is_some());
    }

    #[test]
    fn debug_redacts_passphrase() {
        let handle = PassphraseHandle::new(secret("do-not-print"));
        assert!(!format!("{handle:?}").contains("do-not-print"));
    }
}
