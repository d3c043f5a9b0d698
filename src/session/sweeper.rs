// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Sweeper
//!
//! Background task that drops expired passphrase handles so they do not
//! linger in memory until the next lookup touches them.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::CredentialStore;

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct SessionSweeper {
    credentials: Arc<CredentialStore>,
    interval: Duration,
}

impl SessionSweeper {
    pub fn new(credentials: Arc<CredentialStore>) -> Self {
        Self {
            credentials,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Session sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Session sweeper shutting down");
                    return;
                }
            }

            self.sweep();
        }
    }

    /// One pass: purge expired sessions.
    pub fn sweep(&self) -> usize {
        let removed = self.credentials.purge_expired();
        if removed > 0 {
            debug!(
                removed,
                remaining = self.credentials.len(),
                "Purged expired sessions"
            );
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeroize::Zeroizing;

    #[tokio::test]
    async fn sweeps_until_cancelled() {
        let credentials = Arc::new(CredentialStore::new(10, Duration::from_millis(10)));
        credentials.store("s1", Zeroizing::new("pw".to_string()));

        let shutdown = CancellationToken::new();
        let sweeper =
            SessionSweeper::new(Arc::clone(&credentials)).with_interval(Duration::from_millis(20));
        let task = tokio::spawn(sweeper.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(credentials.is_empty(), "expired session should be swept");

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("sweeper must stop on cancel")
            .unwrap();
    }

    #[test]
    fn sweep_keeps_live_sessions() {
        let credentials = Arc::new(CredentialStore::default());
        credentials.store("s1", Zeroizing::new("pw".to_string()));
        let sweeper = SessionSweeper::new(Arc::clone(&credentials));
        assert_eq!(sweeper.sweep(), 0);
        assert_eq!(credentials.len(), 1);
    }
}
