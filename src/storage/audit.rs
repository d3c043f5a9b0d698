// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operator audit log for keystore administration.
//!
//! Every administrative transition is appended, success or failure, to a
//! daily JSONL file under `audit/`. Failure records carry the internal
//! reason (`wrong_password`, `corrupt`, ...) that callers never see.
//! Passwords are never written here.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fs::{DataStore, StorageError, StorageResult};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    KeystoreProvisioned,
    PasswordRotated,
    BackupExported,
    BackupRestored,
    KeystoreReset,
    DestructiveResetRejected,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Session that triggered the event, if any.
    pub session_id: Option<String>,
    pub success: bool,
    /// Operator-facing failure reason.
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            session_id: None,
            success: true,
            error: None,
        }
    }

    pub fn with_session(mut self, session_id: Option<&str>) -> Self {
        self.session_id = session_id.map(str::to_string);
        self
    }

    /// Mark as failed with an operator-facing reason.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Append-only audit log.
#[derive(Debug)]
pub struct AuditLog {
    store: DataStore,
    write_lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(store: DataStore) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Append an event as one JSON line to the day's file.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.store.paths().audit_events_file(&date);

        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&line)?;
        Ok(())
    }

    /// Log an event; failures to write are reported through tracing only.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.log(&event) {
            tracing::error!(
                error = %e,
                event_type = ?event.event_type,
                "Failed to write audit event"
            );
        }
    }

    /// Read audit events for a specific date (`YYYY-MM-DD`).
    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        let path = self.store.paths().audit_events_file(date);
        let content = self.store.read_raw(&path)?;

        content
            .split(|b| *b == b'\n')
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            .map(|line| serde_json::from_slice(line).map_err(StorageError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn setup() -> (TempDir, AuditLog) {
        let temp = TempDir::new().unwrap();
        let mut store = DataStore::new(StoragePaths::new(temp.path()));
        store.initialize().unwrap();
        (temp, AuditLog::new(store))
    }

    #[test]
    fn failed_event() {
        let event = AuditEvent::new(AuditEventType::PasswordRotated)
            .with_session(Some("s-1"))
            .failed("wrong_password");

        assert!(!event.success);
        assert_eq!(event.session_id.as_deref(), Some("s-1"));
        assert_eq!(event.error.as_deref(), Some("wrong_password"));
    }

    #[test]
    fn log_and_read_events() {
        let (_temp, audit) = setup();

        audit
            .log(&AuditEvent::new(AuditEventType::KeystoreProvisioned))
            .unwrap();
        audit
            .log(&AuditEvent::new(AuditEventType::BackupRestored).failed("corrupt"))
            .unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let events = audit.read_events(&today).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::KeystoreProvisioned);
        assert_eq!(events[1].event_type, AuditEventType::BackupRestored);
        assert_eq!(events[1].error.as_deref(), Some("corrupt"));
        assert!(!events[1].success);
    }

    #[test]
    fn missing_day_is_not_found() {
        let (_temp, audit) = setup();
        assert!(matches!(
            audit.read_events("1999-01-01"),
            Err(StorageError::NotFound(_))
        ));
    }
}
