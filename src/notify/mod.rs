// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Transient user-facing notifications.
//!
//! Any component may push a message; entries expire on their own after a
//! fixed display window, so the queue never needs explicit cleanup.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// How long an entry stays visible before it self-expires.
const DISPLAY_WINDOW_SECS: i64 = 3;

/// Visual weight of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// One transient message.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEntry {
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

impl NotificationEntry {
    fn expired_at(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at >= Duration::seconds(DISPLAY_WINDOW_SECS)
    }
}

/// Shared queue of transient messages, oldest first.
#[derive(Debug, Clone, Default)]
pub struct NotificationQueue {
    entries: Arc<Mutex<VecDeque<NotificationEntry>>>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message stamped with the current time.
    pub fn push(&self, severity: Severity, message: impl Into<String>) {
        self.push_at(severity, message, Utc::now());
    }

    fn push_at(&self, severity: Severity, message: impl Into<String>, created_at: DateTime<Utc>) {
        let message = message.into();
        tracing::debug!(?severity, %message, "notification");

        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.push_back(NotificationEntry {
            message,
            severity,
            created_at,
        });
    }

    /// Entries still inside their display window. Expired entries are
    /// pruned as a side effect.
    pub fn active(&self) -> Vec<NotificationEntry> {
        self.active_at(Utc::now())
    }

    fn active_at(&self, now: DateTime<Utc>) -> Vec<NotificationEntry> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        while entries.front().is_some_and(|e| e.expired_at(now)) {
            entries.pop_front();
        }
        entries.iter().cloned().collect()
    }

    /// Take every queued entry, expired or not, leaving the queue empty.
    pub fn drain(&self) -> Vec<NotificationEntry> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.drain(..).collect()
    }
}
