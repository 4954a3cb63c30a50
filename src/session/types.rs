// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session types for the download lifecycle.

use crate::types::{RemoteStatus, StatusSnapshot};

/// Status of the active download session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Start request accepted; the worker has not reported progress yet.
    Starting,
    /// Transfer in progress.
    Downloading,
    /// Terminal: transfer complete.
    Finished,
    /// Terminal: the job failed.
    Error,
}

impl SessionStatus {
    /// Returns true once no further poll results will be applied.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Finished | SessionStatus::Error)
    }
}

/// What applying a poll snapshot to a session did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Non-terminal fields were updated.
    Progress,
    /// The snapshot regressed progress and was discarded.
    Stale,
    /// The snapshot carried nothing to apply (starting, unknown id, ...).
    Ignored,
    /// The session reached `Finished`.
    Finished,
    /// The session reached `Error`.
    Failed,
}

/// The one active download job: its server-side identity plus the
/// client-observed status.
///
/// Created when a start request succeeds; mutated only by the session
/// manager from poll results; superseded wholesale by the next start.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSession {
    /// Opaque id assigned by the service.
    pub id: String,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Progress percentage in [0, 100]; meaningful while `Downloading`.
    pub percent: f64,
    /// Human-readable transfer speed from the last applied poll.
    pub speed_label: Option<String>,
    /// Output file name, once the service reports it.
    pub filename: Option<String>,
    /// Failure message; set on transition to `Error`.
    pub error_message: Option<String>,
}

impl DownloadSession {
    /// A fresh session for a just-accepted job.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: SessionStatus::Starting,
            percent: 0.0,
            speed_label: None,
            filename: None,
            error_message: None,
        }
    }

    /// Apply one poll snapshot.
    ///
    /// Percent is monotonically non-decreasing within a session: a snapshot
    /// reporting less progress than already recorded is stale and discarded.
    /// Terminal snapshots always apply; nothing applies after a terminal
    /// status has been recorded.
    pub fn apply(&mut self, snapshot: &StatusSnapshot) -> Applied {
        if self.status.is_terminal() {
            return Applied::Ignored;
        }

        match snapshot.status {
            RemoteStatus::Downloading => {
                let percent = snapshot.percent.unwrap_or(self.percent);
                if percent < self.percent {
                    return Applied::Stale;
                }
                self.status = SessionStatus::Downloading;
                self.percent = percent;
                self.speed_label = snapshot.speed.clone();
                if snapshot.filename.is_some() {
                    self.filename = snapshot.filename.clone();
                }
                Applied::Progress
            }
            RemoteStatus::Finished => {
                self.status = SessionStatus::Finished;
                self.percent = 100.0;
                self.speed_label = None;
                if snapshot.filename.is_some() {
                    self.filename = snapshot.filename.clone();
                }
                Applied::Finished
            }
            RemoteStatus::Error => {
                self.status = SessionStatus::Error;
                self.speed_label = None;
                self.error_message = Some(
                    snapshot
                        .error
                        .clone()
                        .unwrap_or_else(|| "Unknown error".to_string()),
                );
                Applied::Failed
            }
            // The service reports `starting` before the worker runs, and
            // `not_found` for ids it has no record of. Neither moves the
            // session; the poller keeps going.
            RemoteStatus::Starting | RemoteStatus::NotFound | RemoteStatus::Unknown => {
                Applied::Ignored
            }
        }
    }
}

/// One update published on the session watch channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// No download in progress.
    Idle,
    /// A start request is in flight; no session id yet.
    Starting,
    /// The active session changed.
    Session(DownloadSession),
    /// A start request failed before a session existed.
    Failed {
        /// Error message for display.
        message: String,
    },
}
