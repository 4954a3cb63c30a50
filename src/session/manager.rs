// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session manager: owns the single active download and its poller.
//!
//! All session mutation happens here. The poller delivers snapshots through
//! [`Inner::deliver`]; the terminal UI observes through a watch channel and
//! never touches the session directly.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;

use crate::client::{JobService, ReeldError};
use crate::notify::{NotificationQueue, Severity};
use crate::types::StatusSnapshot;

use super::poller::{run_poll_loop, PollerGuard, PollerSlot};
use super::types::{Applied, DownloadSession, SessionUpdate};

/// How long to let the service's filesystem write settle before the history
/// listing is refreshed after a finished download.
const HISTORY_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// What the manager did with a delivered poll snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Delivery {
    /// Applied as a non-terminal update.
    Applied,
    /// Discarded: stale, superseded session id, or nothing to apply.
    Discarded,
    /// The session reached a terminal status; the poller must stop.
    Terminal,
}

struct CurrentSlot {
    /// Bumped on every start request; guards late failures of superseded
    /// starts against clobbering a newer session.
    epoch: u64,
    session: Option<DownloadSession>,
}

/// Shared state between the manager handle and its poll loop.
pub(super) struct Inner<C: JobService> {
    client: C,
    current: Mutex<CurrentSlot>,
    poller: Mutex<PollerSlot>,
    updates: watch::Sender<SessionUpdate>,
    history: Arc<watch::Sender<u64>>,
    notices: NotificationQueue,
}

/// Recover a poisoned lock; session state stays usable if a poll task
/// panicked mid-update.
fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<C: JobService> Inner<C> {
    pub(super) fn client(&self) -> &C {
        &self.client
    }

    /// Apply one poll result to the current session.
    ///
    /// Results carrying a superseded session id are discarded. On a terminal
    /// status the poller slot is disarmed *before* the update is published,
    /// so nothing observes a terminal session with a live poll loop.
    pub(super) fn deliver(&self, session_id: &str, snapshot: StatusSnapshot) -> Delivery {
        let mut current = relock(&self.current);

        let Some(session) = current.session.as_mut() else {
            tracing::debug!(session = %session_id, "poll result with no active session, discarding");
            return Delivery::Discarded;
        };
        if session.id != session_id {
            tracing::debug!(
                stale = %session_id,
                active = %session.id,
                "poll result for superseded session, discarding"
            );
            return Delivery::Discarded;
        }

        match session.apply(&snapshot) {
            Applied::Progress => {
                let _ = self.updates.send(SessionUpdate::Session(session.clone()));
                Delivery::Applied
            }
            Applied::Stale => {
                tracing::debug!(
                    session = %session_id,
                    kept = session.percent,
                    reported = snapshot.percent.unwrap_or(0.0),
                    "stale poll result, progress would regress"
                );
                Delivery::Discarded
            }
            Applied::Ignored => Delivery::Discarded,
            Applied::Finished => {
                relock(&self.poller).disarm_for(session_id);
                let done = session.clone();
                let _ = self.updates.send(SessionUpdate::Session(done.clone()));
                drop(current);

                let name = done.filename.unwrap_or_else(|| done.id.clone());
                self.notices
                    .push(Severity::Success, format!("Download complete: {}", name));
                self.schedule_history_refresh();
                Delivery::Terminal
            }
            Applied::Failed => {
                relock(&self.poller).disarm_for(session_id);
                let failed = session.clone();
                let _ = self.updates.send(SessionUpdate::Session(failed.clone()));
                drop(current);

                let message = failed
                    .error_message
                    .unwrap_or_else(|| "Unknown error".to_string());
                self.notices
                    .push(Severity::Error, format!("Download failed: {}", message));
                Delivery::Terminal
            }
        }
    }

    /// Record a hard poll failure as a terminal error for `session_id`.
    pub(super) fn fail(&self, session_id: &str, message: String) {
        let mut current = relock(&self.current);

        let Some(session) = current.session.as_mut() else {
            return;
        };
        if session.id != session_id || session.status.is_terminal() {
            return;
        }

        relock(&self.poller).disarm_for(session_id);
        session.status = super::types::SessionStatus::Error;
        session.error_message = Some(message.clone());
        let _ = self.updates.send(SessionUpdate::Session(session.clone()));
        drop(current);

        self.notices
            .push(Severity::Error, format!("Download failed: {}", message));
    }

    /// Bump the history counter once the remote filesystem write has had a
    /// moment to settle.
    fn schedule_history_refresh(&self) {
        let history = Arc::clone(&self.history);
        tokio::spawn(async move {
            tokio::time::sleep(HISTORY_SETTLE_DELAY).await;
            history.send_modify(|generation| *generation += 1);
        });
    }
}

/// Coordinator for the one active download session.
///
/// Owns the session record and the armed-poller slot. Starting a new
/// download supersedes the previous session and its poll loop.
pub struct SessionManager<C: JobService> {
    inner: Arc<Inner<C>>,
}

impl<C: JobService> SessionManager<C> {
    /// Create a manager around a job service client.
    pub fn new(client: C, notices: NotificationQueue) -> Self {
        let (updates, _) = watch::channel(SessionUpdate::Idle);
        let (history, _) = watch::channel(0u64);

        Self {
            inner: Arc::new(Inner {
                client,
                current: Mutex::new(CurrentSlot {
                    epoch: 0,
                    session: None,
                }),
                poller: Mutex::new(PollerSlot::new()),
                updates,
                history: Arc::new(history),
                notices,
            }),
        }
    }

    /// Observe session updates. The receiver always holds the latest state.
    pub fn subscribe(&self) -> watch::Receiver<SessionUpdate> {
        self.inner.updates.subscribe()
    }

    /// Observe the history generation counter, bumped shortly after every
    /// finished download.
    pub fn subscribe_history(&self) -> watch::Receiver<u64> {
        self.inner.history.subscribe()
    }

    /// Snapshot of the current session, if any.
    pub fn current(&self) -> Option<DownloadSession> {
        relock(&self.inner.current).session.clone()
    }

    /// Start a download and arm the poller for it.
    ///
    /// A previous session, terminal or not, is superseded immediately: its
    /// poll loop is cancelled and late results for its id are discarded.
    /// When two starts race, whichever response lands last owns the slot.
    pub async fn start(&self, url: &str, format_selector: &str) -> Result<String, ReeldError> {
        let url = url.trim();
        if url.is_empty() {
            let err = ReeldError::InvalidInput("URL is required".to_string());
            self.inner
                .notices
                .push(Severity::Error, "A video URL is required");
            return Err(err);
        }

        let epoch = {
            let mut current = relock(&self.inner.current);
            relock(&self.inner.poller).disarm();
            current.epoch += 1;
            current.session = None;
            let _ = self.inner.updates.send(SessionUpdate::Starting);
            current.epoch
        };

        match self.inner.client.start_download(url, format_selector).await {
            Ok(id) => {
                let session = DownloadSession::new(&id);
                {
                    let mut current = relock(&self.inner.current);
                    current.session = Some(session.clone());
                    let _ = self.inner.updates.send(SessionUpdate::Session(session));
                }
                self.arm(&id);
                Ok(id)
            }
            Err(e) => {
                // Only report idle if no newer start superseded this one
                // while the request was in flight.
                let current = relock(&self.inner.current);
                if current.epoch == epoch {
                    let _ = self.inner.updates.send(SessionUpdate::Failed {
                        message: e.to_string(),
                    });
                }
                drop(current);

                self.inner.notices.push(Severity::Error, e.to_string());
                Err(e)
            }
        }
    }

    /// Arm the poll loop for `session_id`, cancelling any existing loop.
    fn arm(&self, session_id: &str) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(run_poll_loop(
            Arc::clone(&self.inner),
            session_id.to_string(),
            cancel_rx,
        ));
        relock(&self.inner.poller).replace(PollerGuard::new(session_id, cancel_tx, task));
    }

    /// Cancel the armed poll loop, if any. Idempotent.
    pub fn disarm(&self) {
        relock(&self.inner.poller).disarm();
    }

    /// Whether a poll loop is currently armed.
    pub fn is_polling(&self) -> bool {
        relock(&self.inner.poller).is_armed()
    }
}
