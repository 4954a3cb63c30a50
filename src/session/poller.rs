// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Recurring status polling for the active download session.
//!
//! The poller is a cancellable loop: armed for exactly one session id at a
//! time, it asks the service for status once per second and hands each
//! result to the session manager. It never mutates session state itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::client::JobService;

use super::manager::{Delivery, Inner};

/// Fixed polling cadence: one status request per second.
pub(super) const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Cancellation handle for one armed poll loop.
pub(super) struct PollerGuard {
    /// Session id the loop is polling.
    pub(super) session_id: String,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerGuard {
    pub(super) fn new(
        session_id: impl Into<String>,
        cancel: watch::Sender<bool>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            cancel,
            task,
        }
    }

    fn cancel(self) {
        // The loop exits on the next select; an in-flight request may still
        // complete, and the manager discards its result by session id.
        let _ = self.cancel.send(true);
        drop(self.task);
    }
}

/// The single armed-poller slot: at most one poll loop runs system-wide.
pub(super) struct PollerSlot {
    current: Option<PollerGuard>,
}

impl PollerSlot {
    pub(super) fn new() -> Self {
        Self { current: None }
    }

    /// Install a new guard, cancelling any previously armed loop first.
    pub(super) fn replace(&mut self, guard: PollerGuard) {
        if let Some(previous) = self.current.take() {
            tracing::debug!(
                old = %previous.session_id,
                new = %guard.session_id,
                "replacing armed poller"
            );
            previous.cancel();
        }
        self.current = Some(guard);
    }

    /// Cancel and drop the armed loop. Idempotent; safe from any state.
    pub(super) fn disarm(&mut self) {
        if let Some(guard) = self.current.take() {
            guard.cancel();
        }
    }

    /// Disarm only if currently armed for `session_id`.
    pub(super) fn disarm_for(&mut self, session_id: &str) {
        if self
            .current
            .as_ref()
            .is_some_and(|g| g.session_id == session_id)
        {
            self.disarm();
        }
    }

    pub(super) fn is_armed(&self) -> bool {
        self.current.is_some()
    }
}

/// The recurring poll loop for one session id.
///
/// Runs until a terminal status is delivered or the guard cancels it. The
/// request is awaited inside the tick, so at most one poll is outstanding
/// per session; ticks that would overlap an in-flight request are skipped.
pub(super) async fn run_poll_loop<C: JobService>(
    inner: Arc<Inner<C>>,
    session_id: String,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel_rx.changed() => {
                tracing::debug!(session = %session_id, "poll loop cancelled");
                return;
            }
            _ = ticker.tick() => {}
        }

        match inner.client().poll_status(&session_id).await {
            Ok(snapshot) => {
                if inner.deliver(&session_id, snapshot) == Delivery::Terminal {
                    return;
                }
            }
            // Transient network trouble must not abort an otherwise-healthy
            // download; keep polling.
            Err(e) if e.is_transport() => {
                tracing::warn!(session = %session_id, "status poll failed, will retry: {}", e);
            }
            Err(e) => {
                inner.fail(&session_id, e.to_string());
                return;
            }
        }
    }
}
