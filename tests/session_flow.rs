// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session lifecycle tests for reelctl
//!
//! These tests drive the session manager and poller end-to-end against a
//! scripted in-process service, with the tokio clock paused so the 1-second
//! polling cadence runs instantly and deterministically.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reelctl::{
    JobService, NotificationQueue, ReeldError, RemoteStatus, SessionManager, SessionStatus,
    SessionUpdate, Severity, StatusSnapshot, VideoInfo,
};

// =============================================================================
// Scripted service
// =============================================================================

/// In-process stand-in for the download service. Start and poll responses
/// are scripted up front; once the poll script runs dry it keeps answering
/// with a harmless `starting` status.
#[derive(Clone, Default)]
struct ScriptedService {
    starts: Arc<Mutex<VecDeque<Result<String, ReeldError>>>>,
    polls: Arc<Mutex<VecDeque<Result<StatusSnapshot, ReeldError>>>>,
    polled_ids: Arc<Mutex<Vec<String>>>,
    start_count: Arc<AtomicUsize>,
}

impl ScriptedService {
    fn new() -> Self {
        Self::default()
    }

    fn with_start(self, result: Result<&str, ReeldError>) -> Self {
        self.starts
            .lock()
            .unwrap()
            .push_back(result.map(String::from));
        self
    }

    fn with_poll(self, result: Result<StatusSnapshot, ReeldError>) -> Self {
        self.polls.lock().unwrap().push_back(result);
        self
    }

    fn poll_count(&self) -> usize {
        self.polled_ids.lock().unwrap().len()
    }

    fn polled_ids(&self) -> Vec<String> {
        self.polled_ids.lock().unwrap().clone()
    }
}

impl JobService for ScriptedService {
    fn analyze(&self, _url: &str) -> impl Future<Output = Result<VideoInfo, ReeldError>> + Send {
        async { Err(ReeldError::Remote("analyze not scripted".to_string())) }
    }

    fn start_download(
        &self,
        _url: &str,
        _format_selector: &str,
    ) -> impl Future<Output = Result<String, ReeldError>> + Send {
        self.start_count.fetch_add(1, Ordering::SeqCst);
        let result = self
            .starts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("scripted-id".to_string()));
        async move { result }
    }

    fn poll_status(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<StatusSnapshot, ReeldError>> + Send {
        self.polled_ids.lock().unwrap().push(id.to_string());
        let result = self
            .polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(snapshot(RemoteStatus::Starting, None)));
        async move { result }
    }
}

fn snapshot(status: RemoteStatus, percent: Option<f64>) -> StatusSnapshot {
    StatusSnapshot {
        status,
        percent,
        speed: None,
        filename: None,
        error: None,
    }
}

fn downloading(percent: f64) -> StatusSnapshot {
    StatusSnapshot {
        status: RemoteStatus::Downloading,
        percent: Some(percent),
        speed: Some("1.2MiB/s".to_string()),
        filename: Some("demo.mp4".to_string()),
        error: None,
    }
}

fn finished(filename: &str) -> StatusSnapshot {
    StatusSnapshot {
        status: RemoteStatus::Finished,
        percent: None,
        speed: None,
        filename: Some(filename.to_string()),
        error: None,
    }
}

// =============================================================================
// Full download flow
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_full_download_flow() {
    let service = ScriptedService::new()
        .with_start(Ok("abc123"))
        .with_poll(Ok(downloading(10.0)))
        .with_poll(Ok(downloading(55.5)))
        .with_poll(Ok(finished("demo.mp4")));
    let notices = NotificationQueue::new();
    let manager = SessionManager::new(service.clone(), notices.clone());
    let mut updates = manager.subscribe();
    let mut history = manager.subscribe_history();

    let id = manager.start("https://x/video", "best").await.unwrap();
    assert_eq!(id, "abc123");

    // Drive until the terminal update, recording every observed percent.
    let mut seen_percents = Vec::new();
    loop {
        updates.changed().await.unwrap();
        let update = updates.borrow_and_update().clone();
        if let SessionUpdate::Session(session) = update {
            seen_percents.push(session.percent);
            if session.status.is_terminal() {
                break;
            }
        }
    }

    let final_session = manager.current().unwrap();
    assert_eq!(final_session.status, SessionStatus::Finished);
    assert_eq!(final_session.percent, 100.0);
    assert_eq!(final_session.filename.as_deref(), Some("demo.mp4"));

    // Observed progress never decreased.
    assert!(seen_percents.windows(2).all(|w| w[0] <= w[1]));

    // The poller disarmed itself: no further polls for this session.
    assert!(!manager.is_polling());
    let polls_at_terminal = service.poll_count();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(service.poll_count(), polls_at_terminal);

    // A history refresh was scheduled after the settle delay.
    tokio::time::timeout(Duration::from_secs(5), history.changed())
        .await
        .expect("history refresh was never signalled")
        .unwrap();

    // And the completion was surfaced.
    assert!(notices
        .drain()
        .iter()
        .any(|n| n.severity == Severity::Success && n.message.contains("demo.mp4")));
}

// =============================================================================
// Stale and failed poll results
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_regressive_percent_is_discarded() {
    let service = ScriptedService::new()
        .with_start(Ok("abc123"))
        .with_poll(Ok(downloading(40.0)))
        .with_poll(Ok(downloading(5.0)));
    let manager = SessionManager::new(service.clone(), NotificationQueue::new());

    manager.start("https://x/video", "best").await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    // Both scripted polls were consumed; the regressive one changed nothing.
    assert!(service.poll_count() >= 2);
    let session = manager.current().unwrap();
    assert_eq!(session.status, SessionStatus::Downloading);
    assert_eq!(session.percent, 40.0);
    assert!(manager.is_polling());
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_mid_poll_is_not_terminal() {
    let service = ScriptedService::new()
        .with_start(Ok("abc123"))
        .with_poll(Err(ReeldError::Transport("connection reset".to_string())))
        .with_poll(Ok(downloading(20.0)));
    let notices = NotificationQueue::new();
    let manager = SessionManager::new(service.clone(), notices.clone());

    manager.start("https://x/video", "best").await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    let session = manager.current().unwrap();
    assert_eq!(session.status, SessionStatus::Downloading);
    assert_eq!(session.percent, 20.0);
    assert!(manager.is_polling());
    // The transient failure was never surfaced as an error.
    assert!(!notices.drain().iter().any(|n| n.severity == Severity::Error));
}

#[tokio::test(start_paused = true)]
async fn test_error_status_is_terminal_and_surfaced() {
    let service = ScriptedService::new()
        .with_start(Ok("abc123"))
        .with_poll(Ok(StatusSnapshot {
            status: RemoteStatus::Error,
            percent: None,
            speed: None,
            filename: None,
            error: Some("disk full".to_string()),
        }));
    let notices = NotificationQueue::new();
    let manager = SessionManager::new(service.clone(), notices.clone());
    let mut history = manager.subscribe_history();

    manager.start("https://x/video", "best").await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    let session = manager.current().unwrap();
    assert_eq!(session.status, SessionStatus::Error);
    assert_eq!(session.error_message.as_deref(), Some("disk full"));
    assert!(!manager.is_polling());

    let polls_at_terminal = service.poll_count();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(service.poll_count(), polls_at_terminal);

    // Failures surface a notification but never schedule a history refresh.
    assert!(notices
        .drain()
        .iter()
        .any(|n| n.severity == Severity::Error && n.message.contains("disk full")));
    assert_eq!(history.has_changed().unwrap(), false);
}

// =============================================================================
// Single-poller invariant
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_new_start_replaces_the_armed_poller() {
    let service = ScriptedService::new()
        .with_start(Ok("first"))
        .with_start(Ok("second"));
    let manager = SessionManager::new(service.clone(), NotificationQueue::new());

    manager.start("https://x/one", "best").await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(service.polled_ids().iter().any(|id| id == "first"));

    manager.start("https://x/two", "best").await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    // The old loop was cancelled: once the new session is polled, the
    // superseded id never appears again.
    let ids = service.polled_ids();
    let first_second = ids
        .iter()
        .position(|id| id == "second")
        .expect("new session was never polled");
    assert!(ids[first_second..].iter().all(|id| id == "second"));

    assert_eq!(manager.current().unwrap().id, "second");
    assert!(manager.is_polling());
}

#[tokio::test(start_paused = true)]
async fn test_late_results_for_superseded_session_are_discarded() {
    let service = ScriptedService::new()
        .with_start(Ok("first"))
        .with_start(Ok("second"))
        // Consumed by whichever loop asks first; progress for the
        // superseded id must not leak into the new session.
        .with_poll(Ok(downloading(90.0)));
    let manager = SessionManager::new(service.clone(), NotificationQueue::new());

    manager.start("https://x/one", "best").await.unwrap();
    manager.start("https://x/two", "best").await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let session = manager.current().unwrap();
    assert_eq!(session.id, "second");
    // Either the 90% snapshot went to the new session's own poll, or it was
    // discarded with the old one; in both cases the session is consistent.
    assert!(session.percent == 0.0 || session.percent == 90.0);
    assert_ne!(session.status, SessionStatus::Error);
}
