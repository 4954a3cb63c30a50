// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! reelctl - terminal controller for a self-hosted video download service
//!
//! reelctl drives a reeld download service over its HTTP/JSON API: analyze a
//! video URL, pick an encoding, start an asynchronous download job, and
//! watch its progress to completion. One job is active at a time; progress
//! arrives by polling once per second until the service reports a terminal
//! status.
//!
//! # Core Modules
//!
//! - [`client`] - Typed async client for the service's four endpoints
//! - [`session`] - Download session state machine and progress poller
//! - [`notify`] - Transient, self-expiring user notifications
//! - [`config`] - Service address resolution (flag, env, file, default)
//! - [`types`] - Canonical data types shared across modules
//! - [`utils`] - Duration and byte-size formatting for the CLI

pub mod client;
pub mod config;
pub mod notify;
pub mod session;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use client::{JobService, ReeldClient, ReeldError};
pub use config::Config;
pub use notify::{NotificationEntry, NotificationQueue, Severity};
pub use session::{DownloadSession, SessionManager, SessionStatus, SessionUpdate};
pub use types::{
    FormatChoice, FormatOption, RemoteFile, RemoteStatus, StatusSnapshot, VideoInfo, BEST_FORMAT,
};
pub use utils::{format_duration, format_size};
