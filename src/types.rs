// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Canonical types used across reelctl.
//!
//! This module provides unified type definitions to avoid duplication.

use serde::{Deserialize, Serialize};

/// Format selector sent to the service when no explicit format was chosen.
///
/// The service resolves it to the best available audio+video encoding.
pub const BEST_FORMAT: &str = "best";

/// One selectable encoding of a video, as reported by the analyze endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormatOption {
    /// Opaque identifier, unique within one `VideoInfo`.
    pub format_id: String,
    /// Human-readable resolution ("480p", "1080p", "audio only").
    pub resolution_label: String,
    /// Container extension ("mp4", "webm", "m4a").
    pub container_ext: String,
    /// File size in bytes, when the service knows it.
    pub filesize: Option<u64>,
}

impl FormatOption {
    /// Menu label for this format ("480p - MP4", with size when known).
    pub fn label(&self) -> String {
        match self.filesize {
            Some(bytes) => format!(
                "{} - {} ({})",
                self.resolution_label,
                self.container_ext.to_uppercase(),
                crate::utils::format_size(bytes)
            ),
            None => format!(
                "{} - {}",
                self.resolution_label,
                self.container_ext.to_uppercase()
            ),
        }
    }
}

/// Metadata for an analyzed video.
///
/// Produced by [`crate::client::ReeldClient::analyze`]; read-only afterward.
/// A later analyze call replaces the previous instance wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoInfo {
    /// Video title as reported by the extractor.
    pub title: String,
    /// Duration in whole seconds, if known.
    pub duration_seconds: Option<u64>,
    /// Thumbnail URL, if the extractor provided one.
    pub thumbnail_url: Option<String>,
    /// Available encodings, in the order the service reported them.
    pub formats: Vec<FormatOption>,
}

/// One entry in the format selection menu.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatChoice {
    /// Selector to pass to `start_download` ("best" or a format id).
    pub selector: String,
    /// Display label for the menu.
    pub label: String,
}

impl VideoInfo {
    /// Build the selection menu: the synthetic "best (auto)" entry first,
    /// then one entry per reported format.
    pub fn format_menu(&self) -> Vec<FormatChoice> {
        let mut menu = Vec::with_capacity(self.formats.len() + 1);
        menu.push(FormatChoice {
            selector: BEST_FORMAT.to_string(),
            label: "Best quality (auto)".to_string(),
        });
        for format in &self.formats {
            menu.push(FormatChoice {
                selector: format.format_id.clone(),
                label: format.label(),
            });
        }
        menu
    }
}

/// Job status vocabulary of the service's progress endpoint.
///
/// Wider than the session's own state set: `starting` is reported before the
/// worker picks a job up, and unknown ids yield `not_found`. Statuses this
/// client does not recognize map to `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RemoteStatus {
    /// Job accepted, worker not yet running.
    Starting,
    /// Transfer in progress.
    Downloading,
    /// Terminal: transfer complete.
    Finished,
    /// Terminal: job failed.
    Error,
    /// The service has no record of the id.
    NotFound,
    /// Unrecognized status string.
    #[default]
    Unknown,
}

impl RemoteStatus {
    /// Map a wire status string onto the known vocabulary.
    pub fn parse(value: &str) -> Self {
        match value {
            "starting" => RemoteStatus::Starting,
            "downloading" => RemoteStatus::Downloading,
            "finished" => RemoteStatus::Finished,
            "error" => RemoteStatus::Error,
            "not_found" => RemoteStatus::NotFound,
            _ => RemoteStatus::Unknown,
        }
    }

    /// True for statuses after which the service reports nothing further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteStatus::Finished | RemoteStatus::Error)
    }
}

/// One poll result for a download job, as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    /// Reported job status.
    pub status: RemoteStatus,
    /// Progress percentage in [0, 100], when reported.
    pub percent: Option<f64>,
    /// Human-readable transfer speed, when reported.
    pub speed: Option<String>,
    /// Output file name, when known.
    pub filename: Option<String>,
    /// Failure message accompanying an `Error` status.
    pub error: Option<String>,
}

/// A completed file in the service's download folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteFile {
    /// File name on the service host.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Modification timestamp, preformatted by the service.
    pub modified: String,
}
