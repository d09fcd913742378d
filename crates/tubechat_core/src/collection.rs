use serde::Deserialize;

use crate::poll::ProcessingStatus;

/// A video as returned by the backend's video endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    #[serde(default)]
    pub youtube_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    /// Seconds.
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub views: Option<u64>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub processing_status: ProcessingStatus,
    #[serde(default)]
    pub processed_at: Option<String>,
}

/// Collapses a video list into one status for the list-level poll loop:
/// `Processing` while any member is non-terminal, `Completed` otherwise.
pub fn aggregate_status(videos: &[VideoRecord]) -> ProcessingStatus {
    if videos.iter().any(|v| !v.processing_status.is_terminal()) {
        ProcessingStatus::Processing
    } else {
        ProcessingStatus::Completed
    }
}

/// The locally known video list of one project.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CollectionState {
    videos: Vec<VideoRecord>,
    last_applied_seq: Option<u64>,
    watching: bool,
}

impl CollectionState {
    pub fn videos(&self) -> &[VideoRecord] {
        &self.videos
    }

    pub fn is_watching(&self) -> bool {
        self.watching
    }

    pub fn last_applied_seq(&self) -> Option<u64> {
        self.last_applied_seq
    }

    pub fn has_pending(&self) -> bool {
        !aggregate_status(&self.videos).is_terminal()
    }

    /// Replaces the list unless a response issued later was already applied.
    pub(crate) fn apply(&mut self, seq: u64, videos: Vec<VideoRecord>) -> bool {
        if self.last_applied_seq.is_some_and(|last| seq <= last) {
            return false;
        }
        self.last_applied_seq = Some(seq);
        self.videos = videos;
        true
    }

    /// Marks a watch loop as running. Returns false if one already is.
    pub(crate) fn start_watch(&mut self) -> bool {
        if self.watching {
            return false;
        }
        self.watching = true;
        true
    }

    pub(crate) fn stop_watch(&mut self) {
        self.watching = false;
    }
}
