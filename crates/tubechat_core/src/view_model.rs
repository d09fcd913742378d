use chrono::{DateTime, Utc};

use crate::{
    MessageId, Notification, PollOutcome, ProcessingStatus, Role, Source, SubmitPhase,
    VideoRecord,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub chat: ChatView,
    pub jobs: Vec<JobRowView>,
    pub collections: Vec<CollectionView>,
    pub last_notification: Option<Notification>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatView {
    pub thread_id: Option<String>,
    /// Visible messages; empty assistant placeholders are never included.
    pub messages: Vec<MessageView>,
    pub input: String,
    pub staged_file_name: Option<String>,
    pub phase: SubmitPhase,
    pub loading_history: bool,
    pub input_enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageView {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    pub sources: Vec<Source>,
    pub is_error: bool,
    pub is_streaming: bool,
    pub created_at: DateTime<Utc>,
    /// Part of a resumed thread's stored history.
    pub restored: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRowView {
    pub video_id: String,
    pub project_id: String,
    pub title: String,
    pub status: ProcessingStatus,
    pub attempts: u32,
    pub outcome: Option<PollOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionView {
    pub project_id: String,
    pub videos: Vec<VideoRecord>,
    pub watching: bool,
    pub has_pending: bool,
}
