use std::collections::BTreeMap;

use crate::chat::ChatSession;
use crate::collection::CollectionState;
use crate::effect::Notification;
use crate::poll::{PollOutcome, ProcessingStatus};
use crate::view_model::{AppViewModel, ChatView, CollectionView, JobRowView, MessageView};

/// A video whose background processing is being polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedJob {
    pub video_id: String,
    pub project_id: String,
    pub title: String,
    pub status: ProcessingStatus,
    pub attempt_count: u32,
    /// Set once polling has halted.
    pub outcome: Option<PollOutcome>,
}

impl TrackedJob {
    pub fn is_polling(&self) -> bool {
        self.outcome.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    chat: ChatSession,
    jobs: BTreeMap<String, TrackedJob>,
    collections: BTreeMap<String, CollectionState>,
    last_notification: Option<Notification>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    pub fn job(&self, video_id: &str) -> Option<&TrackedJob> {
        self.jobs.get(video_id)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &TrackedJob> {
        self.jobs.values()
    }

    pub fn collection(&self, project_id: &str) -> Option<&CollectionState> {
        self.collections.get(project_id)
    }

    pub fn last_notification(&self) -> Option<&Notification> {
        self.last_notification.as_ref()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            chat: self.chat_view(),
            jobs: self
                .jobs
                .values()
                .map(|job| JobRowView {
                    video_id: job.video_id.clone(),
                    project_id: job.project_id.clone(),
                    title: job.title.clone(),
                    status: job.status.clone(),
                    attempts: job.attempt_count,
                    outcome: job.outcome,
                })
                .collect(),
            collections: self
                .collections
                .iter()
                .map(|(project_id, collection)| CollectionView {
                    project_id: project_id.clone(),
                    videos: collection.videos().to_vec(),
                    watching: collection.is_watching(),
                    has_pending: collection.has_pending(),
                })
                .collect(),
            last_notification: self.last_notification.clone(),
            dirty: self.dirty,
        }
    }

    fn chat_view(&self) -> ChatView {
        let streaming_id = self.chat.streaming_message().map(|m| m.id);
        ChatView {
            thread_id: self.chat.thread_id().map(str::to_owned),
            messages: self
                .chat
                .messages()
                .iter()
                .filter(|m| !m.is_placeholder())
                .map(|m| MessageView {
                    id: m.id,
                    role: m.role,
                    text: m.text_content.clone(),
                    sources: m.sources.clone(),
                    is_error: m.is_error,
                    is_streaming: Some(m.id) == streaming_id,
                    created_at: m.created_at,
                    restored: m.restored,
                })
                .collect(),
            input: self.chat.input().to_string(),
            staged_file_name: self.chat.staged_file().map(|f| f.name.clone()),
            phase: self.chat.phase(),
            loading_history: self.chat.is_loading_history(),
            input_enabled: !self.chat.is_busy(),
        }
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn chat_mut(&mut self) -> &mut ChatSession {
        &mut self.chat
    }

    pub(crate) fn job_mut(&mut self, video_id: &str) -> Option<&mut TrackedJob> {
        self.jobs.get_mut(video_id)
    }

    /// Starts tracking a job. Returns false if it is already being polled.
    pub(crate) fn track_job(&mut self, job: TrackedJob) -> bool {
        if self
            .jobs
            .get(&job.video_id)
            .is_some_and(TrackedJob::is_polling)
        {
            return false;
        }
        self.jobs.insert(job.video_id.clone(), job);
        true
    }

    pub(crate) fn collection_mut(&mut self, project_id: &str) -> &mut CollectionState {
        self.collections.entry(project_id.to_string()).or_default()
    }

    pub(crate) fn set_notification(&mut self, notification: Notification) {
        self.last_notification = Some(notification);
    }
}
