use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::{Source, StreamEvent};
use crate::thread::StoredMessage;

pub type MessageId = u64;
pub type SubmitId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: Role,
    pub text_content: String,
    pub sources: Vec<Source>,
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
    /// Loaded from the server's copy of a resumed thread.
    pub restored: bool,
}

impl ChatMessage {
    /// An assistant message with no text yet: the slot a streamed answer fills.
    pub fn is_placeholder(&self) -> bool {
        self.role == Role::Assistant && !self.is_error && self.text_content.is_empty()
    }
}

/// A local file the user attached to the next message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub name: String,
    pub mime_type: String,
}

/// A file after upload, as referenced by a chat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub url: String,
    pub name: String,
    pub mime_type: String,
}

/// Restricts retrieval to one project and optionally a subset of its videos.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatScope {
    pub project_id: Option<String>,
    pub video_ids: Option<Vec<String>>,
}

/// Body of `POST /api/chat/stream`. Absent values are sent as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub thread_id: Option<String>,
    pub project_id: Option<String>,
    pub video_ids: Option<Vec<String>>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitPhase {
    #[default]
    Idle,
    /// Uploading the staged file or waiting for the stream to open.
    Sending,
    Streaming,
    Done,
    Errored,
}

impl SubmitPhase {
    pub fn is_busy(self) -> bool {
        matches!(self, SubmitPhase::Sending | SubmitPhase::Streaming)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ActiveSubmit {
    submit_id: SubmitId,
    assistant_id: MessageId,
    message: String,
}

/// What applying a stream event did to the session.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EventApplied {
    TextAppended,
    SourcesReplaced,
    Finished,
    ServerError(String),
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatSession {
    thread_id: Option<String>,
    messages: Vec<ChatMessage>,
    input: String,
    staged_file: Option<StagedFile>,
    scope: ChatScope,
    phase: SubmitPhase,
    active: Option<ActiveSubmit>,
    /// Thread whose stored messages have been requested but not yet applied.
    pending_history: Option<String>,
    next_message_id: MessageId,
    next_submit_id: SubmitId,
}

impl ChatSession {
    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn staged_file(&self) -> Option<&StagedFile> {
        self.staged_file.as_ref()
    }

    pub fn scope(&self) -> &ChatScope {
        &self.scope
    }

    pub fn phase(&self) -> SubmitPhase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase.is_busy()
    }

    pub fn is_loading_history(&self) -> bool {
        self.pending_history.is_some()
    }

    pub fn active_submit(&self) -> Option<SubmitId> {
        self.active.as_ref().map(|active| active.submit_id)
    }

    /// The assistant message currently being streamed into, if any.
    pub fn streaming_message(&self) -> Option<&ChatMessage> {
        let active = self.active.as_ref()?;
        self.messages.iter().find(|m| m.id == active.assistant_id)
    }

    pub(crate) fn set_input(&mut self, input: String) {
        self.input = input;
    }

    pub(crate) fn stage_file(&mut self, file: StagedFile) {
        self.staged_file = Some(file);
    }

    pub(crate) fn clear_file(&mut self) {
        self.staged_file = None;
    }

    pub(crate) fn set_scope(&mut self, scope: ChatScope) {
        self.scope = scope;
    }

    /// Starts a submit: records the user message and an assistant placeholder.
    ///
    /// Returns `None` while another submit is in flight or when there is
    /// nothing to send.
    pub(crate) fn begin_submit(
        &mut self,
        at: DateTime<Utc>,
    ) -> Option<(SubmitId, Option<StagedFile>)> {
        if self.phase.is_busy() {
            return None;
        }
        let message = self.input.trim().to_string();
        if message.is_empty() {
            return None;
        }

        self.next_submit_id += 1;
        let submit_id = self.next_submit_id;

        self.push_message(Role::User, message.clone(), false, at);
        let assistant_id = self.push_message(Role::Assistant, String::new(), false, at);

        self.active = Some(ActiveSubmit {
            submit_id,
            assistant_id,
            message,
        });
        self.phase = SubmitPhase::Sending;
        Some((submit_id, self.staged_file.clone()))
    }

    pub(crate) fn build_request(
        &self,
        submit_id: SubmitId,
        file: Option<UploadedFile>,
    ) -> Option<ChatRequest> {
        let active = self.current(submit_id)?;
        let (file_url, file_name, file_type) = match file {
            Some(file) => (Some(file.url), Some(file.name), Some(file.mime_type)),
            None => (None, None, None),
        };
        Some(ChatRequest {
            message: active.message.clone(),
            thread_id: self.thread_id.clone(),
            project_id: self.scope.project_id.clone(),
            video_ids: self.scope.video_ids.clone(),
            file_url,
            file_name,
            file_type,
        })
    }

    pub(crate) fn stream_opened(&mut self, submit_id: SubmitId) -> bool {
        if self.current(submit_id).is_none() {
            return false;
        }
        self.phase = SubmitPhase::Streaming;
        true
    }

    pub(crate) fn apply_event(&mut self, submit_id: SubmitId, event: StreamEvent) -> EventApplied {
        let Some(assistant_id) = self.current(submit_id).map(|a| a.assistant_id) else {
            return EventApplied::Ignored;
        };
        match event {
            StreamEvent::Text { content } => {
                if content.is_empty() {
                    return EventApplied::Ignored;
                }
                if let Some(message) = self.message_mut(assistant_id) {
                    message.text_content.push_str(&content);
                }
                EventApplied::TextAppended
            }
            StreamEvent::Sources { sources } => {
                if let Some(message) = self.message_mut(assistant_id) {
                    message.sources = sources;
                }
                EventApplied::SourcesReplaced
            }
            StreamEvent::Done { thread_id, .. } => {
                if self.thread_id.is_none() {
                    self.thread_id = thread_id.filter(|id| !id.is_empty());
                }
                self.complete();
                EventApplied::Finished
            }
            StreamEvent::Error { content } => EventApplied::ServerError(content),
            StreamEvent::Unknown => EventApplied::Ignored,
        }
    }

    /// Transport closed without a `done` event.
    pub(crate) fn stream_closed(&mut self, submit_id: SubmitId) -> bool {
        if self.current(submit_id).is_none() {
            return false;
        }
        self.complete();
        true
    }

    /// Replaces the in-progress answer with an error message.
    pub(crate) fn fail(&mut self, submit_id: SubmitId, reason: &str, at: DateTime<Utc>) -> bool {
        let Some(active) = self.current(submit_id).cloned() else {
            return false;
        };
        self.messages.retain(|m| m.id != active.assistant_id);
        self.push_message(Role::Assistant, user_facing_error(reason), true, at);
        self.active = None;
        self.phase = SubmitPhase::Errored;
        true
    }

    /// Abandons the active submit, keeping any text already streamed.
    pub(crate) fn cancel(&mut self) -> Option<SubmitId> {
        let active = self.active.take()?;
        self.drop_empty_placeholder(active.assistant_id);
        self.phase = SubmitPhase::Idle;
        Some(active.submit_id)
    }

    /// Forgets the thread and its messages. Refused while a submit is in flight.
    pub(crate) fn clear_thread(&mut self) -> bool {
        if self.phase.is_busy() {
            return false;
        }
        self.thread_id = None;
        self.pending_history = None;
        self.messages.clear();
        self.phase = SubmitPhase::Idle;
        true
    }

    /// Continues an existing server thread. Refused while a submit is in flight.
    pub(crate) fn resume_thread(&mut self, thread_id: String) -> bool {
        if self.phase.is_busy() || self.thread_id.as_deref() == Some(thread_id.as_str()) {
            return false;
        }
        self.pending_history = Some(thread_id.clone());
        self.thread_id = Some(thread_id);
        self.messages.clear();
        self.phase = SubmitPhase::Idle;
        true
    }

    /// Puts a resumed thread's stored messages ahead of anything sent since.
    ///
    /// Only the history requested by the latest resume is accepted.
    pub(crate) fn load_history(
        &mut self,
        thread_id: &str,
        stored: Vec<StoredMessage>,
        at: DateTime<Utc>,
    ) -> bool {
        if self.pending_history.as_deref() != Some(thread_id) {
            return false;
        }
        self.pending_history = None;

        let mut restored = Vec::with_capacity(stored.len());
        for message in stored {
            let Some(role) = message.role() else {
                continue;
            };
            let text_content = message.content.clone().unwrap_or_default();
            if text_content.trim().is_empty() {
                continue;
            }
            self.next_message_id += 1;
            restored.push(ChatMessage {
                id: self.next_message_id,
                role,
                sources: message.parsed_sources(),
                created_at: message.created_at_or(at),
                text_content,
                is_error: false,
                restored: true,
            });
        }
        restored.append(&mut self.messages);
        self.messages = restored;
        true
    }

    /// The history request for `thread_id` failed; the thread stays usable.
    pub(crate) fn history_failed(&mut self, thread_id: &str) -> bool {
        if self.pending_history.as_deref() != Some(thread_id) {
            return false;
        }
        self.pending_history = None;
        true
    }

    fn complete(&mut self) {
        if let Some(active) = self.active.take() {
            self.drop_empty_placeholder(active.assistant_id);
        }
        self.input.clear();
        self.staged_file = None;
        self.phase = SubmitPhase::Done;
    }

    fn drop_empty_placeholder(&mut self, assistant_id: MessageId) {
        self.messages
            .retain(|m| !(m.id == assistant_id && m.is_placeholder()));
    }

    fn current(&self, submit_id: SubmitId) -> Option<&ActiveSubmit> {
        self.active
            .as_ref()
            .filter(|active| active.submit_id == submit_id)
    }

    fn message_mut(&mut self, id: MessageId) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    fn push_message(
        &mut self,
        role: Role,
        text_content: String,
        is_error: bool,
        at: DateTime<Utc>,
    ) -> MessageId {
        self.next_message_id += 1;
        let id = self.next_message_id;
        self.messages.push(ChatMessage {
            id,
            role,
            text_content,
            sources: Vec::new(),
            is_error,
            created_at: at,
            restored: false,
        });
        id
    }
}

fn user_facing_error(reason: &str) -> String {
    let reason = reason.trim();
    if reason.is_empty() {
        "Sorry, I couldn't answer that. Please try again.".to_string()
    } else {
        format!("Sorry, I couldn't answer that: {reason}")
    }
}
