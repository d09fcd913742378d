use crate::{ChatRequest, StagedFile, SubmitId};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    UploadFile {
        submit_id: SubmitId,
        file: StagedFile,
    },
    OpenChatStream {
        submit_id: SubmitId,
        request: ChatRequest,
    },
    CancelStream {
        submit_id: SubmitId,
    },
    /// Fetch the stored messages of a resumed thread.
    LoadThread {
        thread_id: String,
    },
    /// Render the current view right away, bypassing tick coalescing.
    Render,
    CreateVideo {
        project_id: String,
        url: String,
    },
    PollJob {
        video_id: String,
        project_id: String,
    },
    RefreshCollection {
        project_id: String,
    },
    WatchCollection {
        project_id: String,
    },
    Notify(Notification),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotifyLevel,
    pub message: String,
}

impl Notification {
    pub fn new(level: NotifyLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}
