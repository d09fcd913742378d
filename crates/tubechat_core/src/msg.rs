use chrono::{DateTime, Utc};

use crate::{
    ChatScope, PollOutcome, ProcessingStatus, StagedFile, StoredMessage, StreamEvent, SubmitId,
    UploadedFile, VideoRecord,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User edited the chat input box.
    InputChanged(String),
    /// User attached a file to the next message.
    FileStaged(StagedFile),
    FileCleared,
    /// User picked the project / videos the chat should search.
    ScopeChanged(ChatScope),
    /// User sent the current input.
    SubmitClicked { at: DateTime<Utc> },
    UploadCompleted {
        submit_id: SubmitId,
        file: UploadedFile,
    },
    UploadFailed {
        submit_id: SubmitId,
        message: String,
        at: DateTime<Utc>,
    },
    /// Chat stream responded with a success status.
    StreamOpened { submit_id: SubmitId },
    StreamEventReceived {
        submit_id: SubmitId,
        event: StreamEvent,
    },
    /// Transport ended without a `done` event.
    StreamClosed { submit_id: SubmitId },
    /// Non-2xx status, transport error, or a server `error` event.
    StreamFailed {
        submit_id: SubmitId,
        message: String,
        at: DateTime<Utc>,
    },
    CancelClicked,
    NewThreadClicked,
    /// Continue a thread the server created earlier.
    ThreadResumed(String),
    /// Stored messages of a resumed thread. `at` stamps messages without a
    /// readable timestamp.
    ThreadHistoryLoaded {
        thread_id: String,
        messages: Vec<StoredMessage>,
        at: DateTime<Utc>,
    },
    ThreadHistoryFailed { thread_id: String, message: String },
    /// User asked to add a video to a project.
    AddVideoSubmitted { project_id: String, url: String },
    VideoCreated {
        project_id: String,
        video: VideoRecord,
    },
    VideoCreateFailed { project_id: String, detail: String },
    /// Engine poll result for a tracked video.
    JobProgress {
        video_id: String,
        status: ProcessingStatus,
        attempt: u32,
    },
    JobFinished {
        video_id: String,
        outcome: PollOutcome,
    },
    /// User asked for a fresh copy of a project's video list.
    RefreshCollectionClicked { project_id: String },
    WatchCollectionClicked { project_id: String },
    /// A project video list fetch, stamped with its issue order.
    CollectionLoaded {
        project_id: String,
        seq: u64,
        videos: Vec<VideoRecord>,
    },
    CollectionLoadFailed { project_id: String, message: String },
    CollectionWatchStopped {
        project_id: String,
        outcome: PollOutcome,
    },
    /// UI/render tick to coalesce rendering.
    Tick,
    NoOp,
}
