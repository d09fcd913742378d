use std::fmt;

use tubechat_core::{
    PollOutcome, ProcessingStatus, StreamEvent, SubmitId, ThreadDetail, UploadedFile,
    VideoRecord,
};

/// Progress and results reported by the engine back to the UI loop.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    UploadFinished {
        submit_id: SubmitId,
        result: Result<UploadedFile, ApiError>,
    },
    StreamOpened {
        submit_id: SubmitId,
    },
    Stream {
        submit_id: SubmitId,
        event: StreamEvent,
    },
    StreamFinished {
        submit_id: SubmitId,
        result: Result<StreamEnd, RelayError>,
    },
    VideoCreated {
        project_id: String,
        result: Result<VideoRecord, ApiError>,
    },
    JobProgress {
        video_id: String,
        status: ProcessingStatus,
        attempt: u32,
    },
    JobFinished {
        video_id: String,
        outcome: PollOutcome,
    },
    CollectionLoaded {
        project_id: String,
        seq: u64,
        result: Result<Vec<VideoRecord>, ApiError>,
    },
    CollectionWatchStopped {
        project_id: String,
        outcome: PollOutcome,
    },
    ThreadLoaded {
        thread_id: String,
        result: Result<ThreadDetail, ApiError>,
    },
}

/// How a chat stream that did not fail came to an end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The server sent `done`.
    Done { thread_id: Option<String> },
    /// The transport closed without a `done` event.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Text suitable for showing to the user: the backend `detail` when there was one.
    pub fn user_message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
    Io,
    /// Refused locally before any request was made.
    Rejected,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "invalid response body"),
            FailureKind::Io => write!(f, "io error"),
            FailureKind::Rejected => write!(f, "rejected"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The server sent an `error` event.
    #[error("server error: {0}")]
    Server(String),
    #[error("cancelled")]
    Cancelled,
}

impl RelayError {
    pub fn user_message(&self) -> String {
        match self {
            RelayError::Api(err) => err.user_message().to_string(),
            RelayError::Server(content) => content.clone(),
            RelayError::Cancelled => "cancelled".to_string(),
        }
    }
}
