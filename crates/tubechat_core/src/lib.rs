//! Tubechat core: pure state machines for the streaming chat relay and the
//! background-job pollers, plus the view-model they render into.
mod chat;
mod collection;
mod decoder;
mod effect;
mod event;
mod msg;
mod poll;
mod state;
mod thread;
mod update;
mod view_model;

pub use chat::{
    ChatMessage, ChatRequest, ChatScope, ChatSession, MessageId, Role, StagedFile, SubmitId,
    SubmitPhase, UploadedFile,
};
pub use collection::{aggregate_status, CollectionState, VideoRecord};
pub use decoder::EventStreamDecoder;
pub use effect::{Effect, Notification, NotifyLevel};
pub use event::{parse_event_line, ParsedLine, Source, StreamEvent, EVENT_PREFIX};
pub use msg::Msg;
pub use poll::{
    BackoffSchedule, PollObservation, PollOutcome, PollPolicy, PollStep, PollTracker,
    ProcessingStatus, StallReason,
};
pub use state::{AppState, TrackedJob};
pub use thread::{ChatHistory, HistoryEntry, StoredMessage, ThreadDetail, ThreadSummary};
pub use update::update;
pub use view_model::{AppViewModel, ChatView, CollectionView, JobRowView, MessageView};
