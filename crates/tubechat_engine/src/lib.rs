//! Tubechat engine: backend API client and the async loops behind the core's effects.
mod client;
mod config;
mod engine;
mod poller;
mod relay;
mod sink;
mod types;
mod upload;

pub use client::{ApiClient, ClientSettings, ProjectDraft, ProjectRecord};
pub use config::{EngineConfig, DEFAULT_API_BASE_URL};
pub use engine::EngineHandle;
pub use poller::{
    poll_job, refresh_collection, watch_collection, CollectionSource, FetchSequencer,
    StatusSource,
};
pub use relay::{consume_event_stream, relay_chat, StreamSink};
pub use sink::{ChannelEventSink, EventSink};
pub use types::{ApiError, EngineEvent, FailureKind, RelayError, StreamEnd};
pub use upload::{guess_mime_type, is_upload_type_allowed, ALLOWED_UPLOAD_TYPES};
