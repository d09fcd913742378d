use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use tokio_util::sync::CancellationToken;
use tubechat_core::{
    aggregate_status, PollObservation, PollOutcome, PollPolicy, PollStep, PollTracker,
    ProcessingStatus, StallReason, VideoRecord,
};

use crate::{ApiClient, ApiError, EngineEvent, EventSink};

#[async_trait::async_trait]
pub trait StatusSource: Send + Sync {
    async fn processing_status(&self, video_id: &str) -> Result<ProcessingStatus, ApiError>;
}

#[async_trait::async_trait]
pub trait CollectionSource: Send + Sync {
    async fn project_videos(&self, project_id: &str) -> Result<Vec<VideoRecord>, ApiError>;
}

#[async_trait::async_trait]
impl StatusSource for ApiClient {
    async fn processing_status(&self, video_id: &str) -> Result<ProcessingStatus, ApiError> {
        ApiClient::processing_status(self, video_id).await
    }
}

#[async_trait::async_trait]
impl CollectionSource for ApiClient {
    async fn project_videos(&self, project_id: &str) -> Result<Vec<VideoRecord>, ApiError> {
        ApiClient::project_videos(self, project_id).await
    }
}

/// Hands out increasing sequence numbers for list fetches, in issue order.
#[derive(Debug, Default)]
pub struct FetchSequencer {
    last: AtomicU64,
}

impl FetchSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Polls a video's processing status until it is terminal or a budget runs out.
///
/// Every successful poll is reported as [`EngineEvent::JobProgress`]. Returns
/// `None` when cancelled.
pub async fn poll_job(
    source: &dyn StatusSource,
    video_id: &str,
    policy: PollPolicy,
    sink: &dyn EventSink,
    cancel: &CancellationToken,
) -> Option<PollOutcome> {
    let outcome = run_poll_loop(policy, Duration::ZERO, cancel, |attempt| async move {
        match source.processing_status(video_id).await {
            Ok(status) => {
                engine_debug!("Video {} poll {}: {}", video_id, attempt, status.as_str());
                sink.emit(EngineEvent::JobProgress {
                    video_id: video_id.to_string(),
                    status: status.clone(),
                    attempt,
                });
                PollObservation::Status(status)
            }
            Err(err) => {
                engine_warn!("Video {} poll {} failed: {}", video_id, attempt, err);
                PollObservation::RequestFailed(err.to_string())
            }
        }
    })
    .await;
    if let Some(outcome) = outcome {
        engine_info!("Stopped polling video {}: {:?}", video_id, outcome);
    }
    outcome
}

/// Refreshes a project's video list while any member is non-terminal.
///
/// The first fetch waits one interval, since a watch starts right after a
/// list was loaded. Returns `None` when cancelled.
pub async fn watch_collection(
    source: &dyn CollectionSource,
    project_id: &str,
    policy: PollPolicy,
    sequencer: &FetchSequencer,
    sink: &dyn EventSink,
    cancel: &CancellationToken,
) -> Option<PollOutcome> {
    let initial_delay = policy.schedule.interval(0);
    let outcome = run_poll_loop(policy, initial_delay, cancel, |attempt| async move {
        engine_debug!("Refreshing project {} videos (watch poll {})", project_id, attempt);
        match fetch_collection(source, project_id, sequencer, sink).await {
            Ok(status) => PollObservation::Status(status),
            Err(err) => PollObservation::RequestFailed(err.to_string()),
        }
    })
    .await;
    if let Some(outcome) = outcome {
        engine_info!("Stopped watching project {}: {:?}", project_id, outcome);
    }
    outcome
}

/// One list fetch, reported as [`EngineEvent::CollectionLoaded`].
pub async fn refresh_collection(
    source: &dyn CollectionSource,
    project_id: &str,
    sequencer: &FetchSequencer,
    sink: &dyn EventSink,
) {
    let _ = fetch_collection(source, project_id, sequencer, sink).await;
}

async fn fetch_collection(
    source: &dyn CollectionSource,
    project_id: &str,
    sequencer: &FetchSequencer,
    sink: &dyn EventSink,
) -> Result<ProcessingStatus, ApiError> {
    let seq = sequencer.next();
    let result = source.project_videos(project_id).await;
    let status = match &result {
        Ok(videos) => Ok(aggregate_status(videos)),
        Err(err) => {
            engine_warn!("Fetching project {} videos failed: {}", project_id, err);
            Err(err.clone())
        }
    };
    sink.emit(EngineEvent::CollectionLoaded {
        project_id: project_id.to_string(),
        seq,
        result,
    });
    status
}

/// Drives a [`PollTracker`]: one request at a time, sleeping between requests.
///
/// `poll_once` receives the 1-based attempt number.
async fn run_poll_loop<F, Fut>(
    policy: PollPolicy,
    initial_delay: Duration,
    cancel: &CancellationToken,
    mut poll_once: F,
) -> Option<PollOutcome>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = PollObservation>,
{
    let mut tracker = PollTracker::new(policy);
    if tracker.is_exhausted() {
        return Some(PollOutcome::Stalled(StallReason::AttemptBudget));
    }
    if !sleep_or_cancel(initial_delay, cancel).await {
        return None;
    }

    loop {
        let observation = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            observation = poll_once(tracker.attempts() + 1) => observation,
        };
        match tracker.observe(observation) {
            PollStep::Finished(outcome) => return Some(outcome),
            PollStep::Continue { delay } => {
                if !sleep_or_cancel(delay, cancel).await {
                    return None;
                }
            }
        }
    }
}

/// Returns false if cancelled before the delay elapsed.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
