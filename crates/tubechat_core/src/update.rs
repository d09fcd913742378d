use chrono::{DateTime, Utc};
use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::chat::EventApplied;
use crate::state::TrackedJob;
use crate::{
    AppState, Effect, Msg, Notification, NotifyLevel, PollOutcome, StallReason, SubmitId,
    VideoRecord,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::InputChanged(text) => {
            if state.chat().input() != text {
                state.chat_mut().set_input(text);
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::FileStaged(file) => {
            if state.chat().is_busy() {
                return (state, Vec::new());
            }
            state.chat_mut().stage_file(file);
            state.mark_dirty();
            Vec::new()
        }
        Msg::FileCleared => {
            if state.chat().is_busy() || state.chat().staged_file().is_none() {
                return (state, Vec::new());
            }
            state.chat_mut().clear_file();
            state.mark_dirty();
            Vec::new()
        }
        Msg::ScopeChanged(scope) => {
            state.chat_mut().set_scope(scope);
            state.mark_dirty();
            Vec::new()
        }
        Msg::SubmitClicked { at } => submit(&mut state, at),
        Msg::UploadCompleted { submit_id, file } => {
            match state.chat().build_request(submit_id, Some(file)) {
                Some(request) => vec![Effect::OpenChatStream { submit_id, request }],
                None => Vec::new(),
            }
        }
        Msg::UploadFailed {
            submit_id,
            message,
            at,
        } => fail_submit(&mut state, submit_id, &message, at),
        Msg::StreamOpened { submit_id } => {
            if state.chat_mut().stream_opened(submit_id) {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::StreamEventReceived { submit_id, event } => {
            let started_at = state
                .chat()
                .streaming_message()
                .map(|m| m.created_at)
                .unwrap_or_default();
            match state.chat_mut().apply_event(submit_id, event) {
                EventApplied::TextAppended => {
                    state.mark_dirty();
                    vec![Effect::Render]
                }
                EventApplied::SourcesReplaced | EventApplied::Finished => {
                    state.mark_dirty();
                    Vec::new()
                }
                // Server errors take the same path as transport failures.
                EventApplied::ServerError(content) => {
                    fail_submit(&mut state, submit_id, &content, started_at)
                }
                EventApplied::Ignored => Vec::new(),
            }
        }
        Msg::StreamClosed { submit_id } => {
            if state.chat_mut().stream_closed(submit_id) {
                engine_warn!("Chat stream {} closed without a done event", submit_id);
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::StreamFailed {
            submit_id,
            message,
            at,
        } => fail_submit(&mut state, submit_id, &message, at),
        Msg::CancelClicked => match state.chat_mut().cancel() {
            Some(submit_id) => {
                state.mark_dirty();
                vec![Effect::CancelStream { submit_id }]
            }
            None => Vec::new(),
        },
        Msg::NewThreadClicked => {
            if state.chat_mut().clear_thread() {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::ThreadResumed(thread_id) => {
            let thread_id = thread_id.trim().to_string();
            if !thread_id.is_empty() && state.chat_mut().resume_thread(thread_id.clone()) {
                state.mark_dirty();
                vec![Effect::LoadThread { thread_id }]
            } else {
                Vec::new()
            }
        }
        Msg::ThreadHistoryLoaded {
            thread_id,
            messages,
            at,
        } => {
            let count = messages.len();
            if state.chat_mut().load_history(&thread_id, messages, at) {
                engine_info!("Restored {} stored messages of thread {}", count, thread_id);
                state.mark_dirty();
                vec![Effect::Render]
            } else {
                engine_debug!("Ignoring history of thread {}", thread_id);
                Vec::new()
            }
        }
        Msg::ThreadHistoryFailed { thread_id, message } => {
            if !state.chat_mut().history_failed(&thread_id) {
                return (state, Vec::new());
            }
            engine_warn!("Loading thread {} failed: {}", thread_id, message);
            notify(
                &mut state,
                NotifyLevel::Warning,
                format!("Couldn't load earlier messages of this thread: {message}"),
            )
        }
        Msg::AddVideoSubmitted { project_id, url } => add_video(&mut state, project_id, url),
        Msg::VideoCreated { project_id, video } => video_created(&mut state, project_id, video),
        Msg::VideoCreateFailed { project_id, detail } => {
            engine_warn!("Adding video to project {} failed: {}", project_id, detail);
            notify(&mut state, NotifyLevel::Error, detail)
        }
        Msg::JobProgress {
            video_id,
            status,
            attempt,
        } => {
            if let Some(job) = state.job_mut(&video_id) {
                if job.is_polling() && attempt > job.attempt_count {
                    job.attempt_count = attempt;
                    job.status = status;
                    state.mark_dirty();
                }
            }
            Vec::new()
        }
        Msg::JobFinished { video_id, outcome } => job_finished(&mut state, &video_id, outcome),
        Msg::RefreshCollectionClicked { project_id } => {
            if project_id.trim().is_empty() {
                Vec::new()
            } else {
                vec![Effect::RefreshCollection { project_id }]
            }
        }
        Msg::WatchCollectionClicked { project_id } => {
            if state.collection_mut(&project_id).start_watch() {
                state.mark_dirty();
                vec![Effect::WatchCollection { project_id }]
            } else {
                Vec::new()
            }
        }
        Msg::CollectionLoaded {
            project_id,
            seq,
            videos,
        } => collection_loaded(&mut state, project_id, seq, videos),
        Msg::CollectionLoadFailed {
            project_id,
            message,
        } => {
            engine_warn!("Refreshing videos of project {} failed: {}", project_id, message);
            notify(&mut state, NotifyLevel::Error, message)
        }
        Msg::CollectionWatchStopped {
            project_id,
            outcome,
        } => {
            state.collection_mut(&project_id).stop_watch();
            state.mark_dirty();
            match outcome {
                PollOutcome::Stalled(_) => notify(
                    &mut state,
                    NotifyLevel::Warning,
                    "Some videos are still processing. Refresh the list to check again.",
                ),
                PollOutcome::Completed | PollOutcome::Failed => Vec::new(),
            }
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn submit(state: &mut AppState, at: DateTime<Utc>) -> Vec<Effect> {
    let Some((submit_id, staged)) = state.chat_mut().begin_submit(at) else {
        return Vec::new();
    };
    state.mark_dirty();
    if let Some(file) = staged {
        return vec![Effect::UploadFile { submit_id, file }];
    }
    match state.chat().build_request(submit_id, None) {
        Some(request) => vec![Effect::OpenChatStream { submit_id, request }],
        None => Vec::new(),
    }
}

fn fail_submit(
    state: &mut AppState,
    submit_id: SubmitId,
    reason: &str,
    at: DateTime<Utc>,
) -> Vec<Effect> {
    if !state.chat_mut().fail(submit_id, reason, at) {
        engine_debug!("Ignoring failure of inactive submit {}: {}", submit_id, reason);
        return Vec::new();
    }
    engine_warn!("Chat submit {} failed: {}", submit_id, reason);
    state.mark_dirty();
    vec![Effect::Render]
}

fn add_video(state: &mut AppState, project_id: String, url: String) -> Vec<Effect> {
    let url = url.trim().to_string();
    if project_id.trim().is_empty() {
        return notify(state, NotifyLevel::Error, "Select a project before adding videos.");
    }
    let valid = url::Url::parse(&url)
        .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
        .unwrap_or(false);
    if !valid {
        return notify(state, NotifyLevel::Error, "Please enter a valid video URL.");
    }
    vec![Effect::CreateVideo { project_id, url }]
}

fn video_created(state: &mut AppState, project_id: String, video: VideoRecord) -> Vec<Effect> {
    let tracked = state.track_job(TrackedJob {
        video_id: video.id.clone(),
        project_id: project_id.clone(),
        title: video.title.clone(),
        status: video.processing_status.clone(),
        attempt_count: 0,
        outcome: None,
    });
    if !tracked {
        engine_debug!("Video {} is already being polled", video.id);
        return Vec::new();
    }
    engine_info!("Tracking processing of video {} ({})", video.id, video.title);
    let mut effects = notify(
        state,
        NotifyLevel::Info,
        "Video added. Extracting transcript in the background.",
    );
    effects.push(Effect::PollJob {
        video_id: video.id,
        project_id: project_id.clone(),
    });
    effects.push(Effect::RefreshCollection { project_id });
    effects
}

fn job_finished(state: &mut AppState, video_id: &str, outcome: PollOutcome) -> Vec<Effect> {
    let Some(job) = state.job_mut(video_id) else {
        return Vec::new();
    };
    if !job.is_polling() {
        return Vec::new();
    }
    job.outcome = Some(outcome);
    let project_id = job.project_id.clone();
    let title = job.title.clone();

    let (level, message) = match outcome {
        PollOutcome::Completed => (
            NotifyLevel::Success,
            format!("Finished processing \"{title}\"."),
        ),
        PollOutcome::Failed => (
            NotifyLevel::Warning,
            format!("Processing \"{title}\" failed. Video metadata may be incomplete."),
        ),
        PollOutcome::Stalled(reason) => {
            engine_warn!("Stopped polling video {} ({:?})", video_id, reason);
            (
                NotifyLevel::Warning,
                match reason {
                    StallReason::AttemptBudget => format!(
                        "Processing \"{title}\" is taking longer than expected. Refresh the list later."
                    ),
                    StallReason::ErrorBudget => format!(
                        "Couldn't check on \"{title}\" right now. Refresh the list later."
                    ),
                },
            )
        }
    };
    let mut effects = notify(state, level, message);
    effects.push(Effect::RefreshCollection { project_id });
    effects
}

fn collection_loaded(
    state: &mut AppState,
    project_id: String,
    seq: u64,
    videos: Vec<VideoRecord>,
) -> Vec<Effect> {
    let collection = state.collection_mut(&project_id);
    if !collection.apply(seq, videos) {
        engine_debug!(
            "Discarding stale video list for project {} (seq {}, last applied {:?})",
            project_id,
            seq,
            collection.last_applied_seq()
        );
        return Vec::new();
    }
    let start_watch = collection.has_pending() && collection.start_watch();
    state.mark_dirty();
    if start_watch {
        vec![Effect::WatchCollection { project_id }]
    } else {
        Vec::new()
    }
}

fn notify(state: &mut AppState, level: NotifyLevel, message: impl Into<String>) -> Vec<Effect> {
    let notification = Notification::new(level, message);
    state.set_notification(notification.clone());
    state.mark_dirty();
    vec![Effect::Notify(notification)]
}
