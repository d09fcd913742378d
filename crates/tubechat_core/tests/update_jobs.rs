use std::sync::Once;

use pretty_assertions::assert_eq;
use tubechat_core::{
    update, AppState, Effect, Msg, Notification, NotifyLevel, PollOutcome, ProcessingStatus,
    StallReason, VideoRecord,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn video(id: &str, status: ProcessingStatus) -> VideoRecord {
    VideoRecord {
        id: id.to_string(),
        youtube_id: format!("yt-{id}"),
        title: format!("Video {id}"),
        url: format!("https://www.youtube.com/watch?v=yt-{id}"),
        description: None,
        project_id: Some("p-1".to_string()),
        duration: None,
        views: None,
        thumbnail_url: None,
        upload_date: None,
        processing_status: status,
        processed_at: None,
    }
}

fn created(state: AppState, id: &str) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::VideoCreated {
            project_id: "p-1".to_string(),
            video: video(id, ProcessingStatus::Pending),
        },
    )
}

fn loaded(state: AppState, seq: u64, videos: Vec<VideoRecord>) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::CollectionLoaded {
            project_id: "p-1".to_string(),
            seq,
            videos,
        },
    )
}

#[test]
fn add_video_requests_creation() {
    init_logging();
    let (_state, effects) = update(
        AppState::new(),
        Msg::AddVideoSubmitted {
            project_id: "p-1".to_string(),
            url: " https://www.youtube.com/watch?v=abc ".to_string(),
        },
    );

    assert_eq!(
        effects,
        vec![Effect::CreateVideo {
            project_id: "p-1".to_string(),
            url: "https://www.youtube.com/watch?v=abc".to_string(),
        }]
    );
}

#[test]
fn add_video_rejects_invalid_url() {
    init_logging();
    let (state, effects) = update(
        AppState::new(),
        Msg::AddVideoSubmitted {
            project_id: "p-1".to_string(),
            url: "not a url".to_string(),
        },
    );

    assert!(matches!(
        effects.as_slice(),
        [Effect::Notify(Notification {
            level: NotifyLevel::Error,
            ..
        })]
    ));
    assert!(state.view().last_notification.is_some());
}

#[test]
fn created_video_is_polled_once() {
    init_logging();
    let (state, effects) = created(AppState::new(), "v-1");

    assert_eq!(
        &effects[1..],
        &[
            Effect::PollJob {
                video_id: "v-1".to_string(),
                project_id: "p-1".to_string(),
            },
            Effect::RefreshCollection {
                project_id: "p-1".to_string(),
            },
        ]
    );
    assert!(state.job("v-1").unwrap().is_polling());

    let (_state, effects) = created(state, "v-1");
    assert!(effects.is_empty());
}

#[test]
fn create_failure_surfaces_detail_verbatim() {
    init_logging();
    let (state, effects) = update(
        AppState::new(),
        Msg::VideoCreateFailed {
            project_id: "p-1".to_string(),
            detail: "Video already exists".to_string(),
        },
    );

    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::new(
            NotifyLevel::Error,
            "Video already exists"
        ))]
    );
    assert_eq!(state.jobs().count(), 0);
}

#[test]
fn job_progress_only_moves_forward() {
    init_logging();
    let (state, _) = created(AppState::new(), "v-1");
    let (state, _) = update(
        state,
        Msg::JobProgress {
            video_id: "v-1".to_string(),
            status: ProcessingStatus::Processing,
            attempt: 2,
        },
    );
    let (state, _) = update(
        state,
        Msg::JobProgress {
            video_id: "v-1".to_string(),
            status: ProcessingStatus::Pending,
            attempt: 1,
        },
    );

    let job = state.job("v-1").unwrap();
    assert_eq!(job.attempt_count, 2);
    assert_eq!(job.status, ProcessingStatus::Processing);
}

#[test]
fn every_finish_refreshes_the_collection() {
    init_logging();
    let cases = [
        (PollOutcome::Completed, NotifyLevel::Success),
        (PollOutcome::Failed, NotifyLevel::Warning),
        (
            PollOutcome::Stalled(StallReason::AttemptBudget),
            NotifyLevel::Warning,
        ),
        (
            PollOutcome::Stalled(StallReason::ErrorBudget),
            NotifyLevel::Warning,
        ),
    ];
    for (outcome, level) in cases {
        let (state, _) = created(AppState::new(), "v-1");
        let (state, effects) = update(
            state,
            Msg::JobFinished {
                video_id: "v-1".to_string(),
                outcome,
            },
        );

        assert_eq!(effects.len(), 2, "{outcome:?}");
        assert!(
            matches!(&effects[0], Effect::Notify(n) if n.level == level),
            "{outcome:?}"
        );
        assert_eq!(
            effects[1],
            Effect::RefreshCollection {
                project_id: "p-1".to_string()
            }
        );
        assert_eq!(state.job("v-1").unwrap().outcome, Some(outcome));
    }
}

#[test]
fn failed_processing_warns_about_incomplete_metadata() {
    init_logging();
    let (state, _) = created(AppState::new(), "v-1");
    let (_state, effects) = update(
        state,
        Msg::JobFinished {
            video_id: "v-1".to_string(),
            outcome: PollOutcome::Failed,
        },
    );

    let Effect::Notify(notification) = &effects[0] else {
        panic!("expected notification");
    };
    assert!(notification.message.contains("metadata may be incomplete"));
}

#[test]
fn finished_job_can_be_tracked_again() {
    init_logging();
    let (state, _) = created(AppState::new(), "v-1");
    let (state, _) = update(
        state,
        Msg::JobFinished {
            video_id: "v-1".to_string(),
            outcome: PollOutcome::Stalled(StallReason::AttemptBudget),
        },
    );
    let (state, duplicate_finish) = update(
        state,
        Msg::JobFinished {
            video_id: "v-1".to_string(),
            outcome: PollOutcome::Completed,
        },
    );
    assert!(duplicate_finish.is_empty());

    let (_state, effects) = created(state, "v-1");
    assert!(effects
        .iter()
        .any(|e| matches!(e, Effect::PollJob { video_id, .. } if video_id == "v-1")));
}

#[test]
fn stale_collection_response_is_discarded() {
    init_logging();
    let (state, _) = loaded(
        AppState::new(),
        5,
        vec![video("v-1", ProcessingStatus::Completed)],
    );
    let (mut state, effects) = loaded(state, 4, vec![video("v-1", ProcessingStatus::Pending)]);

    assert!(effects.is_empty());
    let collection = state.collection("p-1").unwrap();
    assert_eq!(collection.last_applied_seq(), Some(5));
    assert_eq!(
        collection.videos()[0].processing_status,
        ProcessingStatus::Completed
    );
    assert!(state.consume_dirty());
    let (mut state, _) = loaded(state, 5, Vec::new());
    assert!(!state.consume_dirty());
}

#[test]
fn pending_members_start_a_single_watch() {
    init_logging();
    let pending = vec![
        video("v-1", ProcessingStatus::Completed),
        video("v-2", ProcessingStatus::Processing),
    ];
    let (state, effects) = loaded(AppState::new(), 1, pending.clone());
    assert_eq!(
        effects,
        vec![Effect::WatchCollection {
            project_id: "p-1".to_string()
        }]
    );

    let (state, effects) = loaded(state, 2, pending);
    assert!(effects.is_empty());
    let (state, effects) = update(
        state,
        Msg::WatchCollectionClicked {
            project_id: "p-1".to_string(),
        },
    );
    assert!(effects.is_empty());
    assert!(state.collection("p-1").unwrap().is_watching());
}

#[test]
fn settled_collection_does_not_watch() {
    init_logging();
    let (state, effects) = loaded(
        AppState::new(),
        1,
        vec![
            video("v-1", ProcessingStatus::Completed),
            video("v-2", ProcessingStatus::Failed),
        ],
    );

    assert!(effects.is_empty());
    assert!(!state.collection("p-1").unwrap().has_pending());
}

#[test]
fn watch_stop_allows_restart_and_warns_on_stall() {
    init_logging();
    let (state, _) = loaded(
        AppState::new(),
        1,
        vec![video("v-1", ProcessingStatus::Pending)],
    );
    let (state, effects) = update(
        state,
        Msg::CollectionWatchStopped {
            project_id: "p-1".to_string(),
            outcome: PollOutcome::Stalled(StallReason::AttemptBudget),
        },
    );
    assert!(matches!(
        effects.as_slice(),
        [Effect::Notify(Notification {
            level: NotifyLevel::Warning,
            ..
        })]
    ));
    assert!(!state.collection("p-1").unwrap().is_watching());

    let (_state, effects) = update(
        state,
        Msg::WatchCollectionClicked {
            project_id: "p-1".to_string(),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::WatchCollection {
            project_id: "p-1".to_string()
        }]
    );
}

#[test]
fn refresh_request_fetches_and_pending_list_starts_watch() {
    init_logging();
    let (state, effects) = update(
        AppState::new(),
        Msg::RefreshCollectionClicked {
            project_id: "p-1".to_string(),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::RefreshCollection {
            project_id: "p-1".to_string()
        }]
    );
    assert!(state.collection("p-1").is_none());

    let (state, effects) = loaded(state, 1, vec![video("v-1", ProcessingStatus::Pending)]);
    assert_eq!(
        effects,
        vec![Effect::WatchCollection {
            project_id: "p-1".to_string()
        }]
    );
    assert!(state.collection("p-1").unwrap().is_watching());
}
