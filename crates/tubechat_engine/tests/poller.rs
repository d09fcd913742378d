use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use tubechat_core::{
    BackoffSchedule, PollOutcome, PollPolicy, ProcessingStatus, StallReason, VideoRecord,
};
use tubechat_engine::{
    poll_job, refresh_collection, watch_collection, ApiClient, ApiError, ClientSettings,
    CollectionSource, EngineEvent, EventSink, FetchSequencer, StatusSource,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn fast_policy(max_attempts: u32, max_consecutive_errors: u32) -> PollPolicy {
    PollPolicy {
        schedule: BackoffSchedule::Additive {
            base: Duration::from_millis(1),
            step: Duration::from_millis(1),
            cap: Duration::from_millis(5),
        },
        max_attempts,
        max_consecutive_errors,
    }
}

#[derive(Default)]
struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl TestSink {
    fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl EventSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Answers from a script; once it runs dry the last answer repeats.
struct ScriptedStatus {
    script: Mutex<VecDeque<Result<ProcessingStatus, ApiError>>>,
    last: Mutex<Option<Result<ProcessingStatus, ApiError>>>,
    calls: Mutex<u32>,
}

impl ScriptedStatus {
    fn new(script: Vec<Result<ProcessingStatus, ApiError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl StatusSource for ScriptedStatus {
    async fn processing_status(&self, _video_id: &str) -> Result<ProcessingStatus, ApiError> {
        *self.calls.lock().unwrap() += 1;
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(answer) = next {
            *last = Some(answer);
        }
        last.clone().expect("script must not be empty")
    }
}

/// Obtains a real `ApiError` by hitting a server that always fails.
async fn server_error() -> ApiError {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let client = ApiClient::new(&format!("{}/api", server.uri()), ClientSettings::default()).unwrap();
    client.processing_status("x").await.unwrap_err()
}

#[tokio::test]
async fn stops_when_processing_completes() {
    init_logging();
    let source = ScriptedStatus::new(vec![
        Ok(ProcessingStatus::Pending),
        Ok(ProcessingStatus::Processing),
        Ok(ProcessingStatus::Completed),
    ]);
    let sink = TestSink::default();

    let outcome = poll_job(
        &source,
        "v-1",
        fast_policy(30, 3),
        &sink,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(outcome, Some(PollOutcome::Completed));
    assert_eq!(source.calls(), 3);
    let progress: Vec<_> = sink
        .take()
        .into_iter()
        .map(|event| match event {
            EngineEvent::JobProgress {
                status, attempt, ..
            } => (status, attempt),
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(
        progress,
        vec![
            (ProcessingStatus::Pending, 1),
            (ProcessingStatus::Processing, 2),
            (ProcessingStatus::Completed, 3),
        ]
    );
}

#[tokio::test]
async fn failed_processing_is_terminal() {
    init_logging();
    let source = ScriptedStatus::new(vec![Ok(ProcessingStatus::Failed)]);
    let outcome = poll_job(
        &source,
        "v-1",
        fast_policy(30, 3),
        &TestSink::default(),
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(outcome, Some(PollOutcome::Failed));
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn gives_up_after_attempt_budget() {
    init_logging();
    let source = ScriptedStatus::new(vec![Ok(ProcessingStatus::Processing)]);
    let outcome = poll_job(
        &source,
        "v-1",
        fast_policy(5, 3),
        &TestSink::default(),
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(outcome, Some(PollOutcome::Stalled(StallReason::AttemptBudget)));
    assert_eq!(source.calls(), 5);
}

#[tokio::test]
async fn gives_up_after_consecutive_errors() {
    init_logging();
    let error = server_error().await;
    let source = ScriptedStatus::new(vec![Err(error)]);
    let sink = TestSink::default();

    let outcome = poll_job(&source, "v-1", fast_policy(30, 3), &sink, &CancellationToken::new()).await;

    assert_eq!(outcome, Some(PollOutcome::Stalled(StallReason::ErrorBudget)));
    assert_eq!(source.calls(), 3);
    assert!(sink.take().is_empty());
}

#[tokio::test]
async fn success_resets_the_error_budget() {
    init_logging();
    let error = server_error().await;
    let source = ScriptedStatus::new(vec![
        Err(error.clone()),
        Err(error.clone()),
        Ok(ProcessingStatus::Processing),
        Err(error.clone()),
        Err(error),
        Ok(ProcessingStatus::Completed),
    ]);

    let outcome = poll_job(
        &source,
        "v-1",
        fast_policy(30, 3),
        &TestSink::default(),
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(outcome, Some(PollOutcome::Completed));
    assert_eq!(source.calls(), 6);
}

#[tokio::test]
async fn cancelled_poll_reports_nothing() {
    init_logging();
    let source = ScriptedStatus::new(vec![Ok(ProcessingStatus::Processing)]);
    let policy = PollPolicy {
        schedule: BackoffSchedule::Additive {
            base: Duration::from_secs(60),
            step: Duration::ZERO,
            cap: Duration::from_secs(60),
        },
        max_attempts: 30,
        max_consecutive_errors: 3,
    };
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        poll_job(&source, "v-1", policy, &TestSink::default(), &cancel),
    )
    .await
    .expect("poller should stop on cancel");

    assert_eq!(outcome, None);
    assert_eq!(source.calls(), 1);
}

struct ScriptedCollection {
    script: Mutex<VecDeque<Vec<VideoRecord>>>,
    calls: Mutex<u32>,
}

impl ScriptedCollection {
    fn new(script: Vec<Vec<VideoRecord>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl CollectionSource for ScriptedCollection {
    async fn project_videos(&self, _project_id: &str) -> Result<Vec<VideoRecord>, ApiError> {
        *self.calls.lock().unwrap() += 1;
        let mut script = self.script.lock().unwrap();
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        Ok(next.unwrap_or_default())
    }
}

fn video(id: &str, status: ProcessingStatus) -> VideoRecord {
    VideoRecord {
        id: id.to_string(),
        youtube_id: String::new(),
        title: id.to_string(),
        url: String::new(),
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

#[tokio::test]
async fn watch_stops_once_every_video_settles() {
    init_logging();
    let source = ScriptedCollection::new(vec![
        vec![
            video("v-1", ProcessingStatus::Completed),
            video("v-2", ProcessingStatus::Processing),
        ],
        vec![
            video("v-1", ProcessingStatus::Completed),
            video("v-2", ProcessingStatus::Failed),
        ],
    ]);
    let sequencer = FetchSequencer::new();
    let sink = TestSink::default();

    let outcome = watch_collection(
        &source,
        "p-1",
        fast_policy(15, 3),
        &sequencer,
        &sink,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(outcome, Some(PollOutcome::Completed));
    assert_eq!(*source.calls.lock().unwrap(), 2);
    let seqs: Vec<u64> = sink
        .take()
        .into_iter()
        .map(|event| match event {
            EngineEvent::CollectionLoaded { seq, result, .. } => {
                assert!(result.is_ok());
                seq
            }
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(seqs, vec![1, 2]);
}

#[tokio::test]
async fn watch_gives_up_after_attempt_budget() {
    init_logging();
    let source = ScriptedCollection::new(vec![vec![video("v-1", ProcessingStatus::Pending)]]);
    let sink = TestSink::default();

    let outcome = watch_collection(
        &source,
        "p-1",
        fast_policy(4, 3),
        &FetchSequencer::new(),
        &sink,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(outcome, Some(PollOutcome::Stalled(StallReason::AttemptBudget)));
    assert_eq!(sink.take().len(), 4);
}

#[tokio::test]
async fn refresh_tags_each_fetch_with_a_new_sequence() {
    init_logging();
    let source = ScriptedCollection::new(vec![vec![video("v-1", ProcessingStatus::Completed)]]);
    let sequencer = FetchSequencer::new();
    let sink = TestSink::default();

    refresh_collection(&source, "p-1", &sequencer, &sink).await;
    refresh_collection(&source, "p-1", &sequencer, &sink).await;

    let events = sink.take();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[1],
        EngineEvent::CollectionLoaded { project_id, seq: 2, result: Ok(videos) }
            if project_id == "p-1" && videos.len() == 1
    ));
}

#[tokio::test]
async fn watch_over_http_reports_failures_and_stalls() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/videos/project/p-1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;
    let client = ApiClient::new(&format!("{}/api", server.uri()), ClientSettings::default()).unwrap();
    let sink = TestSink::default();

    let outcome = watch_collection(
        &client,
        "p-1",
        fast_policy(15, 2),
        &FetchSequencer::new(),
        &sink,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(outcome, Some(PollOutcome::Stalled(StallReason::ErrorBudget)));
    let events = sink.take();
    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .all(|event| matches!(event, EngineEvent::CollectionLoaded { result: Err(_), .. })));
}
