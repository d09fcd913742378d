use std::collections::{HashMap, HashSet};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info};
use tokio_util::sync::CancellationToken;
use tubechat_core::{ChatRequest, StagedFile, StreamEvent, SubmitId};

use crate::poller::{poll_job, refresh_collection, watch_collection, FetchSequencer};
use crate::relay::{relay_chat, StreamSink};
use crate::sink::{ChannelEventSink, EventSink};
use crate::{ApiClient, ApiError, EngineConfig, EngineEvent};

enum EngineCommand {
    UploadFile { submit_id: SubmitId, file: StagedFile },
    OpenChatStream { submit_id: SubmitId, request: ChatRequest },
    CancelStream { submit_id: SubmitId },
    CreateVideo { project_id: String, url: String },
    PollJob { video_id: String },
    RefreshCollection { project_id: String },
    WatchCollection { project_id: String },
    LoadThread { thread_id: String },
    Shutdown,
}

/// Runs engine work on a background tokio runtime and reports back through
/// [`EngineHandle::try_recv`].
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: Arc<Mutex<mpsc::Receiver<EngineEvent>>>,
}

struct Worker {
    client: ApiClient,
    config: EngineConfig,
    sink: ChannelEventSink,
    sequencer: FetchSequencer,
    /// Parent of every task's token; cancelled on shutdown.
    root: CancellationToken,
    streams: Mutex<HashMap<SubmitId, CancellationToken>>,
    polled_jobs: Mutex<HashSet<String>>,
    watched_projects: Mutex<HashSet<String>>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Result<Self, ApiError> {
        let client = ApiClient::new(&config.api_base_url, config.client.clone())?;
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let worker = Arc::new(Worker {
            client,
            config,
            sink: ChannelEventSink::new(event_tx),
            sequencer: FetchSequencer::new(),
            root: CancellationToken::new(),
            streams: Mutex::new(HashMap::new()),
            polled_jobs: Mutex::new(HashSet::new()),
            watched_projects: Mutex::new(HashSet::new()),
        });

        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
            while let Ok(command) = cmd_rx.recv() {
                if let EngineCommand::Shutdown = command {
                    engine_info!("Engine shutting down");
                    worker.root.cancel();
                    break;
                }
                let worker = worker.clone();
                runtime.spawn(async move {
                    handle_command(worker, command).await;
                });
            }
            runtime.shutdown_timeout(Duration::from_secs(1));
        });

        Ok(Self {
            cmd_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        })
    }

    pub fn upload_file(&self, submit_id: SubmitId, file: StagedFile) {
        self.send(EngineCommand::UploadFile { submit_id, file });
    }

    pub fn open_chat_stream(&self, submit_id: SubmitId, request: ChatRequest) {
        self.send(EngineCommand::OpenChatStream { submit_id, request });
    }

    pub fn cancel_stream(&self, submit_id: SubmitId) {
        self.send(EngineCommand::CancelStream { submit_id });
    }

    pub fn create_video(&self, project_id: impl Into<String>, url: impl Into<String>) {
        self.send(EngineCommand::CreateVideo {
            project_id: project_id.into(),
            url: url.into(),
        });
    }

    /// Starts polling a video unless it is already being polled.
    pub fn poll_job(&self, video_id: impl Into<String>) {
        self.send(EngineCommand::PollJob {
            video_id: video_id.into(),
        });
    }

    pub fn refresh_collection(&self, project_id: impl Into<String>) {
        self.send(EngineCommand::RefreshCollection {
            project_id: project_id.into(),
        });
    }

    /// Starts a watch loop for the project unless one is already running.
    pub fn watch_collection(&self, project_id: impl Into<String>) {
        self.send(EngineCommand::WatchCollection {
            project_id: project_id.into(),
        });
    }

    pub fn load_thread(&self, thread_id: impl Into<String>) {
        self.send(EngineCommand::LoadThread {
            thread_id: thread_id.into(),
        });
    }

    /// Cancels every stream, poller and watcher and stops the runtime.
    pub fn shutdown(&self) {
        self.send(EngineCommand::Shutdown);
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_recv()
            .ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv_timeout(timeout)
            .ok()
    }

    fn send(&self, command: EngineCommand) {
        let _ = self.cmd_tx.send(command);
    }
}

async fn handle_command(worker: Arc<Worker>, command: EngineCommand) {
    match command {
        EngineCommand::UploadFile { submit_id, file } => {
            let result = worker.client.upload_file(&file).await;
            worker
                .sink
                .emit(EngineEvent::UploadFinished { submit_id, result });
        }
        EngineCommand::OpenChatStream { submit_id, request } => {
            let cancel = worker.root.child_token();
            lock(&worker.streams).insert(submit_id, cancel.clone());
            let sink = SubmitSink {
                submit_id,
                inner: &worker.sink,
            };
            let result = relay_chat(&worker.client, &request, &sink, &cancel).await;
            lock(&worker.streams).remove(&submit_id);
            worker
                .sink
                .emit(EngineEvent::StreamFinished { submit_id, result });
        }
        EngineCommand::CancelStream { submit_id } => {
            if let Some(cancel) = lock(&worker.streams).remove(&submit_id) {
                engine_info!("Cancelling chat stream {}", submit_id);
                cancel.cancel();
            }
        }
        EngineCommand::CreateVideo { project_id, url } => {
            let result = worker.client.create_video(&project_id, &url).await;
            worker
                .sink
                .emit(EngineEvent::VideoCreated { project_id, result });
        }
        EngineCommand::PollJob { video_id } => {
            if !lock(&worker.polled_jobs).insert(video_id.clone()) {
                engine_debug!("Video {} is already being polled", video_id);
                return;
            }
            let cancel = worker.root.child_token();
            let outcome = poll_job(
                &worker.client,
                &video_id,
                worker.config.job_polling,
                &worker.sink,
                &cancel,
            )
            .await;
            lock(&worker.polled_jobs).remove(&video_id);
            if let Some(outcome) = outcome {
                worker
                    .sink
                    .emit(EngineEvent::JobFinished { video_id, outcome });
            }
        }
        EngineCommand::RefreshCollection { project_id } => {
            refresh_collection(&worker.client, &project_id, &worker.sequencer, &worker.sink)
                .await;
        }
        EngineCommand::WatchCollection { project_id } => {
            if !lock(&worker.watched_projects).insert(project_id.clone()) {
                engine_debug!("Project {} is already being watched", project_id);
                return;
            }
            let cancel = worker.root.child_token();
            let outcome = watch_collection(
                &worker.client,
                &project_id,
                worker.config.collection_polling,
                &worker.sequencer,
                &worker.sink,
                &cancel,
            )
            .await;
            lock(&worker.watched_projects).remove(&project_id);
            if let Some(outcome) = outcome {
                worker
                    .sink
                    .emit(EngineEvent::CollectionWatchStopped {
                        project_id,
                        outcome,
                    });
            }
        }
        EngineCommand::LoadThread { thread_id } => {
            let result = worker.client.get_thread(&thread_id).await;
            worker
                .sink
                .emit(EngineEvent::ThreadLoaded { thread_id, result });
        }
        // Handled on the command thread.
        EngineCommand::Shutdown => {}
    }
}

/// Tags stream events with their submit before forwarding them.
struct SubmitSink<'a> {
    submit_id: SubmitId,
    inner: &'a ChannelEventSink,
}

impl StreamSink for SubmitSink<'_> {
    fn opened(&self) {
        self.inner.emit(EngineEvent::StreamOpened {
            submit_id: self.submit_id,
        });
    }

    fn emit(&self, event: StreamEvent) {
        self.inner.emit(EngineEvent::Stream {
            submit_id: self.submit_id,
            event,
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
