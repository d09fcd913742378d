use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use engine_logging::{engine_debug, engine_info, engine_warn};
use tubechat_core::{Effect, Msg};
use tubechat_engine::{ApiError, EngineConfig, EngineEvent, EngineHandle, RelayError, StreamEnd};

/// Executes engine-bound effects and feeds engine events back as messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(config: EngineConfig, msg_tx: mpsc::Sender<Msg>) -> Result<Self, ApiError> {
        engine_info!("Using backend at {}", config.api_base_url);
        let engine = EngineHandle::new(config)?;
        let runner = Self { engine };
        runner.spawn_event_loop(msg_tx);
        Ok(runner)
    }

    /// Hands effects to the engine. `Render` and `Notify` belong to the
    /// caller and are skipped here.
    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::UploadFile { submit_id, file } => {
                    engine_info!("UploadFile submit_id={} name={}", submit_id, file.name);
                    self.engine.upload_file(submit_id, file);
                }
                Effect::OpenChatStream { submit_id, request } => {
                    engine_info!(
                        "OpenChatStream submit_id={} message_len={}",
                        submit_id,
                        request.message.len()
                    );
                    self.engine.open_chat_stream(submit_id, request);
                }
                Effect::CancelStream { submit_id } => {
                    engine_info!("CancelStream submit_id={}", submit_id);
                    self.engine.cancel_stream(submit_id);
                }
                Effect::LoadThread { thread_id } => {
                    engine_info!("LoadThread thread_id={}", thread_id);
                    self.engine.load_thread(thread_id);
                }
                Effect::CreateVideo { project_id, url } => {
                    engine_info!("CreateVideo project_id={} url={}", project_id, url);
                    self.engine.create_video(project_id, url);
                }
                Effect::PollJob {
                    video_id,
                    project_id,
                } => {
                    engine_info!("PollJob video_id={} project_id={}", video_id, project_id);
                    self.engine.poll_job(video_id);
                }
                Effect::RefreshCollection { project_id } => {
                    engine_info!("RefreshCollection project_id={}", project_id);
                    self.engine.refresh_collection(project_id);
                }
                Effect::WatchCollection { project_id } => {
                    engine_info!("WatchCollection project_id={}", project_id);
                    self.engine.watch_collection(project_id);
                }
                Effect::Render | Effect::Notify(_) => {}
            }
        }
    }

    pub fn shutdown(&self) {
        self.engine.shutdown();
    }

    fn spawn_event_loop(&self, msg_tx: mpsc::Sender<Msg>) {
        let engine = self.engine.clone();
        thread::spawn(move || loop {
            if let Some(event) = engine.try_recv() {
                let Some(msg) = event_to_msg(event) else {
                    continue;
                };
                if msg_tx.send(msg).is_err() {
                    break;
                }
            } else {
                thread::sleep(Duration::from_millis(20));
            }
        });
    }
}

fn event_to_msg(event: EngineEvent) -> Option<Msg> {
    let msg = match event {
        EngineEvent::UploadFinished { submit_id, result } => match result {
            Ok(file) => Msg::UploadCompleted { submit_id, file },
            Err(err) => Msg::UploadFailed {
                submit_id,
                message: err.user_message().to_string(),
                at: Utc::now(),
            },
        },
        EngineEvent::StreamOpened { submit_id } => Msg::StreamOpened { submit_id },
        EngineEvent::Stream { submit_id, event } => Msg::StreamEventReceived { submit_id, event },
        EngineEvent::StreamFinished { submit_id, result } => match result {
            Ok(StreamEnd::Done { thread_id }) => Msg::StreamEventReceived {
                submit_id,
                event: tubechat_core::StreamEvent::Done {
                    thread_id,
                    content: None,
                },
            },
            Ok(StreamEnd::Closed) => Msg::StreamClosed { submit_id },
            Err(RelayError::Cancelled) => {
                engine_debug!("Stream {} ended after cancel", submit_id);
                return None;
            }
            Err(err) => {
                engine_warn!("Stream {} failed: {}", submit_id, err);
                Msg::StreamFailed {
                    submit_id,
                    message: err.user_message(),
                    at: Utc::now(),
                }
            }
        },
        EngineEvent::VideoCreated { project_id, result } => match result {
            Ok(video) => Msg::VideoCreated { project_id, video },
            Err(err) => Msg::VideoCreateFailed {
                project_id,
                detail: err.user_message().to_string(),
            },
        },
        EngineEvent::JobProgress {
            video_id,
            status,
            attempt,
        } => Msg::JobProgress {
            video_id,
            status,
            attempt,
        },
        EngineEvent::JobFinished { video_id, outcome } => Msg::JobFinished { video_id, outcome },
        EngineEvent::CollectionLoaded {
            project_id,
            seq,
            result,
        } => match result {
            Ok(videos) => Msg::CollectionLoaded {
                project_id,
                seq,
                videos,
            },
            Err(err) => Msg::CollectionLoadFailed {
                project_id,
                message: err.user_message().to_string(),
            },
        },
        EngineEvent::CollectionWatchStopped {
            project_id,
            outcome,
        } => Msg::CollectionWatchStopped {
            project_id,
            outcome,
        },
        EngineEvent::ThreadLoaded { thread_id, result } => match result {
            Ok(detail) => Msg::ThreadHistoryLoaded {
                thread_id,
                messages: detail.messages,
                at: Utc::now(),
            },
            Err(err) => Msg::ThreadHistoryFailed {
                thread_id,
                message: err.user_message().to_string(),
            },
        },
    };
    Some(msg)
}
