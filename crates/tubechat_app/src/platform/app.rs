use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use engine_logging::{engine_info, engine_warn};
use tubechat_core::{update, AppState, ChatScope, Effect, Msg, StagedFile};
use tubechat_engine::{guess_mime_type, EngineConfig};

use super::effects::EffectRunner;
use super::render::TerminalRenderer;

const TICK_INTERVAL: Duration = Duration::from_millis(75);

/// Drives the reducer from engine messages and renders to `out`.
pub struct App<W: Write> {
    state: AppState,
    runner: EffectRunner,
    msg_rx: mpsc::Receiver<Msg>,
    renderer: TerminalRenderer<W>,
    interrupt: Interrupt,
}

/// Routes an interrupt to the answer being streamed, if there is one.
#[derive(Clone)]
pub struct Interrupt {
    asking: Arc<AtomicBool>,
    msg_tx: mpsc::Sender<Msg>,
}

impl Interrupt {
    /// Cancels the answer in progress. Returns false when nothing was being
    /// answered, in which case the interrupt should end the program.
    pub fn fire(&self) -> bool {
        if !self.asking.load(Ordering::SeqCst) {
            return false;
        }
        self.msg_tx.send(Msg::CancelClicked).is_ok()
    }
}

/// Ctrl-C cancels the streamed answer; outside an answer it exits.
pub fn install_ctrl_c(interrupt: Interrupt) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                engine_warn!("Ctrl-C handling unavailable: {}", err);
                return;
            }
        };
        runtime.block_on(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !interrupt.fire() {
                    std::process::exit(130);
                }
                engine_info!("Interrupt: cancelling the current answer");
            }
        });
    });
}

impl<W: Write> App<W> {
    pub fn new(config: EngineConfig, out: W) -> anyhow::Result<Self> {
        let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
        let runner = EffectRunner::new(config, msg_tx.clone())
            .context("failed to start the background engine")?;
        let interrupt = Interrupt {
            asking: Arc::new(AtomicBool::new(false)),
            msg_tx: msg_tx.clone(),
        };

        // Background tick to coalesce rendering.
        thread::spawn(move || {
            while msg_tx.send(Msg::Tick).is_ok() {
                thread::sleep(TICK_INTERVAL);
            }
        });

        Ok(Self {
            state: AppState::new(),
            runner,
            msg_rx,
            renderer: TerminalRenderer::new(out),
            interrupt,
        })
    }

    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn dispatch(&mut self, msg: Msg) -> io::Result<()> {
        let is_tick = matches!(msg, Msg::Tick);
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;

        let mut render_now = false;
        for effect in &effects {
            match effect {
                Effect::Render => render_now = true,
                Effect::Notify(notification) => self.renderer.notify(notification)?,
                _ => {}
            }
        }
        self.runner.enqueue(effects);

        if (render_now || is_tick) && self.state.consume_dirty() {
            self.renderer.render(&self.state.view())?;
        }
        Ok(())
    }

    /// Processes messages until `done` holds or `timeout` passes.
    ///
    /// Returns whether `done` was reached.
    pub fn run_until(
        &mut self,
        timeout: Option<Duration>,
        mut done: impl FnMut(&AppState) -> bool,
    ) -> io::Result<bool> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            if done(&self.state) {
                self.flush_render()?;
                return Ok(true);
            }
            let wait = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(left) => left,
                    None => {
                        self.flush_render()?;
                        return Ok(false);
                    }
                },
                None => TICK_INTERVAL,
            };
            match self.msg_rx.recv_timeout(wait) {
                Ok(msg) => self.dispatch(msg)?,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => return Ok(false),
            }
        }
    }

    pub fn set_scope(&mut self, project_id: Option<String>, video_ids: Vec<String>) -> io::Result<()> {
        let video_ids = (!video_ids.is_empty()).then_some(video_ids);
        self.dispatch(Msg::ScopeChanged(ChatScope {
            project_id,
            video_ids,
        }))
    }

    pub fn stage_file(&mut self, path: &std::path::Path) -> io::Result<()> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.dispatch(Msg::FileStaged(StagedFile {
            path: path.to_path_buf(),
            name,
            mime_type: guess_mime_type(path).to_string(),
        }))
    }

    /// Sends `text` and blocks until the answer has finished, failed or been
    /// cancelled through [`Interrupt::fire`].
    pub fn ask(&mut self, text: &str) -> io::Result<()> {
        self.interrupt.asking.store(true, Ordering::SeqCst);
        let result = self.submit_and_wait(text);
        self.interrupt.asking.store(false, Ordering::SeqCst);
        result
    }

    fn submit_and_wait(&mut self, text: &str) -> io::Result<()> {
        self.dispatch(Msg::InputChanged(text.to_string()))?;
        self.dispatch(Msg::SubmitClicked { at: Utc::now() })?;
        self.run_until(None, |state| !state.chat().is_busy())?;
        Ok(())
    }

    pub fn shutdown(&self) {
        self.runner.shutdown();
    }

    fn flush_render(&mut self) -> io::Result<()> {
        if self.state.consume_dirty() {
            self.renderer.render(&self.state.view())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubechat_core::{Role, SubmitPhase};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> EngineConfig {
        EngineConfig {
            api_base_url: format!("{}/api", server.uri()),
            ..EngineConfig::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn interrupt_cancels_the_answer_in_progress() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat/stream"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("data: {\"type\":\"done\"}\n", "text/event-stream")
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let mut app = App::new(config_for(&server), Vec::new()).unwrap();
        app.set_scope(Some("p-1".to_string()), Vec::new()).unwrap();
        let interrupt = app.interrupt();
        let interrupter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            interrupt.fire()
        });

        let started = Instant::now();
        tokio::task::block_in_place(|| app.ask("hello")).unwrap();

        assert!(interrupter.join().unwrap());
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(app.state().chat().phase(), SubmitPhase::Idle);
        let roles: Vec<_> = app.state().chat().messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User]);
        app.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn interrupt_outside_an_answer_asks_to_exit() {
        let server = MockServer::start().await;
        let app = App::new(config_for(&server), Vec::new()).unwrap();
        assert!(!app.interrupt().fire());
        app.shutdown();
    }
}
