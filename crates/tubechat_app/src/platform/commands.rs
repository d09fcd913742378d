use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::bail;
use engine_logging::engine_info;
use tubechat_core::{AppState, Msg, NotifyLevel, SubmitPhase};
use tubechat_engine::EngineConfig;

use super::app::{install_ctrl_c, App};

pub struct ChatArgs {
    pub project: String,
    pub thread: Option<String>,
    pub videos: Vec<String>,
    pub file: Option<PathBuf>,
    pub message: Option<String>,
}

pub fn chat(config: EngineConfig, args: ChatArgs) -> anyhow::Result<()> {
    let history_timeout = config.client.request_timeout + Duration::from_secs(5);
    let mut app = App::new(config, io::stdout())?;
    install_ctrl_c(app.interrupt());
    app.set_scope(Some(args.project), args.videos)?;
    if let Some(thread_id) = args.thread {
        app.dispatch(Msg::ThreadResumed(thread_id))?;
        let loaded =
            app.run_until(Some(history_timeout), |state| !state.chat().is_loading_history())?;
        if !loaded {
            engine_info!("Thread history did not arrive in time");
        }
    }
    if let Some(path) = &args.file {
        app.stage_file(path)?;
    }

    let result = match args.message {
        Some(message) => ask_once(&mut app, &message),
        None => interactive(&mut app),
    };
    app.shutdown();
    result
}

fn ask_once<W: Write>(app: &mut App<W>, message: &str) -> anyhow::Result<()> {
    if message.trim().is_empty() {
        bail!("the message is empty");
    }
    app.ask(message)?;
    match app.state().chat().phase() {
        SubmitPhase::Errored => bail!("the chat request failed"),
        SubmitPhase::Idle => bail!("the chat request was cancelled"),
        _ => Ok(()),
    }
}

fn interactive<W: Write>(app: &mut App<W>) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("you> ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input {
            "/quit" | "/exit" => break,
            "/new" => {
                app.dispatch(Msg::NewThreadClicked)?;
                println!("(new thread)");
            }
            _ => {
                if let Some(path) = input.strip_prefix("/file") {
                    let path = path.trim();
                    if path.is_empty() {
                        app.dispatch(Msg::FileCleared)?;
                        println!("(attachment removed)");
                    } else {
                        app.stage_file(Path::new(path))?;
                        println!("(attached {path})");
                    }
                } else {
                    app.ask(input)?;
                    if app.state().chat().phase() == SubmitPhase::Idle {
                        println!("(cancelled)");
                    }
                }
            }
        }
    }
    Ok(())
}

pub fn add_video(config: EngineConfig, project_id: &str, url: &str) -> anyhow::Result<()> {
    let refresh_timeout = config.client.request_timeout + Duration::from_secs(5);
    let mut app = App::new(config, io::stdout())?;
    app.dispatch(Msg::AddVideoSubmitted {
        project_id: project_id.to_string(),
        url: url.to_string(),
    })?;

    app.run_until(None, |state| {
        job_settled(state, project_id) || (state.jobs().next().is_none() && has_error(state))
    })?;
    if !job_settled(app.state(), project_id) {
        app.shutdown();
        bail!("the video was not added");
    }

    // Wait for the list refresh that follows every finished job.
    let seen = app
        .state()
        .collection(project_id)
        .and_then(|collection| collection.last_applied_seq());
    let refreshed = app.run_until(Some(refresh_timeout), |state| {
        state
            .collection(project_id)
            .and_then(|collection| collection.last_applied_seq())
            > seen
    })?;
    if !refreshed {
        engine_info!("Project {} list was not refreshed in time", project_id);
    }
    app.shutdown();
    Ok(())
}

pub fn watch(config: EngineConfig, project_id: &str) -> anyhow::Result<()> {
    let mut app = App::new(config, io::stdout())?;
    app.dispatch(Msg::RefreshCollectionClicked {
        project_id: project_id.to_string(),
    })?;

    app.run_until(None, |state| match state.collection(project_id) {
        Some(collection) => collection.last_applied_seq().is_some() && !collection.is_watching(),
        None => has_error(state),
    })?;
    let loaded = app.state().collection(project_id).is_some();
    app.shutdown();
    if !loaded {
        bail!("could not load the videos of project {project_id}");
    }
    Ok(())
}

fn job_settled(state: &AppState, project_id: &str) -> bool {
    state
        .jobs()
        .any(|job| job.project_id == project_id && job.outcome.is_some())
}

fn has_error(state: &AppState) -> bool {
    matches!(state.last_notification(), Some(n) if n.level == NotifyLevel::Error)
}
