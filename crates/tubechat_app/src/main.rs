//! # tubechat
//!
//! Terminal client for the video projects backend: chat with the
//! retrieval agent about a project's videos, add videos and follow their
//! processing, and manage projects.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tubechat chat --project <id> [MESSAGE]` | Ask one question, or start an interactive session |
//! | `tubechat add-video --project <id> <URL>` | Add a video and follow its processing |
//! | `tubechat watch --project <id>` | Refresh a project's videos until none is processing |
//! | `tubechat projects list` | List projects |
//! | `tubechat projects show <id>` | Show one project |
//! | `tubechat projects create <name>` | Create a project |
//! | `tubechat projects update <id> --name <name>` | Rename a project or change its description |
//! | `tubechat projects delete <id>` | Delete a project |
//! | `tubechat threads list [--project <id>]` | List chat threads |
//! | `tubechat threads show <id>` | Print a thread's stored messages |
//! | `tubechat threads history <id>` | Print the agent's record of a thread |
//! | `tubechat threads delete <id>` | Delete a thread and its messages |
//!
//! During `chat`, Ctrl-C cancels the answer being streamed.
//!
//! Settings are read from `./tubechat.ron` when present (see `--config`).

mod platform;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use engine_logging::{engine_info, LogDestination};

use platform::config::{load_config, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(
    name = "tubechat",
    version,
    about = "Chat with your YouTube projects and follow video processing"
)]
struct Cli {
    /// Configuration file (RON). Missing files fall back to defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Backend API root, e.g. `http://localhost:8000/api`.
    #[arg(long, global = true, env = "TUBECHAT_API_URL")]
    api_url: Option<String>,

    /// Log level: off, error, warn, info, debug or trace.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask about a project's videos.
    ///
    /// Without MESSAGE an interactive session starts: `/new` starts a new
    /// thread, `/file <path>` attaches a file to the next message and
    /// `/quit` exits. Resuming a thread prints its earlier messages first.
    Chat {
        #[arg(long)]
        project: String,

        /// Continue an existing thread.
        #[arg(long)]
        thread: Option<String>,

        /// Restrict the answer to these videos. Repeatable.
        #[arg(long = "video")]
        videos: Vec<String>,

        /// Attach a file to the message.
        #[arg(long)]
        file: Option<PathBuf>,

        message: Option<String>,
    },

    /// Add a video to a project and wait for its processing to finish.
    AddVideo {
        #[arg(long)]
        project: String,

        url: String,
    },

    /// Refresh a project's video list until no video is still processing.
    Watch {
        #[arg(long)]
        project: String,
    },

    /// Manage projects.
    Projects {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Browse and delete chat threads.
    Threads {
        #[command(subcommand)]
        command: ThreadCommands,
    },
}

#[derive(Subcommand)]
enum ThreadCommands {
    List {
        #[arg(long)]
        project: Option<String>,
    },
    Show {
        id: String,
    },
    History {
        id: String,

        /// Most recent checkpoints to read.
        #[arg(long)]
        limit: Option<u32>,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    List,
    Show {
        id: String,
    },
    Create {
        name: String,

        #[arg(long)]
        description: Option<String>,
    },
    Update {
        id: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        id: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = engine_logging::parse_level(&cli.log_level)
        .ok_or_else(|| anyhow::anyhow!("unknown log level: {}", cli.log_level))?;
    let destination = if cli.log_file.is_some() {
        LogDestination::File
    } else {
        LogDestination::Terminal
    };
    engine_logging::initialize(destination, level, cli.log_file.clone());

    let mut config = load_config(&cli.config);
    if let Some(api_url) = cli.api_url {
        config.api_base_url = api_url;
    }
    let engine_config = config.engine_config();
    engine_info!("tubechat starting against {}", engine_config.api_base_url);

    match cli.command {
        Commands::Chat {
            project,
            thread,
            videos,
            file,
            message,
        } => platform::commands::chat(
            engine_config,
            platform::commands::ChatArgs {
                project,
                thread,
                videos,
                file,
                message,
            },
        ),
        Commands::AddVideo { project, url } => {
            platform::commands::add_video(engine_config, &project, &url)
        }
        Commands::Watch { project } => platform::commands::watch(engine_config, &project),
        Commands::Projects { command } => {
            let action = match command {
                ProjectCommands::List => platform::projects::ProjectAction::List,
                ProjectCommands::Show { id } => platform::projects::ProjectAction::Show { id },
                ProjectCommands::Create { name, description } => {
                    platform::projects::ProjectAction::Create { name, description }
                }
                ProjectCommands::Update {
                    id,
                    name,
                    description,
                } => platform::projects::ProjectAction::Update {
                    id,
                    name,
                    description,
                },
                ProjectCommands::Delete { id } => platform::projects::ProjectAction::Delete { id },
            };
            platform::projects::run(&engine_config, action)
        }
        Commands::Threads { command } => {
            let action = match command {
                ThreadCommands::List { project } => platform::threads::ThreadAction::List {
                    project_id: project,
                },
                ThreadCommands::Show { id } => platform::threads::ThreadAction::Show { id },
                ThreadCommands::History { id, limit } => {
                    platform::threads::ThreadAction::History { id, limit }
                }
                ThreadCommands::Delete { id } => platform::threads::ThreadAction::Delete { id },
            };
            platform::threads::run(&engine_config, action)
        }
    }
}
