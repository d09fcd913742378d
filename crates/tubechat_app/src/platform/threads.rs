use std::io::{self, Write};

use anyhow::Context;
use tubechat_core::{StoredMessage, ThreadSummary};
use tubechat_engine::{ApiClient, EngineConfig};

pub enum ThreadAction {
    List { project_id: Option<String> },
    Show { id: String },
    History { id: String, limit: Option<u32> },
    Delete { id: String },
}

/// Runs one chat thread command against the backend on a short-lived runtime.
pub fn run(config: &EngineConfig, action: ThreadAction) -> anyhow::Result<()> {
    let client = ApiClient::new(&config.api_base_url, config.client.clone())
        .context("invalid api base url")?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let mut out = io::stdout().lock();
    runtime.block_on(execute(&client, action, &mut out))
}

async fn execute<W: Write>(
    client: &ApiClient,
    action: ThreadAction,
    out: &mut W,
) -> anyhow::Result<()> {
    match action {
        ThreadAction::List { project_id } => {
            let threads = client
                .list_threads(project_id.as_deref())
                .await
                .context("listing chat threads")?;
            if threads.is_empty() {
                writeln!(out, "no threads")?;
            }
            for thread in &threads {
                write_summary(out, thread)?;
            }
        }
        ThreadAction::Show { id } => {
            let detail = client
                .get_thread(&id)
                .await
                .with_context(|| format!("loading thread {id}"))?;
            write_summary(out, &detail.thread)?;
            for message in &detail.messages {
                write_message(out, message)?;
            }
        }
        ThreadAction::History { id, limit } => {
            let history = client
                .chat_history(&id, limit)
                .await
                .with_context(|| format!("loading history of thread {id}"))?;
            writeln!(out, "{} ({} turns)", history.thread_id, history.total_count)?;
            for entry in &history.messages {
                let speaker = match entry.kind.as_str() {
                    "human" => "you",
                    "ai" => "assistant",
                    other => other,
                };
                writeln!(out, "{speaker}> {}", entry.content)?;
            }
        }
        ThreadAction::Delete { id } => {
            client
                .delete_thread(&id)
                .await
                .with_context(|| format!("deleting thread {id}"))?;
            writeln!(out, "deleted thread {id}")?;
        }
    }
    Ok(())
}

fn write_summary<W: Write>(out: &mut W, thread: &ThreadSummary) -> io::Result<()> {
    let title = thread.title.as_deref().unwrap_or("(untitled)");
    match &thread.updated_at {
        Some(updated_at) => writeln!(out, "{}  {title}  (updated {updated_at})", thread.id),
        None => writeln!(out, "{}  {title}", thread.id),
    }
}

fn write_message<W: Write>(out: &mut W, message: &StoredMessage) -> io::Result<()> {
    let speaker = match message.role.as_str() {
        "user" => "you",
        other => other,
    };
    writeln!(out, "{speaker}> {}", message.content.as_deref().unwrap_or(""))
}
