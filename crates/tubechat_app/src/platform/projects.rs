use std::io::{self, Write};

use anyhow::Context;
use tubechat_engine::{ApiClient, EngineConfig, ProjectDraft, ProjectRecord};

pub enum ProjectAction {
    List,
    Show { id: String },
    Create { name: String, description: Option<String> },
    Update {
        id: String,
        name: String,
        description: Option<String>,
    },
    Delete { id: String },
}

/// Runs one project command against the backend on a short-lived runtime.
pub fn run(config: &EngineConfig, action: ProjectAction) -> anyhow::Result<()> {
    let client = ApiClient::new(&config.api_base_url, config.client.clone())
        .context("invalid api base url")?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let mut out = io::stdout().lock();
    runtime.block_on(execute(&client, action, &mut out))
}

async fn execute<W: Write>(
    client: &ApiClient,
    action: ProjectAction,
    out: &mut W,
) -> anyhow::Result<()> {
    match action {
        ProjectAction::List => {
            let projects = client.list_projects().await.context("listing projects")?;
            if projects.is_empty() {
                writeln!(out, "no projects")?;
            }
            for project in &projects {
                write_summary(out, project)?;
            }
        }
        ProjectAction::Show { id } => {
            let project = client
                .get_project(&id)
                .await
                .with_context(|| format!("loading project {id}"))?;
            write_summary(out, &project)?;
            if let Some(description) = project.description.as_deref().filter(|d| !d.is_empty()) {
                writeln!(out, "  {description}")?;
            }
            if let Some(created_at) = &project.created_at {
                writeln!(out, "  created {created_at}")?;
            }
        }
        ProjectAction::Create { name, description } => {
            let draft = ProjectDraft { name, description };
            let project = client
                .create_project(&draft)
                .await
                .context("creating project")?;
            writeln!(out, "created project {} ({})", project.id, project.name)?;
        }
        ProjectAction::Update {
            id,
            name,
            description,
        } => {
            let draft = ProjectDraft { name, description };
            let project = client
                .update_project(&id, &draft)
                .await
                .with_context(|| format!("updating project {id}"))?;
            writeln!(out, "updated project {} ({})", project.id, project.name)?;
        }
        ProjectAction::Delete { id } => {
            client
                .delete_project(&id)
                .await
                .with_context(|| format!("deleting project {id}"))?;
            writeln!(out, "deleted project {id}")?;
        }
    }
    Ok(())
}

fn write_summary<W: Write>(out: &mut W, project: &ProjectRecord) -> io::Result<()> {
    match project.video_count {
        Some(count) => writeln!(out, "{}  {}  ({count} videos)", project.id, project.name),
        None => writeln!(out, "{}  {}", project.id, project.name),
    }
}
