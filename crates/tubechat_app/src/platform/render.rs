use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{self, Write};

use tubechat_core::{
    AppViewModel, CollectionView, JobRowView, MessageId, MessageView, Notification, NotifyLevel,
    PollOutcome, ProcessingStatus, Role,
};

/// Writes the view model to a terminal incrementally.
///
/// Assistant text is printed as deltas, so rendering after every `text`
/// event shows the answer token by token. An answer that disappears from the
/// view mid-stream is marked `[interrupted]`. Jobs and project lists are only
/// printed when they change.
pub struct TerminalRenderer<W: Write> {
    out: W,
    printed_len: HashMap<MessageId, usize>,
    finished: HashSet<MessageId>,
    /// A streamed answer was left mid-line.
    line_open: bool,
    thread_id: Option<String>,
    jobs: BTreeMap<String, (ProcessingStatus, u32)>,
    collections: BTreeMap<String, Vec<(String, ProcessingStatus)>>,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed_len: HashMap::new(),
            finished: HashSet::new(),
            line_open: false,
            thread_id: None,
            jobs: BTreeMap::new(),
            collections: BTreeMap::new(),
        }
    }

    pub fn render(&mut self, view: &AppViewModel) -> io::Result<()> {
        self.close_abandoned(view)?;
        for message in &view.chat.messages {
            self.render_message(message)?;
        }
        if view.chat.thread_id != self.thread_id {
            if let Some(thread_id) = &view.chat.thread_id {
                writeln!(self.out, "(thread {thread_id})")?;
            }
            self.thread_id = view.chat.thread_id.clone();
        }
        for job in &view.jobs {
            self.render_job(job)?;
        }
        for collection in &view.collections {
            self.render_collection(collection)?;
        }
        self.out.flush()
    }

    pub fn notify(&mut self, notification: &Notification) -> io::Result<()> {
        let tag = match notification.level {
            NotifyLevel::Info => "info",
            NotifyLevel::Success => "done",
            NotifyLevel::Warning => "warning",
            NotifyLevel::Error => "error",
        };
        self.close_line()?;
        writeln!(self.out, "[{tag}] {}", notification.message)?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Ends the line of a partially printed answer the view no longer has.
    fn close_abandoned(&mut self, view: &AppViewModel) -> io::Result<()> {
        let abandoned: Vec<MessageId> = self
            .printed_len
            .keys()
            .filter(|id| !self.finished.contains(*id))
            .filter(|id| !view.chat.messages.iter().any(|m| m.id == **id))
            .copied()
            .collect();
        if abandoned.is_empty() {
            return Ok(());
        }
        if self.line_open {
            writeln!(self.out, " [interrupted]")?;
            self.line_open = false;
        }
        self.finished.extend(abandoned);
        Ok(())
    }

    fn render_message(&mut self, message: &MessageView) -> io::Result<()> {
        if self.finished.contains(&message.id) {
            return Ok(());
        }
        if message.restored {
            self.close_line()?;
            let prompt = match message.role {
                Role::User => "you",
                Role::Assistant => "assistant",
            };
            writeln!(self.out, "{prompt}> {}", message.text)?;
            self.write_sources(message)?;
            self.finished.insert(message.id);
            return Ok(());
        }
        if message.role == Role::User {
            return Ok(());
        }
        if message.is_error {
            self.close_line()?;
            writeln!(self.out, "! {}", message.text)?;
            self.finished.insert(message.id);
            return Ok(());
        }

        let printed = self.printed_len.entry(message.id).or_insert(0);
        if message.text.len() > *printed {
            if *printed == 0 {
                write!(self.out, "assistant> ")?;
            }
            write!(self.out, "{}", &message.text[*printed..])?;
            *printed = message.text.len();
            self.line_open = true;
        }

        if !message.is_streaming {
            writeln!(self.out)?;
            self.line_open = false;
            self.write_sources(message)?;
            self.finished.insert(message.id);
        }
        Ok(())
    }

    fn write_sources(&mut self, message: &MessageView) -> io::Result<()> {
        for (index, source) in message.sources.iter().enumerate() {
            let label = source.title.as_deref().unwrap_or(&source.url);
            writeln!(
                self.out,
                "  [{}] {} ({:.2}) {}",
                index + 1,
                label,
                source.relevance_score,
                source.url
            )?;
        }
        Ok(())
    }

    fn close_line(&mut self) -> io::Result<()> {
        if self.line_open {
            writeln!(self.out)?;
            self.line_open = false;
        }
        Ok(())
    }

    fn render_job(&mut self, job: &JobRowView) -> io::Result<()> {
        let current = (job.status.clone(), job.attempts);
        if self.jobs.get(&job.video_id) == Some(&current) {
            return Ok(());
        }
        let name = if job.title.is_empty() {
            job.video_id.as_str()
        } else {
            job.title.as_str()
        };
        let suffix = match job.outcome {
            Some(PollOutcome::Stalled(_)) => ", stopped polling",
            Some(_) | None => "",
        };
        writeln!(
            self.out,
            "video {name}: {} (poll {}{suffix})",
            job.status.as_str(),
            job.attempts
        )?;
        self.jobs.insert(job.video_id.clone(), current);
        Ok(())
    }

    fn render_collection(&mut self, collection: &CollectionView) -> io::Result<()> {
        let summary: Vec<_> = collection
            .videos
            .iter()
            .map(|video| (video.id.clone(), video.processing_status.clone()))
            .collect();
        if self.collections.get(&collection.project_id) == Some(&summary) {
            return Ok(());
        }

        let state = if collection.watching {
            ", watching"
        } else {
            ""
        };
        writeln!(
            self.out,
            "project {}: {} videos{state}",
            collection.project_id,
            collection.videos.len()
        )?;
        for video in &collection.videos {
            writeln!(
                self.out,
                "  {:<11} {}  {}",
                video.processing_status.as_str(),
                video.id,
                video.title
            )?;
        }
        self.collections
            .insert(collection.project_id.clone(), summary);
        Ok(())
    }
}
