use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::task::{Priority, Task, TaskId};

pub const MIN_TEXT_LEN: usize = 3;

/// The one recoverable error a caller is expected to handle: everything else
/// in the store is either a silent no-op (unknown id) or plumbing failure.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("task text must be at least {MIN_TEXT_LEN} characters long")]
    TextTooShort,
}

/// Owns the ordered task collection and its durable copy. All mutation goes
/// through these methods; rendering code only ever sees `&[Task]`.
#[derive(Debug)]
pub struct TaskStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
    tasks: Vec<Task>,
}

impl TaskStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.data");
        let tasks = load_tasks_soft(&tasks_path);

        info!(
            data_dir = %data_dir.display(),
            count = tasks.len(),
            "opened task store"
        );

        Ok(Self {
            data_dir,
            tasks_path,
            tasks,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Resolve a user-typed id token: a full uuid or a unique prefix of one.
    pub fn resolve_id(&self, token: &str) -> anyhow::Result<TaskId> {
        if let Ok(id) = token.parse::<TaskId>() {
            return Ok(id);
        }

        let needle = token.to_ascii_lowercase();
        let mut matches = self
            .tasks
            .iter()
            .filter(|t| t.id.to_string().starts_with(&needle));

        let first = matches
            .next()
            .ok_or_else(|| anyhow!("no task matches id '{token}'"))?;
        if matches.next().is_some() {
            return Err(anyhow!("id '{token}' is ambiguous; give more characters"));
        }
        Ok(first.id)
    }

    #[tracing::instrument(skip(self, text, category, deadline, now))]
    pub fn add(
        &mut self,
        text: &str,
        category: &str,
        priority_label: &str,
        deadline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Task> {
        let text = text.trim();
        if text.chars().count() < MIN_TEXT_LEN {
            return Err(ValidationError::TextTooShort.into());
        }

        let task = Task::new(
            text.to_string(),
            category.to_string(),
            Priority::from_label(priority_label),
            deadline,
            now,
        );
        self.tasks.push(task.clone());
        self.persist()?;

        debug!(id = %task.id, count = self.tasks.len(), "task added");
        Ok(task)
    }

    /// Flip the done flag. Unknown ids are tolerated as a no-op so a stale
    /// view can never turn into an error.
    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn toggle_done(&mut self, id: TaskId) -> anyhow::Result<bool> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!("toggle on unknown id; ignoring");
            return Ok(false);
        };
        task.done = !task.done;
        self.persist()?;
        Ok(true)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn delete(&mut self, id: TaskId) -> anyhow::Result<bool> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            debug!("delete on unknown id; ignoring");
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub fn clear_all(&mut self) -> anyhow::Result<()> {
        let before = self.tasks.len();
        self.tasks.clear();
        self.persist()?;
        info!(removed = before, "cleared all tasks");
        Ok(())
    }

    /// Move the source task immediately before the target task, leaving all
    /// other relative order intact.
    #[tracing::instrument(skip(self), fields(source = %source, target = %target))]
    pub fn move_before(&mut self, source: TaskId, target: TaskId) -> anyhow::Result<bool> {
        if source == target {
            return Ok(false);
        }
        let Some(src_idx) = self.tasks.iter().position(|t| t.id == source) else {
            debug!("move with unknown source; ignoring");
            return Ok(false);
        };
        if !self.tasks.iter().any(|t| t.id == target) {
            debug!("move with unknown target; ignoring");
            return Ok(false);
        }

        let moved = self.tasks.remove(src_idx);
        // Recompute: removing the source may have shifted the target.
        let tgt_idx = self
            .tasks
            .iter()
            .position(|t| t.id == target)
            .ok_or_else(|| anyhow!("target task vanished during move"))?;
        self.tasks.insert(tgt_idx, moved);

        self.persist()?;
        Ok(true)
    }

    /// Rewrite the whole collection in one atomic pass.
    #[tracing::instrument(skip(self))]
    pub fn persist(&self) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, &self.tasks).context("failed to save tasks.data")
    }
}

/// Load the persisted collection, treating anything unreadable as "no data".
/// A half-written or hand-mangled file must never block startup.
fn load_tasks_soft(path: &Path) -> Vec<Task> {
    match load_jsonl(path) {
        Ok(tasks) => tasks,
        Err(err) => {
            warn!(
                file = %path.display(),
                error = %err,
                "could not read stored tasks; starting empty"
            );
            Vec::new()
        }
    }
}

fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Task>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let task: Task = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(task);
    }

    debug!(count = out.len(), "loaded tasks from jsonl");
    Ok(out)
}

fn save_jsonl_atomic(path: &Path, tasks: &[Task]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = tasks.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for task in tasks {
        let serialized = serde_json::to_string(task)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
