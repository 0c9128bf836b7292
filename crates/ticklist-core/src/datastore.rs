use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

use crate::task::{Task, normalize_text};

/// Key the task collection lives under.
pub const TASKS_KEY: &str = "todos";

/// Durable string-keyed storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// One file per key (`<key>.json`) inside a data directory.
#[derive(Debug)]
pub struct FileStore {
    pub data_dir: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened datastore");
        Ok(Self { data_dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    #[tracing::instrument(skip(self))]
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            debug!(file = %path.display(), "no stored value");
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        Ok(Some(raw))
    }

    #[tracing::instrument(skip(self, value), fields(bytes = value.len()))]
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        write_atomic(&path, value)
    }
}

/// In-process store; nothing survives the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Serializes the whole task collection under [`TASKS_KEY`].
#[derive(Debug)]
pub struct TaskPersistence<S> {
    kv: S,
}

impl<S: KeyValueStore> TaskPersistence<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    pub fn backend(&self) -> &S {
        &self.kv
    }

    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn save(&mut self, tasks: &[Task]) -> anyhow::Result<()> {
        let payload = serde_json::to_string(tasks).context("failed to serialize tasks")?;
        self.kv
            .set(TASKS_KEY, &payload)
            .with_context(|| format!("failed to save {TASKS_KEY}"))?;
        debug!("saved tasks");
        Ok(())
    }

    /// Never fails: missing data is an empty list, unreadable or corrupt
    /// data is logged and also treated as an empty list.
    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> Vec<Task> {
        let raw = match self.kv.get(TASKS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("no saved tasks; starting empty");
                return vec![];
            }
            Err(err) => {
                error!(error = ?err, "failed to read saved tasks");
                return vec![];
            }
        };

        let tasks = match serde_json::from_str::<Vec<Task>>(&raw) {
            Ok(tasks) => tasks,
            Err(err) => {
                error!(error = %err, "failed to parse saved tasks; resetting to empty");
                return vec![];
            }
        };

        if let Err(err) = validate(&tasks) {
            error!(error = %err, "saved tasks are invalid; resetting to empty");
            return vec![];
        }

        debug!(count = tasks.len(), "loaded tasks");
        tasks
    }
}

/// Rejects collections that could not have been produced by the store:
/// blank or untrimmed text, or the same id twice.
fn validate(tasks: &[Task]) -> anyhow::Result<()> {
    let mut seen = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if normalize_text(&task.text).as_deref() != Some(task.text.as_str()) {
            return Err(anyhow!("task {} has blank or untrimmed text", task.id));
        }
        if !seen.insert(task.id) {
            return Err(anyhow!("duplicate task id {}", task.id));
        }
    }
    Ok(())
}

#[tracing::instrument(skip(path, contents))]
fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    debug!(file = %path.display(), "saving atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents.as_bytes())?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
