use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::datastore::{KeyValueStore, TaskPersistence};
use crate::task::{Task, normalize_text};

/// What a store operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// State changed (or was rewritten), saved, render requested.
    Persisted,
    /// Nothing saved, but a render was requested.
    RenderOnly,
    /// Declined: no save, no render.
    Ignored,
}

impl Outcome {
    pub fn render_requested(self) -> bool {
        !matches!(self, Outcome::Ignored)
    }

    pub fn persisted(self) -> bool {
        matches!(self, Outcome::Persisted)
    }
}

type Subscriber = Box<dyn FnMut(&[Task])>;

/// Owns the ordered task collection (newest first). Mutation methods are
/// the only write path; each successful mutation saves the whole collection
/// and then notifies render subscribers.
pub struct TaskStore<S> {
    tasks: Vec<Task>,
    persistence: TaskPersistence<S>,
    subscribers: Vec<Subscriber>,
}

impl<S: KeyValueStore> TaskStore<S> {
    /// Rehydrates from storage. Corrupt or missing data yields an empty store.
    #[tracing::instrument(skip(persistence))]
    pub fn open(persistence: TaskPersistence<S>) -> Self {
        let tasks = persistence.load();
        info!(count = tasks.len(), "task store ready");
        Self {
            tasks,
            persistence,
            subscribers: vec![],
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn has_completed(&self) -> bool {
        self.tasks.iter().any(|t| t.completed)
    }

    pub fn persistence(&self) -> &TaskPersistence<S> {
        &self.persistence
    }

    /// Registers a callback run once per render request, after the save.
    pub fn subscribe<F>(&mut self, f: F)
    where
        F: FnMut(&[Task]) + 'static,
    {
        self.subscribers.push(Box::new(f));
    }

    #[tracing::instrument(skip(self, raw_text, now))]
    pub fn add(&mut self, raw_text: &str, now: DateTime<Utc>) -> anyhow::Result<Outcome> {
        let Some(task) = Task::new(raw_text, now) else {
            debug!("blank task text; add declined");
            return Ok(Outcome::Ignored);
        };

        info!(id = %task.id, "adding task");
        self.tasks.insert(0, task);
        self.commit()
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn toggle(&mut self, id: Uuid) -> anyhow::Result<Outcome> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!("toggle target not found");
            return Ok(Outcome::Ignored);
        };

        task.completed = !task.completed;
        debug!(completed = task.completed, "toggled task");

        self.commit()
    }

    /// Blank replacement text or an unknown id leaves state untouched but
    /// still requests a render, which is how an open editor gets dismissed.
    #[tracing::instrument(skip(self, raw_text), fields(id = %id))]
    pub fn edit(&mut self, id: Uuid, raw_text: &str) -> anyhow::Result<Outcome> {
        let idx = self.tasks.iter().position(|t| t.id == id);

        match (idx, normalize_text(raw_text)) {
            (Some(idx), Some(text)) => {
                self.tasks[idx].text = text;
                debug!("edited task text");
                self.commit()
            }
            _ => {
                debug!("edit discarded");
                self.notify();
                Ok(Outcome::RenderOnly)
            }
        }
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn delete(&mut self, id: Uuid) -> anyhow::Result<Outcome> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        debug!(removed = before - self.tasks.len(), "deleted task");
        self.commit()
    }

    #[tracing::instrument(skip(self))]
    pub fn clear_completed(&mut self) -> anyhow::Result<Outcome> {
        if !self.has_completed() {
            debug!("no completed tasks to clear");
            return Ok(Outcome::Ignored);
        }

        let before = self.tasks.len();
        self.tasks.retain(|t| !t.completed);
        info!(
            before,
            after = self.tasks.len(),
            "cleared completed tasks"
        );
        self.commit()
    }

    fn commit(&mut self) -> anyhow::Result<Outcome> {
        let saved = self.persistence.save(&self.tasks);
        self.notify();
        saved.map(|()| Outcome::Persisted)
    }

    fn notify(&mut self) {
        for subscriber in &mut self.subscribers {
            subscriber(&self.tasks);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::{Outcome, TaskStore};
    use crate::datastore::{KeyValueStore, MemoryStore, TASKS_KEY, TaskPersistence};

    fn empty_store() -> TaskStore<MemoryStore> {
        TaskStore::open(TaskPersistence::new(MemoryStore::new()))
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).single().expect("valid now")
    }

    fn texts(store: &TaskStore<MemoryStore>) -> Vec<&str> {
        store.tasks().iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn adds_are_newest_first_and_blank_is_ignored() {
        let mut store = empty_store();
        for text in ["A", "", "B", "   ", "C"] {
            store.add(text, now()).expect("add");
        }
        assert_eq!(texts(&store), vec!["C", "B", "A"]);
        assert_eq!(store.add("\t", now()).expect("add"), Outcome::Ignored);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn toggle_twice_restores_and_unknown_id_is_noop() {
        let mut store = empty_store();
        store.add("Buy milk", now()).expect("add");
        let id = store.tasks()[0].id;

        store.toggle(id).expect("toggle");
        assert!(store.tasks()[0].completed);
        store.toggle(id).expect("toggle");
        assert!(!store.tasks()[0].completed);

        let before = store.tasks().to_vec();
        assert_eq!(store.toggle(Uuid::new_v4()).expect("toggle"), Outcome::Ignored);
        assert_eq!(store.tasks(), before.as_slice());
    }

    #[test]
    fn edit_trims_and_blank_edit_only_renders() {
        let mut store = empty_store();
        store.add("old", now()).expect("add");
        let id = store.tasks()[0].id;

        assert_eq!(store.edit(id, "").expect("edit"), Outcome::RenderOnly);
        assert_eq!(store.tasks()[0].text, "old");

        assert_eq!(store.edit(id, "  new ").expect("edit"), Outcome::Persisted);
        assert_eq!(store.tasks()[0].text, "new");

        assert_eq!(store.edit(Uuid::new_v4(), "other").expect("edit"), Outcome::RenderOnly);
        assert_eq!(texts(&store), vec!["new"]);
    }

    #[test]
    fn delete_is_idempotent() {
        let mut store = empty_store();
        store.add("A", now()).expect("add");
        store.add("B", now()).expect("add");
        let id = store.tasks()[1].id;

        store.delete(id).expect("delete");
        assert_eq!(texts(&store), vec!["B"]);
        store.delete(id).expect("delete again");
        assert_eq!(texts(&store), vec!["B"]);
    }

    #[test]
    fn clear_completed_keeps_order_of_the_rest() {
        let mut store = empty_store();
        for text in ["A", "B", "C", "D"] {
            store.add(text, now()).expect("add");
        }
        // order: D C B A
        let c = store.tasks()[1].id;
        let a = store.tasks()[3].id;
        store.toggle(c).expect("toggle");
        store.toggle(a).expect("toggle");

        assert_eq!(store.clear_completed().expect("clear"), Outcome::Persisted);
        assert_eq!(texts(&store), vec!["D", "B"]);
        assert_eq!(store.clear_completed().expect("clear"), Outcome::Ignored);
        assert_eq!(texts(&store), vec!["D", "B"]);
    }

    #[test]
    fn subscribers_fire_once_per_render_request() {
        let mut store = empty_store();
        let renders = Rc::new(Cell::new(0usize));
        let counter = Rc::clone(&renders);
        store.subscribe(move |_| counter.set(counter.get() + 1));

        store.add("", now()).expect("add");
        assert_eq!(renders.get(), 0);

        store.add("A", now()).expect("add");
        let id = store.tasks()[0].id;
        store.edit(id, " ").expect("edit");
        store.clear_completed().expect("clear");
        store.toggle(id).expect("toggle");
        assert_eq!(renders.get(), 3);
    }

    #[test]
    fn every_mutation_is_flushed_to_storage() {
        let mut store = empty_store();
        store.add("A", now()).expect("add");
        store.add("B", now()).expect("add");
        let id = store.tasks()[0].id;
        store.toggle(id).expect("toggle");

        let raw = store
            .persistence()
            .backend()
            .get(TASKS_KEY)
            .expect("get")
            .expect("saved value");
        let reloaded: Vec<crate::task::Task> = serde_json::from_str(&raw).expect("parse");
        assert_eq!(reloaded, store.tasks());
    }
}
