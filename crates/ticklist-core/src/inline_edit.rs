use tracing::debug;
use uuid::Uuid;

use crate::datastore::KeyValueStore;
use crate::store::{Outcome, TaskStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDraft {
    pub id: Uuid,
    pub buffer: String,
}

/// Display/edit sub-state for list rows. At most one row is in edit mode;
/// the state is never persisted and is dropped on every render.
#[derive(Debug, Default)]
pub struct InlineEdit {
    draft: Option<EditDraft>,
}

impl InlineEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> Option<&EditDraft> {
        self.draft.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        self.draft.is_some()
    }

    /// Enters edit mode for `id`, seeded with the current text. Completed or
    /// unknown tasks stay in display mode.
    pub fn begin<S: KeyValueStore>(&mut self, store: &TaskStore<S>, id: Uuid) -> bool {
        match store.get(id) {
            Some(task) if !task.completed => {
                debug!(id = %id, "entering edit mode");
                self.draft = Some(EditDraft {
                    id,
                    buffer: task.text.clone(),
                });
                true
            }
            _ => false,
        }
    }

    pub fn set_buffer(&mut self, text: &str) -> bool {
        match self.draft.as_mut() {
            Some(draft) => {
                draft.buffer = text.to_string();
                true
            }
            None => false,
        }
    }

    /// Leaves edit mode through `TaskStore::edit`. A blank buffer keeps the
    /// old text; the store still requests a render.
    pub fn commit<S: KeyValueStore>(&mut self, store: &mut TaskStore<S>) -> anyhow::Result<Outcome> {
        let Some(draft) = self.draft.take() else {
            return Ok(Outcome::Ignored);
        };
        store.edit(draft.id, &draft.buffer)
    }

    /// Drops the draft without touching the store. Returns whether there was
    /// one; the caller re-renders.
    pub fn cancel(&mut self) -> bool {
        self.draft.take().is_some()
    }

    pub fn reset(&mut self) {
        self.draft = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::InlineEdit;
    use crate::datastore::{MemoryStore, TaskPersistence};
    use crate::store::{Outcome, TaskStore};

    fn store_with(texts: &[&str]) -> TaskStore<MemoryStore> {
        let mut store = TaskStore::open(TaskPersistence::new(MemoryStore::new()));
        for text in texts {
            store.add(text, Utc::now()).expect("add");
        }
        store
    }

    #[test]
    fn commit_applies_trimmed_buffer() {
        let mut store = store_with(&["draft"]);
        let id = store.tasks()[0].id;
        let mut edit = InlineEdit::new();

        assert!(edit.begin(&store, id));
        assert_eq!(edit.draft().map(|d| d.buffer.as_str()), Some("draft"));
        edit.set_buffer("  final  ");
        assert_eq!(edit.commit(&mut store).expect("commit"), Outcome::Persisted);
        assert!(!edit.is_editing());
        assert_eq!(store.tasks()[0].text, "final");
    }

    #[test]
    fn blank_commit_keeps_text_but_renders() {
        let mut store = store_with(&["keep me"]);
        let id = store.tasks()[0].id;
        let mut edit = InlineEdit::new();

        edit.begin(&store, id);
        edit.set_buffer("   ");
        assert_eq!(edit.commit(&mut store).expect("commit"), Outcome::RenderOnly);
        assert_eq!(store.tasks()[0].text, "keep me");
    }

    #[test]
    fn cancel_discards_without_store_call() {
        let mut store = store_with(&["same"]);
        let id = store.tasks()[0].id;
        let mut edit = InlineEdit::new();

        edit.begin(&store, id);
        edit.set_buffer("changed");
        assert!(edit.cancel());
        assert!(!edit.cancel());
        assert_eq!(edit.commit(&mut store).expect("commit"), Outcome::Ignored);
        assert_eq!(store.tasks()[0].text, "same");
    }

    #[test]
    fn completed_tasks_cannot_enter_edit_mode() {
        let mut store = store_with(&["done"]);
        let id = store.tasks()[0].id;
        store.toggle(id).expect("toggle");

        let mut edit = InlineEdit::new();
        assert!(!edit.begin(&store, id));
        assert!(!edit.set_buffer("nope"));
    }
}
