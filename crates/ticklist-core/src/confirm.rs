use tracing::{debug, info};
use uuid::Uuid;

/// How a confirmed deletion should be carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteRequest {
    /// The row is on screen: play the exit transition, then delete.
    Deferred(Uuid),
    /// Nothing to animate: delete right away.
    Immediate(Uuid),
}

/// Two-step delete: `idle` until [`request`](Self::request) sets the single
/// pending slot, back to `idle` on cancel or confirm.
#[derive(Debug, Default)]
pub struct DeleteConfirmation {
    pending: Option<Uuid>,
}

impl DeleteConfirmation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<Uuid> {
        self.pending
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Opens the dialog for `id`. A request while another id is pending
    /// replaces it.
    pub fn request(&mut self, id: Uuid) {
        if let Some(previous) = self.pending.replace(id) {
            debug!(previous = %previous, id = %id, "replacing pending deletion");
        } else {
            debug!(id = %id, "deletion pending confirmation");
        }
    }

    pub fn cancel(&mut self) -> Option<Uuid> {
        let cancelled = self.pending.take();
        if let Some(id) = cancelled {
            debug!(id = %id, "deletion cancelled");
        }
        cancelled
    }

    /// Clears the pending slot before anything else happens, so a second
    /// confirm finds nothing to do.
    pub fn confirm<F>(&mut self, row_visible: F) -> Option<DeleteRequest>
    where
        F: FnOnce(Uuid) -> bool,
    {
        let id = self.pending.take()?;
        info!(id = %id, "deletion confirmed");
        if row_visible(id) {
            Some(DeleteRequest::Deferred(id))
        } else {
            Some(DeleteRequest::Immediate(id))
        }
    }
}
