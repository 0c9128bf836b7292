use tracing::{debug, info};

/// Issue-report dialog: a free-text form gated on a minimum length. The
/// form state outlives the dialog closing until [`reset`](Self::reset) runs.
#[derive(Debug)]
pub struct ReportDialog {
    min_length: usize,
    visible: bool,
    sent: bool,
    draft: String,
}

impl ReportDialog {
    pub fn new(min_length: usize) -> Self {
        Self {
            min_length,
            visible: false,
            sent: false,
            draft: String::new(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn open(&mut self) {
        self.visible = true;
    }

    pub fn set_draft(&mut self, text: &str) {
        self.draft = text.to_string();
    }

    pub fn can_submit(&self) -> bool {
        self.visible && !self.sent && self.draft.trim().chars().count() >= self.min_length
    }

    /// Label of the dismiss button.
    pub fn dismiss_label(&self) -> &'static str {
        if self.sent { "Close" } else { "Cancel" }
    }

    /// Logs the report and switches to the success state. Returns the
    /// submitted text, or `None` when submission is not allowed.
    pub fn submit(&mut self) -> Option<String> {
        if !self.can_submit() {
            debug!(
                length = self.draft.trim().chars().count(),
                min = self.min_length,
                "report too short; not sent"
            );
            return None;
        }

        let report = self.draft.trim().to_string();
        info!(target: "ticklist::report", report = %report, "user issue report");
        self.sent = true;
        Some(report)
    }

    /// Hides the dialog. Returns false if it was already hidden.
    pub fn close(&mut self) -> bool {
        std::mem::replace(&mut self.visible, false)
    }

    /// Clears the form back to an empty draft.
    pub fn reset(&mut self) {
        self.sent = false;
        self.draft.clear();
    }
}
