use std::cell::Cell;
use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::Timings;
use crate::confirm::{DeleteConfirmation, DeleteRequest};
use crate::datastore::KeyValueStore;
use crate::datetime::Clock;
use crate::inline_edit::InlineEdit;
use crate::render::{ListView, Renderer};
use crate::report::ReportDialog;
use crate::scheduler::{DeferredAction, Scheduler};
use crate::selector;
use crate::store::TaskStore;

pub const EMPTY_TASK_MESSAGE: &str = "Oops! A task can't be empty.";

const HELP: &str = "\
Commands:
  add <text>       add a task
  toggle <task>    mark done / not done
  edit <task>      start editing a task
  set <text>       replace the text being edited and save it
  save             save the edit in progress
  cancel           drop the edit in progress (or a pending delete)
  delete <task>    ask to delete a task
  yes | no         confirm or keep the task pending deletion
  clear            remove completed tasks
  list             redraw the list
  time             show the date and time
  report <text>    send an issue report
  report close     close the report dialog
  help             show this help
  quit             leave

<task> is a row number or the start of a task id.";

/// Wall-clock and monotonic readings taken together.
#[derive(Debug, Clone, Copy)]
pub struct Moment {
    pub instant: Instant,
    pub wall: DateTime<Utc>,
}

impl Moment {
    pub fn current() -> Self {
        Self {
            instant: Instant::now(),
            wall: Utc::now(),
        }
    }

    pub fn after(self, elapsed: Duration) -> Self {
        let wall = chrono::Duration::from_std(elapsed)
            .map(|d| self.wall + d)
            .unwrap_or(self.wall);
        Self {
            instant: self.instant + elapsed,
            wall,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Add(String),
    Toggle(String),
    Edit(String),
    Set(String),
    Save,
    Cancel,
    Delete(String),
    Yes,
    No,
    Clear,
    List,
    Time,
    Report(String),
    ReportClose,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl ShellCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "" => Self::Empty,
            "add" | "a" => Self::Add(rest.to_string()),
            "toggle" | "t" | "done" => Self::Toggle(rest.to_string()),
            "edit" | "e" => Self::Edit(rest.to_string()),
            "set" => Self::Set(rest.to_string()),
            "save" => Self::Save,
            "cancel" => Self::Cancel,
            "delete" | "del" | "rm" => Self::Delete(rest.to_string()),
            "yes" | "y" => Self::Yes,
            "no" | "n" => Self::No,
            "clear" => Self::Clear,
            "list" | "ls" => Self::List,
            "time" => Self::Time,
            "report" if rest.eq_ignore_ascii_case("close") => Self::ReportClose,
            "report" => Self::Report(rest.to_string()),
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            _ => Self::Unknown(word.to_string()),
        }
    }

    /// Commands that move focus away from an open inline editor, which
    /// saves it first.
    fn blurs_editor(&self) -> bool {
        matches!(
            self,
            Self::Add(_)
                | Self::Toggle(_)
                | Self::Edit(_)
                | Self::Delete(_)
                | Self::Clear
                | Self::Report(_)
                | Self::Quit
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Interactive session: owns the task store and all ephemeral UI state,
/// and redraws whenever the store asks for a render.
pub struct Session<S, W> {
    store: TaskStore<S>,
    renderer: Renderer,
    timings: Timings,
    clock: Clock,
    edit: InlineEdit,
    confirmation: DeleteConfirmation,
    report: ReportDialog,
    scheduler: Scheduler,
    exiting: BTreeSet<Uuid>,
    view: ListView,
    render_requested: Rc<Cell<bool>>,
    out: W,
}

impl<S: KeyValueStore, W: Write> Session<S, W> {
    pub fn new(mut store: TaskStore<S>, renderer: Renderer, timings: Timings, out: W) -> Self {
        let render_requested = Rc::new(Cell::new(false));
        let flag = Rc::clone(&render_requested);
        store.subscribe(move |_| flag.set(true));

        let clock = Clock::new(renderer.timezone());
        let report = ReportDialog::new(timings.report_min_length);
        let view = renderer.render(store.tasks(), None, &BTreeSet::new());

        Self {
            store,
            renderer,
            timings,
            clock,
            edit: InlineEdit::new(),
            confirmation: DeleteConfirmation::new(),
            report,
            scheduler: Scheduler::new(),
            exiting: BTreeSet::new(),
            view,
            render_requested,
            out,
        }
    }

    pub fn store(&self) -> &TaskStore<S> {
        &self.store
    }

    pub fn view(&self) -> &ListView {
        &self.view
    }

    pub fn edit_state(&self) -> &InlineEdit {
        &self.edit
    }

    pub fn confirmation(&self) -> &DeleteConfirmation {
        &self.confirmation
    }

    pub fn report(&self) -> &ReportDialog {
        &self.report
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn exiting(&self) -> &BTreeSet<Uuid> {
        &self.exiting
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    #[instrument(skip_all)]
    pub fn start(&mut self, now: Moment) -> anyhow::Result<()> {
        self.clock.tick(now.wall);
        self.redraw()?;
        self.prompt()
    }

    /// Handles one input line. Store failures are logged and reported, and
    /// the session keeps going.
    #[instrument(skip(self, now))]
    pub fn handle_line(&mut self, line: &str, now: Moment) -> anyhow::Result<Flow> {
        self.advance(now)?;
        let command = ShellCommand::parse(line);
        debug!(?command, "shell command");

        let flow = match self.dispatch(command, now) {
            Ok(flow) => flow,
            Err(err) => {
                error!(error = ?err, "command failed");
                writeln!(self.out, "error: {err:#}")?;
                Flow::Continue
            }
        };
        if self.render_requested.take() {
            self.after_store_render()?;
        }

        if flow == Flow::Continue {
            self.prompt()?;
        }
        Ok(flow)
    }

    /// Advances the clock and runs every deferred action that is due,
    /// prompting again if the list was redrawn.
    pub fn tick(&mut self, now: Moment) -> anyhow::Result<()> {
        if self.advance(now)? {
            self.prompt()?;
        }
        Ok(())
    }

    fn advance(&mut self, now: Moment) -> anyhow::Result<bool> {
        self.clock.tick(now.wall);
        for action in self.scheduler.take_due(now.instant) {
            if let Err(err) = self.run_deferred(action, now.instant) {
                error!(?action, error = ?err, "deferred action failed");
            }
        }
        if self.render_requested.take() {
            self.after_store_render()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Time until the loop should wake up on its own.
    pub fn next_wakeup(&self, now: Instant) -> Duration {
        let tick = self.timings.clock_tick;
        match self.scheduler.next_deadline() {
            Some(at) => at.saturating_duration_since(now).min(tick),
            None => tick,
        }
    }

    /// Runs whatever is still scheduled so confirmed deletions are not lost
    /// when the session ends.
    pub fn finish(&mut self) -> anyhow::Result<()> {
        if self.edit.is_editing() {
            self.edit.commit(&mut self.store)?;
        }
        let now = Instant::now();
        for action in self.scheduler.drain() {
            self.run_deferred(action, now)?;
        }
        self.render_requested.set(false);
        info!(count = self.store.len(), "session finished");
        Ok(())
    }

    fn dispatch(&mut self, command: ShellCommand, now: Moment) -> anyhow::Result<Flow> {
        if command.blurs_editor() && self.edit.is_editing() {
            self.edit.commit(&mut self.store)?;
            // Settle the blur before the command runs, so an editor it
            // opens is not reset by the save's render.
            if self.render_requested.take() {
                self.after_store_render()?;
            }
        }

        match command {
            ShellCommand::Empty => {}
            ShellCommand::Add(text) => {
                if self.store.add(&text, now.wall)?.render_requested() {
                    debug!("task added from shell");
                } else {
                    writeln!(self.out, "{EMPTY_TASK_MESSAGE}")?;
                }
            }
            ShellCommand::Toggle(token) => {
                if let Some(id) = self.resolve(&token)? {
                    self.store.toggle(id)?;
                }
            }
            ShellCommand::Edit(token) => {
                if let Some(id) = self.resolve(&token)? {
                    if self.edit.begin(&self.store, id) {
                        self.redraw()?;
                        writeln!(self.out, "Editing. Use `set <text>`, `save` or `cancel`.")?;
                    } else {
                        writeln!(self.out, "Completed tasks can't be edited.")?;
                    }
                }
            }
            ShellCommand::Set(text) => {
                if self.edit.set_buffer(&text) {
                    self.edit.commit(&mut self.store)?;
                } else {
                    writeln!(self.out, "Not editing anything.")?;
                }
            }
            ShellCommand::Save => {
                if !self.edit.commit(&mut self.store)?.render_requested() {
                    writeln!(self.out, "Not editing anything.")?;
                }
            }
            ShellCommand::Cancel => {
                if self.edit.cancel() {
                    self.redraw()?;
                } else if self.confirmation.cancel().is_some() {
                    writeln!(self.out, "Kept.")?;
                }
            }
            ShellCommand::Delete(token) => {
                if let Some(id) = self.resolve(&token)? {
                    self.confirmation.request(id);
                    let text = self.store.get(id).map(|t| t.text.clone()).unwrap_or_default();
                    writeln!(
                        self.out,
                        "Delete \"{text}\"? This can't be undone. Type `yes` to delete or `no` to keep it."
                    )?;
                }
            }
            ShellCommand::Yes => self.confirm_delete(now)?,
            ShellCommand::No => {
                if self.confirmation.cancel().is_some() {
                    writeln!(self.out, "Kept.")?;
                } else {
                    writeln!(self.out, "Nothing to confirm.")?;
                }
            }
            ShellCommand::Clear => self.clear_completed(now)?,
            ShellCommand::List => self.redraw()?,
            ShellCommand::Time => {
                let view = self.clock.read(now.wall);
                writeln!(self.out, "{}  {}", view.date, view.time)?;
            }
            ShellCommand::Report(text) => self.submit_report(&text, now)?,
            ShellCommand::ReportClose => self.close_report(now)?,
            ShellCommand::Help => writeln!(self.out, "{HELP}")?,
            ShellCommand::Quit => return Ok(Flow::Quit),
            ShellCommand::Unknown(word) => {
                writeln!(self.out, "Unknown command `{word}`. Type `help` for a list.")?;
            }
        }

        Ok(Flow::Continue)
    }

    fn resolve(&mut self, token: &str) -> anyhow::Result<Option<Uuid>> {
        let found = selector::resolve(self.store.tasks(), token);
        if found.is_none() {
            writeln!(self.out, "No task matches `{}`.", token.trim())?;
        }
        Ok(found)
    }

    #[instrument(skip_all)]
    fn confirm_delete(&mut self, now: Moment) -> anyhow::Result<()> {
        let view = &self.view;
        match self.confirmation.confirm(|id| view.contains(id)) {
            Some(DeleteRequest::Deferred(id)) => {
                self.exiting.insert(id);
                self.scheduler
                    .schedule(DeferredAction::Delete(id), now.instant + self.timings.fade_out);
                self.redraw()?;
            }
            Some(DeleteRequest::Immediate(id)) => {
                self.store.delete(id)?;
            }
            None => writeln!(self.out, "Nothing to confirm.")?,
        }
        Ok(())
    }

    #[instrument(skip_all)]
    fn clear_completed(&mut self, now: Moment) -> anyhow::Result<()> {
        if !self.store.has_completed() {
            writeln!(self.out, "No completed tasks to clear.")?;
            return Ok(());
        }

        let completed = self.store.tasks().iter().filter(|t| t.completed).map(|t| t.id);
        self.exiting.extend(completed);
        self.scheduler
            .schedule(DeferredAction::ClearCompleted, now.instant + self.timings.erase_out);
        self.redraw()
    }

    fn submit_report(&mut self, text: &str, now: Moment) -> anyhow::Result<()> {
        self.report.open();
        self.report.set_draft(text);
        if self.report.submit().is_some() {
            writeln!(self.out, "Thanks! Your report has been sent.")?;
            writeln!(self.out, "{} with `report close`.", self.report.dismiss_label())?;
            self.scheduler
                .schedule(DeferredAction::CloseReport, now.instant + self.timings.report_success);
        } else {
            writeln!(
                self.out,
                "Please describe the issue in at least {} characters.",
                self.timings.report_min_length
            )?;
            writeln!(self.out, "{} with `report close`.", self.report.dismiss_label())?;
        }
        Ok(())
    }

    fn close_report(&mut self, now: Moment) -> anyhow::Result<()> {
        self.scheduler.cancel(DeferredAction::CloseReport);
        if self.report.close() {
            self.scheduler
                .schedule(DeferredAction::ResetReport, now.instant + self.timings.dialog_transition);
        }
        Ok(())
    }

    #[instrument(skip(self, now))]
    fn run_deferred(&mut self, action: DeferredAction, now: Instant) -> anyhow::Result<()> {
        match action {
            DeferredAction::Delete(id) => {
                self.exiting.remove(&id);
                self.store.delete(id)?;
            }
            DeferredAction::ClearCompleted => {
                let outcome = self.store.clear_completed();
                let scheduler = &self.scheduler;
                self.exiting
                    .retain(|id| scheduler.is_scheduled(DeferredAction::Delete(*id)));
                // Exit marks changed even if nothing was left to clear.
                self.render_requested.set(true);
                outcome?;
            }
            DeferredAction::CloseReport => {
                if self.report.close() {
                    self.scheduler
                        .schedule(DeferredAction::ResetReport, now + self.timings.dialog_transition);
                }
            }
            DeferredAction::ResetReport => self.report.reset(),
        }
        Ok(())
    }

    /// A store render request rebuilds everything, which also drops any
    /// open inline editor.
    fn after_store_render(&mut self) -> anyhow::Result<()> {
        self.edit.reset();
        self.redraw()
    }

    fn redraw(&mut self) -> anyhow::Result<()> {
        self.view = self
            .renderer
            .render(self.store.tasks(), self.edit.draft(), &self.exiting);
        self.renderer
            .write_view(&mut self.out, &self.view, self.clock.current())?;
        Ok(())
    }

    fn prompt(&mut self) -> anyhow::Result<()> {
        write!(self.out, "> ")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Runs `session` against stdin until `quit` or end of input. A helper
/// thread only reads lines; all state changes happen on this thread.
#[instrument(skip_all)]
pub fn run_interactive<S, W>(mut session: Session<S, W>) -> anyhow::Result<()>
where
    S: KeyValueStore,
    W: Write,
{
    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "stdin read failed; ending input");
                    break;
                }
            }
        }
    });

    session.start(Moment::current())?;
    loop {
        let wait = session.next_wakeup(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(line) => {
                if session.handle_line(&line, Moment::current())? == Flow::Quit {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => session.tick(Moment::current())?,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("stdin closed");
                break;
            }
        }
    }

    session.finish()
}
