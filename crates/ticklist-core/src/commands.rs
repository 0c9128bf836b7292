use std::collections::BTreeSet;
use std::io::{BufRead, Write};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::cli::Command;
use crate::config::{Config, Timings};
use crate::confirm::{DeleteConfirmation, DeleteRequest};
use crate::datastore::KeyValueStore;
use crate::datetime::Clock;
use crate::render::Renderer;
use crate::report::ReportDialog;
use crate::selector;
use crate::session::EMPTY_TASK_MESSAGE;
use crate::store::{Outcome, TaskStore};

/// Runs a single non-interactive command. `input` answers the delete
/// confirmation prompt.
#[instrument(skip(
  store, cfg, renderer, input, out,
  now
))]
pub fn dispatch<S, R, W>(
  store: &mut TaskStore<S>,
  cfg: &Config,
  renderer: &Renderer,
  command: Command,
  input: &mut R,
  out: &mut W,
  now: DateTime<Utc>
) -> anyhow::Result<()>
where
  S: KeyValueStore,
  R: BufRead,
  W: Write
{
  match command {
    | Command::List => {
      cmd_list(store, renderer, out, now)
    }
    | Command::Add { text } => cmd_add(
      store,
      renderer,
      &text.join(" "),
      out,
      now
    ),
    | Command::Toggle { task } => {
      cmd_toggle(
        store, renderer, &task, out
      )
    }
    | Command::Edit { task, text } => {
      cmd_edit(
        store,
        renderer,
        &task,
        &text.join(" "),
        out
      )
    }
    | Command::Delete { task, yes } => {
      let skip_prompt = yes
        || !cfg
          .get_bool("confirm.delete")
          .unwrap_or(true);
      cmd_delete(
        store,
        renderer,
        &task,
        skip_prompt,
        input,
        out
      )
    }
    | Command::ClearCompleted => {
      cmd_clear_completed(
        store, renderer, out
      )
    }
    | Command::Report { text } => {
      let timings =
        Timings::from_config(cfg)?;
      cmd_report(
        timings.report_min_length,
        &text.join(" "),
        out
      )
    }
    | Command::Shell => Err(
      anyhow::anyhow!(
        "shell is interactive and \
         runs through session::run_interactive"
      )
    )
  }
}

#[instrument(skip_all)]
fn cmd_list<S: KeyValueStore, W: Write>(
  store: &TaskStore<S>,
  renderer: &Renderer,
  out: &mut W,
  now: DateTime<Utc>
) -> anyhow::Result<()> {
  info!("command list");
  let clock =
    Clock::new(renderer.timezone())
      .read(now);
  let view = renderer.render(
    store.tasks(),
    None,
    &BTreeSet::new()
  );
  renderer.write_view(
    out,
    &view,
    Some(&clock)
  )
}

fn print_list<S: KeyValueStore, W: Write>(
  store: &TaskStore<S>,
  renderer: &Renderer,
  out: &mut W
) -> anyhow::Result<()> {
  let view = renderer.render(
    store.tasks(),
    None,
    &BTreeSet::new()
  );
  writeln!(out)?;
  renderer.write_view(out, &view, None)
}

#[instrument(skip_all)]
fn cmd_add<S: KeyValueStore, W: Write>(
  store: &mut TaskStore<S>,
  renderer: &Renderer,
  text: &str,
  out: &mut W,
  now: DateTime<Utc>
) -> anyhow::Result<()> {
  info!("command add");

  match store.add(text, now)? {
    | Outcome::Ignored => {
      writeln!(
        out,
        "{EMPTY_TASK_MESSAGE}"
      )?;
      Ok(())
    }
    | _ => {
      let short = store
        .tasks()
        .first()
        .map(|t| t.short_id())
        .unwrap_or_default();
      debug!(
        count = store.len(),
        "task added"
      );
      writeln!(
        out,
        "Created task {short}."
      )?;
      print_list(store, renderer, out)
    }
  }
}

#[instrument(skip_all)]
fn cmd_toggle<S: KeyValueStore, W: Write>(
  store: &mut TaskStore<S>,
  renderer: &Renderer,
  token: &str,
  out: &mut W
) -> anyhow::Result<()> {
  info!("command toggle");

  let Some(id) =
    resolve_or_report(store, token, out)?
  else {
    return Ok(());
  };
  store.toggle(id)?;

  let done = store
    .get(id)
    .is_some_and(|t| t.completed);
  writeln!(
    out,
    "Marked task {} as {}.",
    token.trim(),
    if done {
      "done"
    } else {
      "not done"
    }
  )?;
  print_list(store, renderer, out)
}

#[instrument(skip_all)]
fn cmd_edit<S: KeyValueStore, W: Write>(
  store: &mut TaskStore<S>,
  renderer: &Renderer,
  token: &str,
  text: &str,
  out: &mut W
) -> anyhow::Result<()> {
  info!("command edit");

  let Some(id) =
    resolve_or_report(store, token, out)?
  else {
    return Ok(());
  };
  if store
    .get(id)
    .is_some_and(|t| t.completed)
  {
    writeln!(
      out,
      "Completed tasks can't be edited."
    )?;
    return Ok(());
  }

  if store.edit(id, text)?.persisted() {
    writeln!(out, "Task updated.")?;
  } else {
    writeln!(
      out,
      "Task text can't be empty; \
       nothing changed."
    )?;
  }
  print_list(store, renderer, out)
}

#[instrument(skip_all)]
fn cmd_delete<S, R, W>(
  store: &mut TaskStore<S>,
  renderer: &Renderer,
  token: &str,
  skip_prompt: bool,
  input: &mut R,
  out: &mut W
) -> anyhow::Result<()>
where
  S: KeyValueStore,
  R: BufRead,
  W: Write
{
  info!("command delete");

  let Some(id) =
    resolve_or_report(store, token, out)?
  else {
    return Ok(());
  };

  let mut dialog =
    DeleteConfirmation::new();
  dialog.request(id);

  if !skip_prompt {
    let text = store
      .get(id)
      .map(|t| t.text.clone())
      .unwrap_or_default();
    write!(
      out,
      "Delete \"{text}\"? This can't \
       be undone. [y/N] "
    )?;
    out.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    if !matches!(
      answer
        .trim()
        .to_ascii_lowercase()
        .as_str(),
      "y" | "yes"
    ) {
      dialog.cancel();
      writeln!(out, "Kept.")?;
      return Ok(());
    }
  }

  // No rows are on screen in one-shot mode, so nothing is animated.
  match dialog.confirm(|_| false) {
    | Some(DeleteRequest::Immediate(id))
    | Some(DeleteRequest::Deferred(id)) => {
      store.delete(id)?;
      writeln!(out, "Deleted.")?;
      print_list(store, renderer, out)
    }
    | None => Ok(())
  }
}

#[instrument(skip_all)]
fn cmd_clear_completed<S, W>(
  store: &mut TaskStore<S>,
  renderer: &Renderer,
  out: &mut W
) -> anyhow::Result<()>
where
  S: KeyValueStore,
  W: Write
{
  info!("command clear-completed");

  let before = store.len();
  if store.clear_completed()?
    == Outcome::Ignored
  {
    writeln!(
      out,
      "No completed tasks to clear."
    )?;
    return Ok(());
  }

  writeln!(
    out,
    "Cleared {} completed task(s).",
    before - store.len()
  )?;
  print_list(store, renderer, out)
}

#[instrument(skip_all)]
fn cmd_report<W: Write>(
  min_length: usize,
  text: &str,
  out: &mut W
) -> anyhow::Result<()> {
  info!("command report");

  let mut dialog =
    ReportDialog::new(min_length);
  dialog.open();
  dialog.set_draft(text);
  if dialog.submit().is_some() {
    writeln!(
      out,
      "Thanks! Your report has been \
       sent."
    )?;
  } else {
    writeln!(
      out,
      "Please describe the issue in at \
       least {min_length} characters."
    )?;
  }
  Ok(())
}

fn resolve_or_report<S, W>(
  store: &TaskStore<S>,
  token: &str,
  out: &mut W
) -> anyhow::Result<Option<uuid::Uuid>>
where
  S: KeyValueStore,
  W: Write
{
  let found =
    selector::resolve(store.tasks(), token);
  if found.is_none() {
    writeln!(
      out,
      "No task matches `{}`.",
      token.trim()
    )?;
  }
  Ok(found)
}
