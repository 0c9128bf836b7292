use std::collections::BTreeSet;
use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;
use uuid::Uuid;

use crate::config::Config;
use crate::datetime::{ClockView, format_created, resolve_display_timezone};
use crate::inline_edit::EditDraft;
use crate::task::Task;

pub const ALL_CLEAR_TITLE: &str = "All tasks completed!";
pub const ALL_CLEAR_HINT: &str = "Add a new task to get started.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowContent {
    Text(String),
    EditField(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    /// 1-based position in display order.
    pub position: usize,
    pub id: Uuid,
    pub short_id: String,
    pub completed: bool,
    pub content: RowContent,
    pub created: String,
    pub can_edit: bool,
    pub can_delete: bool,
    pub exiting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListBody {
    AllClear {
        title: &'static str,
        hint: &'static str,
    },
    Rows(Vec<RowView>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListView {
    pub body: ListBody,
    pub show_clear_completed: bool,
}

impl ListView {
    pub fn rows(&self) -> &[RowView] {
        match &self.body {
            ListBody::Rows(rows) => rows,
            ListBody::AllClear { .. } => &[],
        }
    }

    pub fn is_all_clear(&self) -> bool {
        matches!(self.body, ListBody::AllClear { .. })
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.rows().iter().any(|row| row.id == id)
    }

    pub fn id_at(&self, position: usize) -> Option<Uuid> {
        self.rows()
            .iter()
            .find(|row| row.position == position)
            .map(|row| row.id)
    }
}

impl Default for ListView {
    fn default() -> Self {
        Self {
            body: ListBody::AllClear {
                title: ALL_CLEAR_TITLE,
                hint: ALL_CLEAR_HINT,
            },
            show_clear_completed: false,
        }
    }
}

/// Projects a task collection into a [`ListView`] and writes views as text.
/// Never touches the tasks it is given; each call rebuilds from scratch.
#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    tz: Tz,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };
        let tz = resolve_display_timezone(cfg.get("timezone").as_deref());

        Ok(Self { color, tz })
    }

    /// Colourless renderer in a fixed zone.
    pub fn plain(tz: Tz) -> Self {
        Self { color: false, tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    #[tracing::instrument(skip_all, fields(count = tasks.len()))]
    pub fn render(
        &self,
        tasks: &[Task],
        editing: Option<&EditDraft>,
        exiting: &BTreeSet<Uuid>,
    ) -> ListView {
        let show_clear_completed = tasks.iter().any(|t| t.completed);

        if tasks.is_empty() {
            return ListView::default();
        }

        let rows = tasks
            .iter()
            .enumerate()
            .map(|(idx, task)| {
                let content = match editing {
                    Some(draft) if draft.id == task.id && !task.completed => {
                        RowContent::EditField(draft.buffer.clone())
                    }
                    _ => RowContent::Text(task.text.clone()),
                };
                RowView {
                    position: idx + 1,
                    id: task.id,
                    short_id: task.short_id(),
                    completed: task.completed,
                    content,
                    created: format_created(task.created_at, &self.tz),
                    can_edit: !task.completed,
                    can_delete: true,
                    exiting: exiting.contains(&task.id),
                }
            })
            .collect();

        ListView {
            body: ListBody::Rows(rows),
            show_clear_completed,
        }
    }

    #[tracing::instrument(skip_all)]
    pub fn write_view<W: Write>(
        &self,
        mut out: W,
        view: &ListView,
        clock: Option<&ClockView>,
    ) -> anyhow::Result<()> {
        if let Some(clock) = clock {
            writeln!(out, "{}  {}", self.paint(&clock.date, "36"), clock.time)?;
            writeln!(out)?;
        }

        let rows = match &view.body {
            ListBody::AllClear { title, hint } => {
                writeln!(out, "{}", self.paint(title, "32"))?;
                writeln!(out, "{hint}")?;
                return Ok(());
            }
            ListBody::Rows(rows) => rows,
        };

        let headers = vec![
            "#".to_string(),
            "Done".to_string(),
            "Task".to_string(),
            "Created".to_string(),
            "ID".to_string(),
        ];

        let mut table = Vec::with_capacity(rows.len());
        for row in rows {
            let position = self.paint(&row.position.to_string(), "33");
            let done = if row.completed { "[x]" } else { "[ ]" }.to_string();
            let text = match &row.content {
                RowContent::Text(text) if row.exiting => self.paint(text, "2"),
                RowContent::Text(text) if row.completed => self.paint(text, "9"),
                RowContent::Text(text) => text.clone(),
                RowContent::EditField(buffer) => {
                    format!("{} {}", self.paint("edit>", "7"), buffer)
                }
            };
            table.push(vec![
                position,
                done,
                text,
                row.created.clone(),
                row.short_id.clone(),
            ]);
        }

        write_table(&mut out, headers, table)?;

        if view.show_clear_completed {
            writeln!(out)?;
            writeln!(out, "Completed tasks can be removed with `clear`.")?;
        }

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
