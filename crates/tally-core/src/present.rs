use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Duration, Local, Utc};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::task::Task;

/// Deadline has passed and the task is still open.
pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    match task.deadline {
        Some(deadline) => !task.done && deadline < now,
        None => false,
    }
}

/// Deadline is within the next 24 hours, task still open and not yet overdue.
pub fn is_imminent(task: &Task, now: DateTime<Utc>) -> bool {
    let Some(deadline) = task.deadline else {
        return false;
    };
    if task.done || is_overdue(task, now) {
        return false;
    }
    let remaining = deadline - now;
    remaining > Duration::zero() && remaining <= Duration::hours(24)
}

/// Aggregate counts over the full collection, not the filtered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub total: usize,
    pub open: usize,
}

pub fn counts(tasks: &[Task]) -> Counts {
    Counts {
        total: tasks.len(),
        open: tasks.iter().filter(|t| !t.done).count(),
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, visible, all, now))]
    pub fn print_task_list(
        &mut self,
        visible: &[&Task],
        all: &[Task],
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Pri".to_string(),
            "Category".to_string(),
            "Deadline".to_string(),
            "Created".to_string(),
            "Task".to_string(),
        ];

        let rows: Vec<Vec<String>> = visible.iter().map(|task| self.row_cells(task, now)).collect();

        write_table(&mut out, headers, rows)?;

        let totals = counts(all);
        writeln!(out, "\nActive: {} / {}", totals.open, totals.total)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_task_info(&mut self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "text      {}", task.text)?;
        writeln!(out, "category  {}", task.category)?;
        writeln!(out, "priority  {}", task.priority)?;
        writeln!(out, "done      {}", task.done)?;
        writeln!(
            out,
            "created   {}",
            task.created.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        )?;
        if let Some(deadline) = task.deadline {
            writeln!(
                out,
                "deadline  {}",
                deadline.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            )?;
        }

        Ok(())
    }

    fn row_cells(&self, task: &Task, now: DateTime<Utc>) -> Vec<String> {
        let id: String = task.id.to_string().chars().take(8).collect();
        let id = self.paint(&id, "33");

        let deadline_raw = task
            .deadline
            .map(|d| d.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let deadline = if is_overdue(task, now) {
            self.paint(&deadline_raw, "31")
        } else if is_imminent(task, now) {
            let warned = format!("{deadline_raw} deadline soon!");
            self.paint(&warned, "33")
        } else {
            deadline_raw
        };

        let created = task
            .created
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();

        let text = if task.done {
            self.paint(&format!("[x] {}", task.text), "2")
        } else {
            format!("[ ] {}", task.text)
        };

        vec![
            id,
            task.priority.to_string(),
            task.category.clone(),
            deadline,
            created,
            text,
        ]
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;

    fn task_due(deadline: Option<DateTime<Utc>>, done: bool) -> Task {
        let mut t = Task::new(
            "pay rent".to_string(),
            "home".to_string(),
            Priority::Normal,
            deadline,
            Utc::now(),
        );
        t.done = done;
        t
    }

    #[test]
    fn deadline_in_one_hour_is_imminent_not_overdue() {
        let now = Utc::now();
        let t = task_due(Some(now + Duration::hours(1)), false);
        assert!(is_imminent(&t, now));
        assert!(!is_overdue(&t, now));
    }

    #[test]
    fn deadline_one_second_ago_is_overdue() {
        let now = Utc::now();
        let t = task_due(Some(now - Duration::seconds(1)), false);
        assert!(is_overdue(&t, now));
        assert!(!is_imminent(&t, now));
    }

    #[test]
    fn done_tasks_are_never_flagged() {
        let now = Utc::now();
        let overdue = task_due(Some(now - Duration::hours(1)), true);
        let soon = task_due(Some(now + Duration::hours(1)), true);
        assert!(!is_overdue(&overdue, now));
        assert!(!is_imminent(&soon, now));
    }

    #[test]
    fn deadline_beyond_24h_is_neither() {
        let now = Utc::now();
        let t = task_due(Some(now + Duration::hours(25)), false);
        assert!(!is_overdue(&t, now));
        assert!(!is_imminent(&t, now));
    }

    #[test]
    fn no_deadline_is_neither() {
        let now = Utc::now();
        let t = task_due(None, false);
        assert!(!is_overdue(&t, now));
        assert!(!is_imminent(&t, now));
    }

    #[test]
    fn list_rows_carry_the_created_timestamp() {
        let cfg = Config::load(Some(std::path::Path::new("/dev/null"))).expect("load config");
        let renderer = Renderer::new(&cfg).expect("renderer");

        let now = Utc::now();
        let task = task_due(None, false);
        let cells = renderer.row_cells(&task, now);

        assert_eq!(cells.len(), 6);
        assert_eq!(
            cells[4],
            task.created
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        );
        assert!(cells[5].contains("pay rent"));
    }

    #[test]
    fn counts_split_open_from_total() {
        let tasks = vec![
            task_due(None, false),
            task_due(None, true),
            task_due(None, false),
        ];
        assert_eq!(counts(&tasks), Counts { total: 3, open: 2 });
    }
}
