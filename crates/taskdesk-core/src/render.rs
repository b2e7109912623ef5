use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use taskdesk_shared::{Task, User};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::list::ListStats;
use crate::pages::dashboard::Dashboard;

const RED: &str = "31";
const GREEN: &str = "32";
const YELLOW: &str = "33";
const DIM: &str = "2";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.ui.color && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Overdue pending tasks are highlighted against `today`.
    #[tracing::instrument(skip(self, out, tasks))]
    pub fn task_table<W: Write>(&self, out: W, tasks: &[Task], today: NaiveDate) -> anyhow::Result<()> {
        if tasks.is_empty() {
            return self.empty(out, "No tasks");
        }

        let headers = vec![
            "ID".to_string(),
            "Title".to_string(),
            "Status".to_string(),
            "Due".to_string(),
            "User".to_string(),
            "Created".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let due = day_part(&task.due_date);
            let overdue = !task.completed
                && NaiveDate::parse_from_str(due, "%Y-%m-%d").is_ok_and(|date| date < today);
            let due = if overdue {
                self.paint(due, RED)
            } else {
                due.to_string()
            };
            let status = if task.completed {
                self.paint("done", GREEN)
            } else {
                "pending".to_string()
            };

            rows.push(vec![
                self.paint(&task.id.to_string(), YELLOW),
                task.title.clone(),
                status,
                due,
                task.user.name.clone(),
                day_part(&task.created_at).to_string(),
            ]);
        }

        write_table(out, headers, rows)
    }

    pub fn task_detail<W: Write>(&self, mut out: W, task: &Task) -> anyhow::Result<()> {
        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(out, "description {}", task.description)?;
        writeln!(out, "completed   {}", task.completed)?;
        writeln!(out, "due         {}", day_part(&task.due_date))?;
        writeln!(out, "user        {} <{}>", task.user.name, task.user.mail)?;
        writeln!(out, "created     {}", task.created_at)?;
        Ok(())
    }

    pub fn task_stats<W: Write>(&self, mut out: W, stats: ListStats) -> anyhow::Result<()> {
        writeln!(
            out,
            "{} tasks  {} completed  {} pending  {} pages",
            stats.total,
            self.paint(&stats.completed.to_string(), GREEN),
            self.paint(&stats.pending.to_string(), YELLOW),
            stats.total_pages
        )?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, users))]
    pub fn user_table<W: Write>(&self, out: W, users: &[User]) -> anyhow::Result<()> {
        if users.is_empty() {
            return self.empty(out, "No users registered");
        }

        let headers = vec![
            "ID".to_string(),
            "Name".to_string(),
            "Mail".to_string(),
            "Role".to_string(),
        ];
        let rows = users
            .iter()
            .map(|user| {
                vec![
                    self.paint(&user.id.to_string(), YELLOW),
                    user.name.clone(),
                    user.mail.clone(),
                    user.role.to_string(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    pub fn user_detail<W: Write>(&self, mut out: W, user: &User) -> anyhow::Result<()> {
        writeln!(out, "id    {}", user.id)?;
        writeln!(out, "name  {}", user.name)?;
        writeln!(out, "mail  {}", user.mail)?;
        writeln!(out, "role  {}", user.role)?;
        Ok(())
    }

    /// Paging footer, shown only when there is more than one page. Bounds
    /// that cannot be crossed are dimmed.
    pub fn pager<W: Write>(
        &self,
        mut out: W,
        current_page: u32,
        total_pages: u32,
        can_previous: bool,
        can_next: bool,
    ) -> anyhow::Result<()> {
        if total_pages <= 1 {
            return Ok(());
        }
        let previous = if can_previous {
            "< prev".to_string()
        } else {
            self.paint("< prev", DIM)
        };
        let next = if can_next {
            "next >".to_string()
        } else {
            self.paint("next >", DIM)
        };
        writeln!(
            out,
            "{previous}  Page {} of {}  {next}",
            current_page + 1,
            total_pages
        )?;
        Ok(())
    }

    pub fn dashboard<W: Write>(&self, mut out: W, page: &Dashboard<'_>) -> anyhow::Result<()> {
        writeln!(out, "signed in as {}", page.subject().unwrap_or("-"))?;
        writeln!(out, "role         {}", page.role())?;
        if let Some(user_id) = page.session().user_id() {
            writeln!(out, "user id      {user_id}")?;
        }
        if let Some(expires) = page.session().expires_at() {
            writeln!(out, "expires      {}", expires.format("%Y-%m-%d %H:%M:%S UTC"))?;
        }
        if let Some(profile) = page.profile() {
            writeln!(out, "name         {}", profile.name)?;
        }
        let sections = page
            .sections()
            .iter()
            .map(|route| route.path())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "sections     {sections}")?;
        Ok(())
    }

    /// Form rejection: the banner if any, then one line per field.
    pub fn form_errors<W: Write>(
        &self,
        mut out: W,
        banner: Option<&str>,
        fields: &BTreeMap<String, String>,
    ) -> anyhow::Result<()> {
        if let Some(banner) = banner {
            writeln!(out, "{}", self.paint(banner, RED))?;
            return Ok(());
        }
        for (field, message) in fields {
            writeln!(out, "{}: {}", field, self.paint(message, RED))?;
        }
        Ok(())
    }

    fn empty<W: Write>(&self, mut out: W, message: &str) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(message, DIM))?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn day_part(timestamp: &str) -> &str {
    timestamp.split('T').next().unwrap_or(timestamp)
}

fn write_table<W: Write>(mut writer: W, headers: Vec<String>, rows: Vec<Vec<String>>) -> anyhow::Result<()> {
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

    for (header, &width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ")?;
    }
    writeln!(writer)?;

    for &width in &widths {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
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
