use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::{info, warn};
use std::collections::BTreeSet;

use crate::services::api::BlogApi;
use crate::services::export::fetch_all_summaries;
use crate::services::models::{BlogStats, BlogStatus, BlogSummary};

pub const PAGE_SIZE: usize = 7;
pub const CSV_FILE_NAME: &str = "blogs.csv";

const CSV_HEADERS: [&str; 7] = [
    "blogTitle",
    "language",
    "tone",
    "creativity",
    "createdDate",
    "createdBy",
    "status",
];

/// `22 Jan 2022` style, `-` when missing or unparsable.
pub fn format_date(value: Option<&str>) -> String {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return "-".to_string();
    };
    let date = DateTime::parse_from_rfc3339(value)
        .map(|d| d.date_naive())
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").map(|d| d.date()))
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").map(|d| d.date()))
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"));
    match date {
        Ok(d) => d.format("%-d %b %Y").to_string(),
        Err(_) => "-".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub id: String,
    pub title: String,
    pub language: String,
    pub tone: String,
    pub creativity: String,
    pub created_date: String,
    pub created_by: String,
    pub status: BlogStatus,
}

impl TableRow {
    pub fn from_summary(summary: &BlogSummary) -> Self {
        Self {
            id: summary.id.clone(),
            title: summary.title.clone(),
            language: summary.language.clone(),
            tone: summary.tone.clone(),
            creativity: summary.creativity.clone(),
            created_date: format_date(summary.created_at.as_deref()),
            created_by: summary.created_by.clone(),
            status: summary.status,
        }
    }

    fn columns(&self) -> [&str; 7] {
        [
            &self.title,
            &self.language,
            &self.tone,
            &self.creativity,
            &self.created_date,
            &self.created_by,
            self.status.label(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBadge {
    pub label: &'static str,
    pub background: &'static str,
    pub foreground: &'static str,
    pub border: &'static str,
}

impl StatusBadge {
    pub fn for_status(status: BlogStatus) -> Self {
        let (background, foreground, border) = match status {
            BlogStatus::Published => ("#EEF2FF", "#4443E4", "#C7D2FE"),
            BlogStatus::Pending => ("#FFFBEB", "#B45309", "#FDE68A"),
            BlogStatus::Rejected => ("#FEF2F2", "#DC2626", "#FECACA"),
            _ => ("#ECFDF5", "#065F46", "#A7F3D0"),
        };
        Self {
            label: status.label(),
            background,
            foreground,
            border,
        }
    }
}

/// Case-insensitive substring match over every displayed column.
pub fn filter_rows(rows: &[TableRow], query: &str) -> Vec<TableRow> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return rows.to_vec();
    }
    rows.iter()
        .filter(|row| {
            row.columns()
                .iter()
                .filter(|c| !c.is_empty())
                .map(|c| c.to_lowercase())
                .collect::<Vec<_>>()
                .join(" ")
                .contains(&query)
        })
        .cloned()
        .collect()
}

/// Client-side pager with 1-based pages. The page is clamped whenever the row
/// set shrinks.
#[derive(Debug, Clone)]
pub struct Paged {
    rows: Vec<TableRow>,
    page_size: usize,
    page: usize,
}

impl Paged {
    pub fn new(rows: Vec<TableRow>, page_size: usize) -> Self {
        Self {
            rows,
            page_size: page_size.max(1),
            page: 1,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        self.rows.len().div_ceil(self.page_size).max(1)
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.clamp(1, self.page_count());
    }

    pub fn next_page(&mut self) {
        self.set_page(self.page + 1);
    }

    pub fn previous_page(&mut self) {
        self.set_page(self.page.saturating_sub(1));
    }

    pub fn set_rows(&mut self, rows: Vec<TableRow>) {
        self.rows = rows;
        self.set_page(self.page);
    }

    pub fn current(&self) -> &[TableRow] {
        let start = (self.page - 1) * self.page_size;
        let end = (start + self.page_size).min(self.rows.len());
        self.rows.get(start..end).unwrap_or(&[])
    }

    pub fn current_ids(&self) -> Vec<String> {
        self.current().iter().map(|r| r.id.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSelection {
    ids: BTreeSet<String>,
}

impl RowSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, id: &str) {
        if !self.ids.remove(id) {
            self.ids.insert(id.to_string());
        }
    }

    /// Selects the whole page unless it is already fully selected, in which
    /// case the page is deselected. Selections on other pages are kept.
    pub fn toggle_all(&mut self, page_ids: &[String]) {
        let all_selected = !page_ids.is_empty() && page_ids.iter().all(|id| self.ids.contains(id));
        if all_selected {
            for id in page_ids {
                self.ids.remove(id);
            }
        } else {
            self.ids.extend(page_ids.iter().cloned());
        }
    }

    /// Forgets ids that are no longer among `rows`.
    pub fn prune(&mut self, rows: &[TableRow]) {
        self.ids.retain(|id| rows.iter().any(|r| &r.id == id));
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteOutcome {
    pub deleted: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Deletes every selected post. One failing delete does not stop the batch.
pub async fn delete_selected(api: &dyn BlogApi, selection: &mut RowSelection) -> DeleteOutcome {
    let mut outcome = DeleteOutcome::default();
    for id in selection.ids() {
        match api.delete_blog(&id).await {
            Ok(()) => {
                selection.ids.remove(&id);
                outcome.deleted.push(id);
            }
            Err(e) => {
                warn!("Failed to delete blog {}: {}", id, e);
                outcome.failed.push((id, e.to_string()));
            }
        }
    }
    info!(
        "Deleted {} blogs, {} failed",
        outcome.deleted.len(),
        outcome.failed.len()
    );
    outcome
}

fn escape_csv(value: &str) -> String {
    if value.contains(['"', ',', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn rows_to_csv(rows: &[TableRow]) -> String {
    let mut lines = vec![CSV_HEADERS.join(",")];
    for row in rows {
        let values: Vec<String> = row.columns().iter().map(|v| escape_csv(v)).collect();
        lines.push(values.join(","));
    }
    lines.join("\n")
}

pub async fn load_rows(api: &dyn BlogApi, page_size: u32) -> Result<Vec<TableRow>> {
    let summaries = fetch_all_summaries(api, page_size).await?;
    Ok(summaries.iter().map(TableRow::from_summary).collect())
}

pub async fn load_stats(api: &dyn BlogApi) -> Result<BlogStats> {
    Ok(api.stats().await?)
}

pub async fn request_publish(api: &dyn BlogApi, id: &str) -> Result<()> {
    api.request_publish(id).await?;
    info!("Publish requested for {}", id);
    Ok(())
}
