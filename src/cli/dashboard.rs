use anyhow::{Context, Result};
use inquire::{Confirm, MultiSelect, Select, Text};

use super::{report, spinner};
use crate::core::io::Storage;
use crate::core::state::AppState;
use crate::services::dashboard::{
    self, filter_rows, rows_to_csv, Paged, RowSelection, TableRow, CSV_FILE_NAME, PAGE_SIZE,
};
use crate::services::export::{default_file_name, Exporter};
use crate::utils::raster::{HttpImageLoader, SvgRenderer};

const SEARCH: &str = "Search";
const NEXT_PAGE: &str = "Next page";
const PREVIOUS_PAGE: &str = "Previous page";
const SELECT: &str = "Select rows on this page";
const OPEN: &str = "Open a blog";
const PUBLISH: &str = "Request publishing";
const DELETE: &str = "Delete selected";
const CSV: &str = "Export table to CSV";
const PDF: &str = "Export all blogs to PDF";
const STATS: &str = "Show stats";
const REFRESH: &str = "Refresh";
const DONE: &str = "Back to menu";

fn print_table(paged: &Paged, selection: &RowSelection) {
    println!(
        "\n  {:<3} {:<40} {:<10} {:<9} {:<10} {:<12} {:<16} {}",
        "", "Blog title", "Language", "Tone", "Creativity", "Created", "Created by", "Status"
    );
    for row in paged.current() {
        let mark = if selection.is_selected(&row.id) { "[x]" } else { "[ ]" };
        let title: String = row.title.chars().take(40).collect();
        println!(
            "  {:<3} {:<40} {:<10} {:<9} {:<10} {:<12} {:<16} {}",
            mark,
            title,
            row.language,
            row.tone,
            row.creativity,
            row.created_date,
            row.created_by,
            row.status.label()
        );
    }
    println!(
        "  Page {} of {}, {} selected\n",
        paged.page(),
        paged.page_count(),
        selection.len()
    );
}

async fn load(app: &AppState) -> Result<Vec<TableRow>> {
    let pb = spinner("Loading blogs...")?;
    let rows = dashboard::load_rows(app.api.as_ref(), app.config.export.summary_page_size).await;
    pb.finish_and_clear();
    rows
}

fn row_label(row: &TableRow) -> String {
    format!("{} ({}, {})", row.title, row.created_date, row.status.label())
}

pub async fn run(app: &AppState, storage: &dyn Storage) -> Result<()> {
    let mut all_rows = load(app).await?;
    let mut query = String::new();
    let mut paged = Paged::new(filter_rows(&all_rows, &query), PAGE_SIZE);
    let mut selection = RowSelection::new();

    loop {
        if all_rows.is_empty() {
            println!("No blogs yet. Create one from the main menu.");
        } else {
            print_table(&paged, &selection);
        }

        let mut actions = vec![SEARCH];
        if paged.page() < paged.page_count() {
            actions.push(NEXT_PAGE);
        }
        if paged.page() > 1 {
            actions.push(PREVIOUS_PAGE);
        }
        if !paged.current().is_empty() {
            actions.extend([SELECT, OPEN, PUBLISH]);
        }
        if !selection.is_empty() {
            actions.push(DELETE);
        }
        actions.extend([CSV, PDF, STATS, REFRESH, DONE]);

        let Some(action) = Select::new("Dashboard", actions).prompt_skippable()? else {
            return Ok(());
        };

        let result: Result<()> = match action {
            SEARCH => {
                query = Text::new("Search:").with_initial_value(&query).prompt()?;
                paged.set_rows(filter_rows(&all_rows, &query));
                paged.set_page(1);
                Ok(())
            }
            NEXT_PAGE => {
                paged.next_page();
                Ok(())
            }
            PREVIOUS_PAGE => {
                paged.previous_page();
                Ok(())
            }
            SELECT => {
                let rows = paged.current().to_vec();
                let labels: Vec<String> = rows.iter().map(row_label).collect();
                let defaults: Vec<usize> = rows
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| selection.is_selected(&r.id))
                    .map(|(i, _)| i)
                    .collect();
                if let Some(chosen) = MultiSelect::new("Selected rows:", labels)
                    .with_default(&defaults)
                    .raw_prompt_skippable()?
                {
                    let chosen: Vec<usize> = chosen.into_iter().map(|o| o.index).collect();
                    for (i, row) in rows.iter().enumerate() {
                        if chosen.contains(&i) != selection.is_selected(&row.id) {
                            selection.toggle(&row.id);
                        }
                    }
                }
                Ok(())
            }
            OPEN => match pick_row(&paged)? {
                Some(row) => super::preview::run(app, Some(&row.id)).await,
                None => Ok(()),
            },
            PUBLISH => match pick_row(&paged)? {
                Some(row) => {
                    let result = dashboard::request_publish(app.api.as_ref(), &row.id).await;
                    if result.is_ok() {
                        println!("Publish requested for '{}'.", row.title);
                    }
                    result
                }
                None => Ok(()),
            },
            DELETE => {
                let prompt = format!("Delete {} selected blogs?", selection.len());
                if Confirm::new(&prompt).with_default(false).prompt()? {
                    let outcome = dashboard::delete_selected(app.api.as_ref(), &mut selection).await;
                    println!("Deleted {} blogs.", outcome.deleted.len());
                    for (id, err) in &outcome.failed {
                        eprintln!("Could not delete {}: {}", id, err);
                    }
                    all_rows.retain(|r| !outcome.deleted.contains(&r.id));
                    paged.set_rows(filter_rows(&all_rows, &query));
                    selection.prune(&all_rows);
                }
                Ok(())
            }
            CSV => export_csv(app, storage, &filter_rows(&all_rows, &query)).await,
            PDF => export_pdf(app, storage).await,
            STATS => dashboard::load_stats(app.api.as_ref()).await.map(|stats| {
                println!(
                    "Total: {}  Saved: {}  Pending: {}  Published: {}  Generated images: {}",
                    stats.total_blogs,
                    stats.saved_blogs,
                    stats.pending_blogs,
                    stats.published_blogs,
                    stats.generated_images
                );
            }),
            REFRESH => load(app).await.map(|rows| {
                all_rows = rows;
                paged.set_rows(filter_rows(&all_rows, &query));
                selection.prune(&all_rows);
            }),
            _ => return Ok(()),
        };
        if let Err(e) = result {
            report(&e);
        }
    }
}

fn pick_row(paged: &Paged) -> Result<Option<TableRow>> {
    let rows = paged.current().to_vec();
    let labels: Vec<String> = rows.iter().map(row_label).collect();
    Ok(Select::new("Blog:", labels)
        .raw_prompt_skippable()?
        .map(|choice| rows[choice.index].clone()))
}

async fn export_csv(app: &AppState, storage: &dyn Storage, rows: &[TableRow]) -> Result<()> {
    let path = format!(
        "{}/{}",
        app.config.output_folder.trim_end_matches('/'),
        CSV_FILE_NAME
    );
    storage
        .write(&path, rows_to_csv(rows).as_bytes())
        .await
        .with_context(|| format!("Failed to write {}", path))?;
    println!("Wrote {} rows to {}", rows.len(), path);
    Ok(())
}

pub async fn export_pdf(app: &AppState, storage: &dyn Storage) -> Result<()> {
    let export = &app.config.export;
    let loader = HttpImageLoader::new(export.image_timeout_seconds)?;
    let renderer = SvgRenderer::new(export.fragment_width, export.pixel_ratio);
    let exporter = Exporter::new(app.api.as_ref(), &loader, &renderer, storage, &app.config);

    let outcome = exporter.export_all(&default_file_name()).await?;
    println!(
        "Exported {} blogs on {} pages to {}",
        outcome.posts, outcome.pages, outcome.path
    );
    if !outcome.degraded.is_empty() {
        println!(
            "{} blogs could not be loaded in full and were exported from their summary.",
            outcome.degraded.len()
        );
    }
    Ok(())
}
