use anyhow::Result;
use inquire::{Confirm, Editor, Select};

use super::{report, spinner};
use crate::core::state::AppState;
use crate::services::preview::PreviewEditor;

const EDIT: &str = "Edit markdown";
const CONTENTS: &str = "Table of contents";
const SAVE: &str = "Save";
const DONE: &str = "Back";

pub async fn run(app: &AppState, blog_id: Option<&str>) -> Result<()> {
    let pb = spinner("Loading blog...")?;
    let opened = PreviewEditor::open(app, blog_id).await;
    pb.finish_and_clear();
    let mut editor = opened?;
    if let Some(e) = editor.error.take() {
        eprintln!("Error: Failed to load blog. ({})", e);
    }

    let mut dirty = false;
    loop {
        println!("\n{}", editor.title());
        let cover = editor.cover_url();
        if !cover.is_empty() {
            println!("Cover: {}", cover);
        }

        let Some(action) = Select::new("Preview", vec![EDIT, CONTENTS, SAVE, DONE]).prompt_skippable()?
        else {
            break;
        };
        match action {
            EDIT => {
                let edited = Editor::new("Blog markdown:")
                    .with_predefined_text(editor.markdown())
                    .with_file_extension(".md")
                    .prompt()?;
                if edited != editor.markdown() {
                    editor.set_markdown(&edited);
                    dirty = true;
                    if let Err(e) = editor.sync_preview(&app.preview) {
                        report(&e);
                    }
                }
            }
            CONTENTS => {
                let toc = editor.table_of_contents();
                if toc.is_empty() {
                    println!("No sections yet.");
                }
                for (i, (_, label)) in toc.iter().enumerate() {
                    println!("  {}. {}", i + 1, label);
                }
            }
            SAVE => {
                let pb = spinner("Saving...")?;
                let result = editor.save(app.api.as_ref()).await;
                pb.finish_and_clear();
                match result {
                    Ok(()) => {
                        dirty = false;
                        println!("{}", editor.message.as_deref().unwrap_or("Saved."));
                    }
                    Err(e) => report(&e),
                }
            }
            _ => break,
        }
    }

    if dirty && Confirm::new("Save your changes before leaving?").with_default(true).prompt()? {
        editor.save(app.api.as_ref()).await?;
        println!("Saved.");
    }
    Ok(())
}
