mod auth;
mod dashboard;
mod gallery;
mod preview;
mod wizard;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Select;
use std::sync::Arc;
use std::time::Duration;

use crate::core::io::Storage;
use crate::core::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MainMenu {
    Dashboard,
    CreateBlog,
    Gallery,
    EditPreview,
    ExportPdf,
    Logout,
    Quit,
}

impl MainMenu {
    const ALL: [MainMenu; 7] = [
        MainMenu::Dashboard,
        MainMenu::CreateBlog,
        MainMenu::Gallery,
        MainMenu::EditPreview,
        MainMenu::ExportPdf,
        MainMenu::Logout,
        MainMenu::Quit,
    ];
}

impl std::fmt::Display for MainMenu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MainMenu::Dashboard => "Dashboard",
            MainMenu::CreateBlog => "Create blog",
            MainMenu::Gallery => "Gallery",
            MainMenu::EditPreview => "Edit last generated blog",
            MainMenu::ExportPdf => "Export all blogs to PDF",
            MainMenu::Logout => "Log out",
            MainMenu::Quit => "Quit",
        };
        f.write_str(label)
    }
}

pub(crate) fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    Ok(pb)
}

/// Errors from a user action are shown in place; the menu keeps running.
pub(crate) fn report(err: &anyhow::Error) {
    eprintln!("Error: {}", err);
}

pub async fn run(app: AppState, storage: Arc<dyn Storage>) -> Result<()> {
    if app.auth.current().is_none() && !auth::sign_in(&app).await? {
        return Ok(());
    }

    loop {
        let Some(choice) = Select::new("What would you like to do?", MainMenu::ALL.to_vec())
            .prompt_skippable()?
        else {
            return Ok(());
        };

        let result = match choice {
            MainMenu::Dashboard => dashboard::run(&app, storage.as_ref()).await,
            MainMenu::CreateBlog => wizard::run(&app).await,
            MainMenu::Gallery => gallery::browse(&app).await,
            MainMenu::EditPreview => preview::run(&app, None).await,
            MainMenu::ExportPdf => dashboard::export_pdf(&app, storage.as_ref()).await,
            MainMenu::Logout => {
                app.auth.logout().await?;
                println!("Logged out.");
                if !auth::sign_in(&app).await? {
                    return Ok(());
                }
                Ok(())
            }
            MainMenu::Quit => return Ok(()),
        };
        if let Err(e) = result {
            report(&e);
        }
    }
}
