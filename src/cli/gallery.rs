use anyhow::Result;
use inquire::{Select, Text};

use super::{report, spinner};
use crate::core::state::AppState;
use crate::services::gallery::{self, GalleryTab, ImageOptions, DEFAULT_PRIMARY_COLOR};
use crate::services::models::{AspectRatio, GalleryImage};
use crate::utils::html::absolutize;

const SWITCH: &str = "Switch tab";
const UPLOAD: &str = "Upload an image";
const GENERATE: &str = "Generate an image";
const REFRESH: &str = "Refresh";
const DONE: &str = "Back to menu";

fn print_images(app: &AppState, tab: GalleryTab, images: &[GalleryImage]) {
    println!("\n{} ({} images)", tab.label(), images.len());
    for image in images {
        let source = image.source.as_deref().unwrap_or("-");
        println!(
            "  {:<8} {}",
            source,
            absolutize(&image.image_url, &app.config.api.base_url)
        );
    }
    println!();
}

pub async fn browse(app: &AppState) -> Result<()> {
    let mut tab = GalleryTab::All;
    let mut images = gallery::list_images(app.api.as_ref(), tab).await?;

    loop {
        print_images(app, tab, &images);
        let Some(action) = Select::new("Gallery", vec![SWITCH, UPLOAD, GENERATE, REFRESH, DONE])
            .prompt_skippable()?
        else {
            return Ok(());
        };

        let result = match action {
            SWITCH => {
                if let Some(next) = Select::new("Show:", GalleryTab::ALL.to_vec()).prompt_skippable()? {
                    tab = next;
                }
                Ok(())
            }
            UPLOAD => {
                let path = Text::new("Image file:").prompt()?;
                let pb = spinner("Uploading...")?;
                let result = gallery::upload(app.api.as_ref(), std::path::Path::new(path.trim())).await;
                pb.finish_and_clear();
                result.map(|url| println!("Uploaded to {}", url))
            }
            GENERATE => generate(app).await,
            REFRESH => Ok(()),
            _ => return Ok(()),
        };
        if let Err(e) = result {
            report(&e);
        }

        match gallery::list_images(app.api.as_ref(), tab).await {
            Ok(items) => images = items,
            Err(e) => report(&e),
        }
    }
}

async fn generate(app: &AppState) -> Result<()> {
    let prompt = Text::new("Describe the image:").prompt()?;
    let aspect_ratio = Select::new("Aspect ratio:", AspectRatio::ALL.to_vec())
        .with_starting_cursor(1)
        .prompt()?;
    let primary_color = Text::new("Primary color:")
        .with_default(DEFAULT_PRIMARY_COLOR)
        .prompt()?;
    let options = ImageOptions {
        prompt,
        aspect_ratio,
        primary_color,
        ..Default::default()
    };

    let pb = spinner("Generating image...")?;
    let result = gallery::generate_image(app.api.as_ref(), &app.drafts, &options).await;
    pb.finish_and_clear();
    let image = result?;
    gallery::save_generated(app.api.as_ref(), &image).await?;
    println!("Saved {}", image.image_url);
    Ok(())
}
