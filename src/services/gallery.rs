use anyhow::{anyhow, Result};
use log::info;

use crate::core::state::{Draft, DraftStore};
use crate::services::api::BlogApi;
use crate::services::models::{
    AspectRatio, GalleryImage, GeneratedImage, ImageGenerateRequest, ImageQuality,
    ImageSaveRequest,
};

pub const GALLERY_LIMIT: u32 = 60;
pub const DEFAULT_PRIMARY_COLOR: &str = "#4443E4";
pub const GENERATED_SOURCE: &str = "nano";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GalleryTab {
    #[default]
    All,
    Uploads,
    Ai,
}

impl GalleryTab {
    pub const ALL: [GalleryTab; 3] = [GalleryTab::All, GalleryTab::Uploads, GalleryTab::Ai];

    pub fn source(self) -> Option<&'static str> {
        match self {
            GalleryTab::All => None,
            GalleryTab::Uploads => Some("upload"),
            GalleryTab::Ai => Some("ai"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GalleryTab::All => "All",
            GalleryTab::Uploads => "Uploads",
            GalleryTab::Ai => "AI Generated",
        }
    }
}

impl std::fmt::Display for GalleryTab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

pub async fn list_images(api: &dyn BlogApi, tab: GalleryTab) -> Result<Vec<GalleryImage>> {
    let page = api.list_images(GALLERY_LIMIT, tab.source()).await?;
    Ok(page.items)
}

pub async fn upload_bytes(api: &dyn BlogApi, file_name: &str, bytes: Vec<u8>) -> Result<String> {
    if bytes.is_empty() {
        return Err(anyhow!("{} is empty", file_name));
    }
    let url = api.upload_image(file_name, bytes).await?;
    info!("Uploaded {} to {}", file_name, url);
    Ok(url)
}

/// Reads a local file and uploads it. Returns the stored image URL.
#[cfg(not(target_arch = "wasm32"))]
pub async fn upload(api: &dyn BlogApi, path: &std::path::Path) -> Result<String> {
    use anyhow::Context;

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    upload_bytes(api, &file_name, bytes).await
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageOptions {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub quality: ImageQuality,
    pub primary_color: String,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            aspect_ratio: AspectRatio::default(),
            quality: ImageQuality::default(),
            primary_color: DEFAULT_PRIMARY_COLOR.to_string(),
        }
    }
}

pub fn image_request(draft: &Draft, options: &ImageOptions) -> ImageGenerateRequest {
    let primary_color = if options.primary_color.trim().is_empty() {
        DEFAULT_PRIMARY_COLOR.to_string()
    } else {
        options.primary_color.trim().to_string()
    };
    ImageGenerateRequest {
        tone: draft.tone_or_default().to_string(),
        creativity: draft.creativity_or_default().to_string(),
        focus_or_niche: draft.niche().to_string(),
        targeted_keyword: Draft::text(&draft.targeted_keyword).to_string(),
        selected_idea: draft.idea().to_string(),
        title: Draft::text(&draft.title).to_string(),
        prompt: options.prompt.trim().to_string(),
        aspect_ratio: options.aspect_ratio,
        quality: options.quality,
        primary_color,
    }
}

/// Generates an image from the prompt and the draft's context. The prompt is
/// remembered in the draft.
pub async fn generate_image(
    api: &dyn BlogApi,
    drafts: &DraftStore,
    options: &ImageOptions,
) -> Result<GeneratedImage> {
    if options.prompt.trim().is_empty() {
        return Err(anyhow!("Please enter an image prompt."));
    }
    let req = image_request(&drafts.load(), options);
    drafts.save(Draft {
        image_prompt: Some(req.prompt.clone()),
        ..Default::default()
    });

    let image = api
        .generate_image(&req)
        .await
        .map_err(|e| e.for_action("Failed to generate image."))?;
    if image.image_url.is_empty() {
        return Err(anyhow!("Failed to generate image."));
    }
    Ok(image)
}

pub async fn save_generated(api: &dyn BlogApi, image: &GeneratedImage) -> Result<()> {
    api.save_image(&ImageSaveRequest {
        image_url: image.image_url.clone(),
        meta: image.meta.clone(),
        source: GENERATED_SOURCE.to_string(),
    })
    .await?;
    Ok(())
}

/// Candidate cover images for the post with one kept selected. The selection
/// is written to the draft on every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverPicker {
    images: Vec<String>,
    selected: String,
}

impl CoverPicker {
    pub fn restore(draft: &Draft, images: Vec<String>) -> Self {
        let mut picker = Self {
            images,
            selected: Draft::text(&draft.cover_image_url).to_string(),
        };
        if !picker.selected.is_empty() && !picker.images.contains(&picker.selected) {
            picker.images.insert(0, picker.selected.clone());
        }
        picker
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn selected(&self) -> Option<&str> {
        Some(self.selected.as_str()).filter(|s| !s.is_empty())
    }

    fn sync(&mut self, drafts: &DraftStore) {
        if self.images.is_empty() {
            self.selected.clear();
        } else if self.selected.is_empty() || !self.images.contains(&self.selected) {
            self.selected = self.images[0].clone();
        }
        drafts.save(Draft {
            cover_image_url: Some(self.selected.clone()),
            ..Default::default()
        });
    }

    pub fn set_images(&mut self, images: Vec<String>, drafts: &DraftStore) {
        self.images = images;
        self.sync(drafts);
    }

    /// New images go first and become the selection.
    pub fn add(&mut self, url: &str, drafts: &DraftStore) {
        self.images.retain(|u| u != url);
        self.images.insert(0, url.to_string());
        self.selected = url.to_string();
        self.sync(drafts);
    }

    pub fn remove(&mut self, url: &str, drafts: &DraftStore) {
        self.images.retain(|u| u != url);
        if self.selected == url {
            self.selected.clear();
        }
        self.sync(drafts);
    }

    pub fn select(&mut self, url: &str, drafts: &DraftStore) -> Result<()> {
        if !self.images.iter().any(|u| u == url) {
            return Err(anyhow!("Image is not in the gallery"));
        }
        self.selected = url.to_string();
        self.sync(drafts);
        Ok(())
    }
}
