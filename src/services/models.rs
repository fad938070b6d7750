use serde::{Deserialize, Serialize};
use serde_json::Value;

// --- Auth ---

#[derive(Debug, Serialize, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuthToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub user: Option<User>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

// --- Blogs ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BlogStatus {
    #[default]
    Saved,
    Draft,
    Pending,
    Published,
    Rejected,
    #[serde(other)]
    Unknown,
}

impl BlogStatus {
    pub fn label(&self) -> &'static str {
        match self {
            BlogStatus::Saved => "Saved",
            BlogStatus::Draft => "Draft",
            BlogStatus::Pending => "Pending",
            BlogStatus::Published => "Published",
            BlogStatus::Rejected => "Rejected",
            BlogStatus::Unknown => "Unknown",
        }
    }
}

/// Listing projection of a persisted post. No body.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BlogSummary {
    pub id: String,
    pub title: String,
    pub language: String,
    pub tone: String,
    pub creativity: String,
    pub created_by: String,
    pub created_at: Option<String>,
    pub status: BlogStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BlogPage {
    pub items: Vec<BlogSummary>,
    pub page: u32,
    pub limit: u32,
    pub total: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BlogMeta {
    pub language: String,
    pub tone: String,
    pub creativity: String,
    pub focus_or_niche: String,
    pub targeted_keyword: String,
    pub targeted_audience: String,
    pub reference_links: String,
    pub selected_idea: String,
    pub title: String,
    pub intro_md: String,
    pub outline: Vec<String>,
    pub image_prompt: String,
    pub cover_image_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BlogSection {
    pub heading: String,
    pub body_md: String,
    pub bullets: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BlogRender {
    pub title: String,
    pub cover_image_url: String,
    pub intro_md: String,
    pub sections: Vec<BlogSection>,
    pub conclusion_md: String,
    pub references: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct FinalBlog {
    pub render: BlogRender,
    pub markdown: String,
    pub html: String,
}

/// The full persisted post.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BlogRecord {
    pub id: String,
    pub owner_id: String,
    pub owner_name: String,
    pub status: BlogStatus,
    pub meta: BlogMeta,
    pub final_blog: FinalBlog,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub published_at: Option<String>,
}

impl BlogRecord {
    pub fn title(&self) -> &str {
        if !self.meta.title.is_empty() {
            &self.meta.title
        } else {
            &self.final_blog.render.title
        }
    }

    pub fn cover_url(&self) -> &str {
        if !self.meta.cover_image_url.is_empty() {
            &self.meta.cover_image_url
        } else {
            &self.final_blog.render.cover_image_url
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct BlogCreateRequest {
    pub meta: BlogMeta,
    pub final_blog: FinalBlog,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SavedBlog {
    pub blog_id: String,
    pub status: Option<BlogStatus>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BlogStats {
    pub total_blogs: u64,
    pub saved_blogs: u64,
    pub pending_blogs: u64,
    pub published_blogs: u64,
    pub generated_images: u64,
}

// --- AI generation ---

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct TopicIdeasRequest {
    pub focus_or_niche: String,
    pub targeted_keyword: String,
    pub targeted_audience: String,
    pub reference_links: String,
    pub tone: String,
    pub creativity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

/// Shared request body for the title, intro and outline generators. Upstream
/// values are only sent once they exist.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct GenerationContext {
    pub tone: String,
    pub creativity: String,
    pub focus_or_niche: String,
    pub targeted_keyword: String,
    pub targeted_audience: String,
    pub reference_links: String,
    pub selected_idea: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro_md: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct OptionsResponse {
    pub options: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct OutlineOption {
    pub outline: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct OutlineOptionsResponse {
    pub options: Vec<OutlineOption>,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct GenerateBlogRequest {
    pub tone: String,
    pub creativity: String,
    pub focus_or_niche: String,
    pub targeted_keyword: String,
    pub targeted_audience: String,
    pub reference_links: String,
    pub selected_idea: String,
    pub title: String,
    pub intro_md: String,
    pub outline: Vec<String>,
    pub cover_image_url: String,
}

// --- Images ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[default]
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "16:9")]
    Wide,
    #[serde(rename = "9:16")]
    Tall,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Landscape,
        AspectRatio::Portrait,
        AspectRatio::Wide,
        AspectRatio::Tall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Wide => "16:9",
            AspectRatio::Tall => "9:16",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    Low,
    Medium,
    #[default]
    High,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct ImageGenerateRequest {
    pub tone: String,
    pub creativity: String,
    pub focus_or_niche: String,
    pub targeted_keyword: String,
    pub selected_idea: String,
    pub title: String,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub quality: ImageQuality,
    pub primary_color: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct GeneratedImage {
    pub image_url: String,
    #[serde(default)]
    pub meta: Value,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ImageSaveRequest {
    pub image_url: String,
    pub meta: Value,
    pub source: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct GalleryImage {
    pub id: String,
    pub image_url: String,
    pub meta: Value,
    pub source: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ImagePage {
    pub items: Vec<GalleryImage>,
    pub total: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct UploadedImage {
    pub image_url: String,
}
