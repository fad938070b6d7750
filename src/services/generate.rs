use anyhow::{anyhow, Context, Result};
use log::info;

use crate::core::state::{AppState, Draft, PreviewPayload, DEFAULT_LANGUAGE};
use crate::services::api::BlogApi;
use crate::services::editor::generation_context;
use crate::services::models::{
    BlogCreateRequest, BlogMeta, FinalBlog, GenerateBlogRequest, TopicIdeasRequest,
};
use crate::services::wizard::WizardStep;

pub const LANGUAGES: [&str; 1] = [DEFAULT_LANGUAGE];
pub const TONES: [&str; 3] = ["Formal", "Casual", "Friendly"];
pub const CREATIVITY_LEVELS: [&str; 3] = ["Regular", "High", "Low"];
pub const DEFAULT_IDEA_COUNT: usize = 5;

/// Inputs of the details step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlogDetails {
    pub language: String,
    pub tone: String,
    pub creativity: String,
    pub about: String,
    pub keyword: String,
    pub audience: String,
    pub references: String,
}

impl BlogDetails {
    pub fn from_draft(draft: &Draft) -> Self {
        Self {
            language: draft.language_or_default().to_string(),
            tone: draft.tone_or_default().to_string(),
            creativity: draft.creativity_or_default().to_string(),
            about: draft.idea().to_string(),
            keyword: Draft::text(&draft.targeted_keyword).to_string(),
            audience: Draft::text(&draft.targeted_audience).to_string(),
            references: Draft::text(&draft.reference_links).to_string(),
        }
    }

    pub fn ideas_request(&self, focus: &str, count: Option<usize>) -> TopicIdeasRequest {
        TopicIdeasRequest {
            focus_or_niche: focus.to_string(),
            targeted_keyword: self.keyword.clone(),
            targeted_audience: self.audience.clone(),
            reference_links: self.references.clone(),
            tone: self.tone.clone(),
            creativity: self.creativity.clone(),
            count,
        }
    }
}

/// Draft patch written by the details step. The "about" text fills both the
/// niche and the selected idea.
pub fn details_patch(details: &BlogDetails) -> Draft {
    let or_default = |value: &str, default: &str| {
        if value.trim().is_empty() {
            default.to_string()
        } else {
            value.to_string()
        }
    };
    Draft {
        language: Some(or_default(&details.language, DEFAULT_LANGUAGE)),
        tone: Some(or_default(&details.tone, TONES[0])),
        creativity: Some(or_default(&details.creativity, CREATIVITY_LEVELS[0])),
        focus_or_niche: Some(details.about.clone()),
        selected_idea: Some(details.about.clone()),
        targeted_keyword: Some(details.keyword.clone()),
        targeted_audience: Some(details.audience.clone()),
        reference_links: Some(details.references.clone()),
        ..Default::default()
    }
}

pub async fn suggest_topics(api: &dyn BlogApi, request: &TopicIdeasRequest) -> Result<Vec<String>> {
    if request.focus_or_niche.trim().is_empty() {
        return Err(anyhow!("Please describe what the blog is about first."));
    }
    let mut options = api
        .topic_ideas(request)
        .await
        .map_err(|e| e.for_action("Failed to generate topic ideas."))?;
    if let Some(count) = request.count {
        options.truncate(count);
    }
    Ok(options)
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutlineItem {
    Line(String),
    Nested(Vec<String>),
}

/// Entries holding several lines render as a nested list under the outline.
pub fn outline_items(outline: &[String]) -> Vec<OutlineItem> {
    outline
        .iter()
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| {
            let lines: Vec<String> = entry
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect();
            if lines.len() > 1 {
                OutlineItem::Nested(lines)
            } else {
                OutlineItem::Line(entry.trim().to_string())
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSection {
    pub heading: &'static str,
    /// Step to jump back to when the user edits this section.
    pub step: WizardStep,
    pub fields: Vec<(&'static str, String)>,
    pub outline: Vec<OutlineItem>,
}

impl ReviewSection {
    fn new(heading: &'static str, step: WizardStep) -> Self {
        Self {
            heading,
            step,
            fields: Vec::new(),
            outline: Vec::new(),
        }
    }

    fn field(mut self, label: &'static str, value: &str) -> Self {
        self.fields.push((label, value.to_string()));
        self
    }

    pub fn render_text(&self) -> String {
        let mut out = format!("{}\n", self.heading);
        for (label, value) in &self.fields {
            let value = if value.trim().is_empty() { "-" } else { value };
            out.push_str(&format!("  {}: {}\n", label, value));
        }
        for item in &self.outline {
            match item {
                OutlineItem::Line(line) => out.push_str(&format!("  • {}\n", line)),
                OutlineItem::Nested(lines) => {
                    for line in lines {
                        out.push_str(&format!("      ◦ {}\n", line));
                    }
                }
            }
        }
        out
    }
}

/// What the review screen shows, grouped the way the wizard collected it.
pub fn review_summary(draft: &Draft) -> Vec<ReviewSection> {
    vec![
        ReviewSection::new("Blog Details", WizardStep::Details)
            .field("Language", draft.language_or_default())
            .field("Tone", draft.tone_or_default())
            .field("Creativity", draft.creativity_or_default())
            .field("About", draft.idea())
            .field("Keywords", Draft::text(&draft.targeted_keyword))
            .field("Audience", Draft::text(&draft.targeted_audience))
            .field("References", Draft::text(&draft.reference_links)),
        ReviewSection::new("Blog Title", WizardStep::Title).field("Title", Draft::text(&draft.title)),
        ReviewSection::new("Blog Introduction", WizardStep::Intro)
            .field("Introduction", Draft::text(&draft.intro_md)),
        ReviewSection {
            outline: outline_items(draft.outline.as_deref().unwrap_or_default()),
            ..ReviewSection::new("Blog Outlined", WizardStep::Outline)
        },
        ReviewSection::new("Header Image", WizardStep::Image)
            .field("Cover image", Draft::text(&draft.cover_image_url)),
    ]
}

/// Payload for the final generation. Only resolved values are sent, never the
/// editors' candidate lists.
pub fn build_generate_request(draft: &Draft) -> Result<GenerateBlogRequest> {
    let ctx = generation_context(draft);
    if ctx.selected_idea.is_empty() {
        return Err(anyhow!("Please complete blog details first."));
    }
    let title = Draft::text(&draft.title).trim().to_string();
    if title.is_empty() {
        return Err(anyhow!("Please choose a blog title first."));
    }
    let intro_md = Draft::text(&draft.intro_md).to_string();
    if intro_md.trim().is_empty() {
        return Err(anyhow!("Please choose an introduction first."));
    }
    let outline: Vec<String> = draft
        .outline
        .clone()
        .unwrap_or_default()
        .into_iter()
        .filter(|l| !l.trim().is_empty())
        .collect();
    if outline.is_empty() {
        return Err(anyhow!("Please choose an outline first."));
    }

    Ok(GenerateBlogRequest {
        tone: ctx.tone,
        creativity: ctx.creativity,
        focus_or_niche: ctx.focus_or_niche,
        targeted_keyword: ctx.targeted_keyword,
        targeted_audience: ctx.targeted_audience,
        reference_links: ctx.reference_links,
        selected_idea: ctx.selected_idea,
        title,
        intro_md,
        outline,
        cover_image_url: Draft::text(&draft.cover_image_url).to_string(),
    })
}

pub fn blog_meta(draft: &Draft, req: &GenerateBlogRequest) -> BlogMeta {
    BlogMeta {
        language: draft.language_or_default().to_string(),
        tone: req.tone.clone(),
        creativity: req.creativity.clone(),
        focus_or_niche: req.focus_or_niche.clone(),
        targeted_keyword: req.targeted_keyword.clone(),
        targeted_audience: req.targeted_audience.clone(),
        reference_links: req.reference_links.clone(),
        selected_idea: req.selected_idea.clone(),
        title: req.title.clone(),
        intro_md: req.intro_md.clone(),
        outline: req.outline.clone(),
        image_prompt: Draft::text(&draft.image_prompt).to_string(),
        cover_image_url: req.cover_image_url.clone(),
    }
}

fn preview_of(blog_id: &str, req: &GenerateBlogRequest, blog: &FinalBlog) -> PreviewPayload {
    let title = if blog.render.title.trim().is_empty() {
        req.title.clone()
    } else {
        blog.render.title.clone()
    };
    let hero_url = if blog.render.cover_image_url.trim().is_empty() {
        req.cover_image_url.clone()
    } else {
        blog.render.cover_image_url.clone()
    };
    PreviewPayload {
        title,
        hero_url,
        html: blog.html.clone(),
        blog_id: Some(blog_id.to_string()),
    }
}

/// Generates the post body from the draft, persists it, remembers its id and
/// hands it to the preview slot. Returns the saved id.
pub async fn generate_and_save(app: &AppState) -> Result<String> {
    let draft = app.drafts.load();
    let req = build_generate_request(&draft)?;

    info!("Generating blog '{}'", req.title);
    let final_blog = app
        .api
        .generate_blog(&req)
        .await
        .map_err(|e| e.for_action("Failed to generate blog."))?;

    let create = BlogCreateRequest {
        meta: blog_meta(&draft, &req),
        final_blog,
    };
    let saved = app
        .api
        .save_blog(&create)
        .await
        .map_err(|e| e.for_action("Failed to save blog."))?;
    if saved.blog_id.is_empty() {
        return Err(anyhow!("Failed to save blog."));
    }

    app.auth
        .set_last_blog_id(&saved.blog_id)
        .await
        .context("Failed to remember the generated blog")?;
    app.preview
        .set(preview_of(&saved.blog_id, &req, &create.final_blog));

    info!("Saved blog {}", saved.blog_id);
    Ok(saved.blog_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::io::{NativeStorage, Storage};
    use crate::core::state::EditorMode;
    use crate::services::api::AuthStore;
    use crate::services::models::BlogRender;
    use crate::services::testing::MockApi;
    use std::sync::Arc;

    fn full_draft() -> Draft {
        Draft {
            focus_or_niche: Some("AI in healthcare".into()),
            selected_idea: Some("AI in healthcare".into()),
            targeted_keyword: Some("ai".into()),
            title: Some("AI for students".into()),
            title_mode: Some(EditorMode::Ai),
            title_options: Some(vec!["AI for students".into(), "Other".into()]),
            title_selected_idx: Some(0),
            intro_md: Some("Hello".into()),
            outline: Some(vec!["One".into(), "".into(), "Two".into()]),
            outline_options: Some(vec![vec!["One".into(), "Two".into()]]),
            cover_image_url: Some("/media/c.png".into()),
            ..Default::default()
        }
    }

    fn app_with(api: Arc<MockApi>, dir: &tempfile::TempDir) -> AppState {
        let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new());
        let auth = Arc::new(AuthStore::new(storage, dir.path().to_str().unwrap()));
        AppState::new(Config::default(), api, auth)
    }

    #[test]
    fn test_details_patch_fills_niche_and_idea() {
        let patch = details_patch(&BlogDetails {
            about: "Gardening".into(),
            ..Default::default()
        });
        assert_eq!(patch.language.as_deref(), Some("English"));
        assert_eq!(patch.tone.as_deref(), Some("Formal"));
        assert_eq!(patch.creativity.as_deref(), Some("Regular"));
        assert_eq!(patch.focus_or_niche.as_deref(), Some("Gardening"));
        assert_eq!(patch.selected_idea.as_deref(), Some("Gardening"));

        let back = BlogDetails::from_draft(&patch);
        assert_eq!(back.about, "Gardening");
    }

    #[tokio::test]
    async fn test_suggest_topics_truncates_to_count() {
        let api = MockApi::new();
        api.set_options(&["a", "b", "c", "d"]);
        let details = BlogDetails {
            about: "x".into(),
            tone: "Casual".into(),
            ..Default::default()
        };
        let ideas = suggest_topics(&api, &details.ideas_request("Rust", Some(2)))
            .await
            .unwrap();
        assert_eq!(ideas, vec!["a", "b"]);

        let err = suggest_topics(&api, &details.ideas_request(" ", None))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please describe what the blog is about first.");
    }

    #[test]
    fn test_generate_request_contains_resolved_fields_only() {
        let req = build_generate_request(&full_draft()).unwrap();
        assert_eq!(req.tone, "Formal");
        assert_eq!(req.creativity, "Regular");
        assert_eq!(req.title, "AI for students");
        assert_eq!(req.outline, vec!["One", "Two"]);

        let json = serde_json::to_value(&req).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("title_options"));
        assert!(!obj.contains_key("outline_options"));
        assert!(!obj.contains_key("title_mode"));
        assert!(obj.contains_key("selected_idea"));
    }

    #[test]
    fn test_generate_request_requires_each_field() {
        let mut draft = full_draft();
        draft.intro_md = Some("  ".into());
        assert_eq!(
            build_generate_request(&draft).unwrap_err().to_string(),
            "Please choose an introduction first."
        );
        assert!(build_generate_request(&Draft::default()).is_err());
    }

    #[test]
    fn test_review_summary_outline_nesting() {
        let mut draft = full_draft();
        draft.outline = Some(vec!["Applications".into(), "Healthcare\nFinance".into()]);
        let sections = review_summary(&draft);
        let outline = &sections[3];
        assert_eq!(outline.step, WizardStep::Outline);
        assert_eq!(
            outline.outline,
            vec![
                OutlineItem::Line("Applications".into()),
                OutlineItem::Nested(vec!["Healthcare".into(), "Finance".into()]),
            ]
        );
        let text = sections[0].render_text();
        assert!(text.contains("Audience: -"));
        assert!(text.contains("Tone: Formal"));
    }

    #[tokio::test]
    async fn test_generate_and_save_flow() {
        let api = Arc::new(MockApi::new());
        *api.final_blog.lock().unwrap() = FinalBlog {
            render: BlogRender {
                title: "Rendered".into(),
                ..Default::default()
            },
            markdown: "# Rendered".into(),
            html: "<h1>Rendered</h1>".into(),
        };
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(api.clone(), &dir);
        app.drafts.save(full_draft());

        let id = generate_and_save(&app).await.unwrap();
        assert_eq!(id, "new-blog");

        let saved = api.saved.lock().unwrap();
        assert_eq!(saved[0].meta.title, "AI for students");
        assert_eq!(saved[0].meta.language, "English");
        assert_eq!(saved[0].final_blog.html, "<h1>Rendered</h1>");

        let preview = app.preview.get().unwrap();
        assert_eq!(preview.title, "Rendered");
        assert_eq!(preview.hero_url, "/media/c.png");
        assert_eq!(preview.blog_id.as_deref(), Some("new-blog"));
        assert_eq!(app.auth.last_blog_id().await.unwrap().as_deref(), Some("new-blog"));
    }

    #[tokio::test]
    async fn test_generate_sends_resolved_fields_with_defaults() {
        let api = Arc::new(MockApi::new());
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(api.clone(), &dir);
        app.drafts.save(Draft {
            selected_idea: Some("AI".into()),
            title: Some("T".into()),
            intro_md: Some("I".into()),
            outline: Some(vec!["a".into(), "b".into()]),
            ..Default::default()
        });

        generate_and_save(&app).await.unwrap();

        let sent = api.generate_requests.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            GenerateBlogRequest {
                tone: "Formal".into(),
                creativity: "Regular".into(),
                focus_or_niche: "AI".into(),
                selected_idea: "AI".into(),
                title: "T".into(),
                intro_md: "I".into(),
                outline: vec!["a".into(), "b".into()],
                ..Default::default()
            }
        );
        assert_eq!(
            api.calls().iter().filter(|c| *c == "generate_blog").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_generate_and_save_validates_before_network() {
        let api = Arc::new(MockApi::new());
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(api.clone(), &dir);
        assert!(generate_and_save(&app).await.is_err());
        assert!(api.calls().is_empty());
    }
}
