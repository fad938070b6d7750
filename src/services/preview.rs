use anyhow::{anyhow, Result};
use log::{info, warn};
use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::core::state::{AppState, PreviewPayload, PreviewStore};
use crate::services::api::BlogApi;
use crate::services::models::{BlogCreateRequest, BlogRecord};
use crate::utils::html::pattern;

const STARTER: &str = "# Start writing your blog\n\nWrite an introduction here.\n\n## Example section\n\n- Bullet one\n- Bullet two";
// how far into the document a cover image is looked for
const COVER_SCAN_CHARS: usize = 1200;

pattern!(cover_md, r#"(?i)!\[([^\]]*)\]\(([^)\s]+)(?:\s+"[^"]*")?\)"#);
pattern!(img_src, r#"(?i)<img[^>]+src=["']([^"']+)["'][^>]*>"#);
pattern!(img_line, r"(?i)^<img\b[^>]*>\s*$");
pattern!(img_paragraph, r"(?i)^<p>\s*(<img\b[^>]*>)\s*</p>\s*$");
pattern!(linked_image, r#"\[!\[([^\]]*)\]\(([^)\s]+(?:\s+"[^"]*")?)\)\]"#);
pattern!(spaced_image, r#"!\[([^\]]*)\]\s*\(([^)\s]+(?:\s+"[^"]*")?)\)"#);
pattern!(width_attr, r#"\bwidth\s*=\s*["']"#);
pattern!(heading, r"(?m)^#{1,6}\s+(.+?)\s*$");
pattern!(h2_with_id, r#"(?is)<h2\b[^>]*\bid\s*=\s*["']([^"']+)["'][^>]*>(.*?)</h2\s*>"#);
pattern!(any_tag, r"(?s)<[^>]+>");
pattern!(h2_markdown, r"(?m)^##\s+(.+?)\s*#*\s*$");

/// Unwraps linked images and closes the gap in `![alt] (url)`.
pub fn normalize_cover_syntax(content: &str) -> String {
    let unlinked = linked_image().replace_all(content, |caps: &Captures| {
        let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
        if content[end..].trim_start().starts_with('(') {
            caps[0].to_string()
        } else {
            format!("![{}]({})", &caps[1], &caps[2])
        }
    });
    spaced_image()
        .replace_all(&unlinked, "![$1]($2)")
        .into_owned()
}

fn with_full_width(tag: &str) -> String {
    if !tag.to_ascii_lowercase().starts_with("<img") || width_attr().is_match(tag) {
        return tag.to_string();
    }
    if let Some(head) = tag.strip_suffix("/>") {
        format!("{} width=\"100%\" />", head.trim_end())
    } else if let Some(head) = tag.strip_suffix('>') {
        format!("{} width=\"100%\">", head.trim_end())
    } else {
        format!("{} width=\"100%\"", tag)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cover {
    /// The `<img>` line as it sits in the document.
    pub line: String,
    pub url: String,
}

fn first_content_line(lines: &[&str]) -> usize {
    let mut idx = 0;
    while idx < lines.len() && lines[idx].trim().is_empty() {
        idx += 1;
    }
    if idx < lines.len() && lines[idx].trim().starts_with('#') {
        idx += 1;
        while idx < lines.len() && lines[idx].trim().is_empty() {
            idx += 1;
        }
    }
    idx
}

/// Pulls a leading cover image, which may follow a `#` heading, out of the
/// document. Returns the cover and the remaining body.
pub fn extract_cover(markdown: &str) -> (Option<Cover>, String) {
    let normalized = normalize_cover_syntax(markdown);
    let mut lines: Vec<&str> = normalized.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)).collect();
    let idx = first_content_line(&lines);
    if idx >= lines.len() {
        return (None, lines.join("\n"));
    }

    let raw = lines[idx].trim();
    let cover = if let Some(caps) = img_paragraph().captures(raw) {
        let tag = caps[1].to_string();
        img_src().captures(&tag).map(|c| Cover {
            url: c[1].to_string(),
            line: with_full_width(&tag),
        })
    } else if img_line().is_match(raw) {
        img_src().captures(raw).map(|c| Cover {
            url: c[1].to_string(),
            line: with_full_width(raw),
        })
    } else {
        cover_md()
            .captures(raw)
            .filter(|_| cover_md().replace(raw, "").trim().is_empty())
            .map(|c| {
                let alt = if c[1].is_empty() { "Cover" } else { &c[1] };
                Cover {
                    url: c[2].to_string(),
                    line: format!("<img src=\"{}\" alt=\"{}\" width=\"100%\" />", &c[2], alt),
                }
            })
    };

    if cover.is_some() {
        lines.remove(idx);
        if lines.get(idx).is_some_and(|l| l.is_empty()) {
            lines.remove(idx);
        }
    }
    (cover, lines.join("\n"))
}

/// Puts the cover line back below the leading heading, or at the top.
pub fn insert_cover(body: &str, cover_line: &str) -> String {
    if cover_line.is_empty() {
        return body.to_string();
    }
    let mut lines: Vec<&str> = body.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)).collect();
    let mut idx = 0;
    while idx < lines.len() && lines[idx].trim().is_empty() {
        idx += 1;
    }
    if idx < lines.len() && lines[idx].trim().starts_with('#') {
        let mut after: Vec<&str> = lines.split_off(idx + 1);
        while after.first().is_some_and(|l| l.trim().is_empty()) {
            after.remove(0);
        }
        lines.push(cover_line);
        lines.push("");
        lines.extend(after);
        return lines.join("\n");
    }
    while lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    let mut out = vec![cover_line, ""];
    out.extend(lines);
    out.join("\n")
}

/// Document to edit, with the cover line normalized to a full-width `<img>`.
/// `hero_url` is used when the content has no cover of its own.
pub fn editable_markdown(content: &str, hero_url: &str) -> (String, String) {
    let (cover, body) = extract_cover(content);
    let (line, url) = match cover {
        Some(c) => (c.line, c.url),
        None if !hero_url.trim().is_empty() => (
            format!("<img src=\"{}\" alt=\"Cover\" width=\"100%\" />", hero_url),
            hero_url.to_string(),
        ),
        None => return (content.to_string(), String::new()),
    };
    (insert_cover(&body, &line), url)
}

/// Cover URL near the top of the document: an `<img>` tag first, then a
/// markdown image.
pub fn find_cover_url(markdown: &str) -> Option<String> {
    let head: String = markdown.chars().take(COVER_SCAN_CHARS).collect();
    img_src()
        .captures(&head)
        .map(|c| c[1].to_string())
        .or_else(|| cover_md().captures(&head).map(|c| c[2].to_string()))
}

pub fn extract_title(markdown: &str) -> Option<String> {
    heading()
        .captures(markdown)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

/// `(id, label)` for every `<h2>` that carries an id.
pub fn table_of_contents(html: &str) -> Vec<(String, String)> {
    h2_with_id()
        .captures_iter(html)
        .map(|c| {
            let label = any_tag().replace_all(&c[2], "");
            (c[1].to_string(), label.trim().to_string())
        })
        .filter(|(_, label)| !label.is_empty())
        .collect()
}

/// Anchor id for a heading: lowercase words joined by `-`.
pub fn heading_slug(label: &str) -> String {
    label
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// `(id, label)` for every `## ` heading of a markdown document.
pub fn markdown_contents(markdown: &str) -> Vec<(String, String)> {
    h2_markdown()
        .captures_iter(markdown)
        .map(|c| {
            let label = c[1].trim().to_string();
            (heading_slug(&label), label)
        })
        .filter(|(_, label)| !label.is_empty())
        .collect()
}

pub fn render_html(markdown: &str) -> Result<String> {
    let options = markdown::Options {
        compile: markdown::CompileOptions {
            allow_dangerous_html: true,
            ..markdown::CompileOptions::gfm()
        },
        ..markdown::Options::gfm()
    };
    markdown::to_html_with_options(markdown, &options).map_err(|e| anyhow!("{}", e))
}

/// Editable markdown view of a generated post.
#[derive(Debug, Clone, Default)]
pub struct PreviewEditor {
    blog_id: Option<String>,
    record: Option<BlogRecord>,
    markdown: String,
    fallback_title: String,
    fallback_cover: String,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl PreviewEditor {
    /// Opens `blog_id`, or whatever the preview slot or the last generation
    /// points at. A record that fails to load leaves an error but still opens
    /// the preview content.
    pub async fn open(app: &AppState, blog_id: Option<&str>) -> Result<Self> {
        let preview = app.preview.get();
        let blog_id = match blog_id {
            Some(id) => Some(id.to_string()),
            None => match preview.as_ref().and_then(|p| p.blog_id.clone()) {
                Some(id) => Some(id),
                None => app.auth.last_blog_id().await?,
            },
        };

        let mut editor = Self {
            blog_id: blog_id.clone(),
            ..Default::default()
        };
        if let Some(id) = &blog_id {
            match app.api.get_blog(id).await {
                Ok(record) => editor.record = Some(record),
                Err(e) => {
                    warn!("Failed to load blog {}: {}", id, e);
                    editor.error = Some(e.to_string());
                }
            }
        }

        let (content, hero, title) = match (&editor.record, &preview) {
            (Some(r), _) if !r.final_blog.markdown.trim().is_empty() => (
                r.final_blog.markdown.clone(),
                r.cover_url().to_string(),
                r.title().to_string(),
            ),
            (_, Some(p)) if !p.html.trim().is_empty() => (
                html2text::from_read(p.html.as_bytes(), 100).unwrap_or_default(),
                p.hero_url.clone(),
                p.title.clone(),
            ),
            (Some(r), _) => (STARTER.to_string(), r.cover_url().to_string(), r.title().to_string()),
            (None, _) => (STARTER.to_string(), String::new(), String::new()),
        };

        let (markdown, cover) = editable_markdown(&content, &hero);
        editor.markdown = markdown;
        editor.fallback_cover = cover;
        editor.fallback_title = title;
        Ok(editor)
    }

    pub fn blog_id(&self) -> Option<&str> {
        self.blog_id.as_deref()
    }

    pub fn markdown(&self) -> &str {
        &self.markdown
    }

    pub fn set_markdown(&mut self, markdown: &str) {
        self.markdown = markdown.to_string();
        self.message = None;
    }

    fn normalized(&self) -> String {
        normalize_cover_syntax(&self.markdown)
    }

    pub fn html(&self) -> Result<String> {
        render_html(&self.normalized())
    }

    pub fn cover_url(&self) -> String {
        find_cover_url(&self.normalized()).unwrap_or_else(|| self.fallback_cover.clone())
    }

    pub fn title(&self) -> String {
        extract_title(&self.normalized())
            .or_else(|| {
                self.record
                    .as_ref()
                    .map(|r| r.title().to_string())
                    .filter(|t| !t.is_empty())
            })
            .unwrap_or_else(|| self.fallback_title.clone())
    }

    /// Sections from anchored `<h2>` tags, or from the markdown headings when
    /// the rendered HTML carries no anchors.
    pub fn table_of_contents(&self) -> Vec<(String, String)> {
        let anchored = self.html().map(|h| table_of_contents(&h)).unwrap_or_default();
        if anchored.is_empty() {
            markdown_contents(&self.markdown)
        } else {
            anchored
        }
    }

    /// Mirrors the current edit into the preview slot.
    pub fn sync_preview(&self, store: &PreviewStore) -> Result<PreviewPayload> {
        Ok(store.set(PreviewPayload {
            title: self.title(),
            hero_url: self.cover_url(),
            html: self.html()?,
            blog_id: self.blog_id.clone(),
        }))
    }

    /// Writes the edited document, its HTML, title and cover back to the post.
    pub async fn save(&mut self, api: &dyn BlogApi) -> Result<()> {
        let result = self.try_save(api).await;
        match &result {
            Ok(()) => {
                self.error = None;
                self.message = Some("Saved.".to_string());
            }
            Err(e) => {
                self.message = None;
                self.error = Some(e.to_string());
            }
        }
        result
    }

    async fn try_save(&mut self, api: &dyn BlogApi) -> Result<()> {
        let id = self
            .blog_id
            .clone()
            .ok_or_else(|| anyhow!("No blog selected to save."))?;
        let record = self
            .record
            .as_ref()
            .ok_or_else(|| anyhow!("Blog data not loaded yet."))?;

        let title = self.title();
        let cover = self.cover_url();
        let mut meta = record.meta.clone();
        meta.title = title.clone();
        meta.cover_image_url = cover.clone();
        let mut final_blog = record.final_blog.clone();
        final_blog.render.title = title;
        final_blog.render.cover_image_url = cover;
        final_blog.markdown = self.normalized();
        final_blog.html = self.html()?;

        let req = BlogCreateRequest { meta, final_blog };
        api.update_blog(&id, &req)
            .await
            .map_err(|e| e.for_action("Failed to save."))?;
        info!("Saved edits to blog {}", id);

        if let Some(record) = self.record.as_mut() {
            record.meta = req.meta;
            record.final_blog = req.final_blog;
        }
        Ok(())
    }
}
