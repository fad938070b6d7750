use anyhow::{anyhow, Context, Result};
use log::{info, warn};

use crate::core::config::Config;
use crate::core::io::Storage;
use crate::services::api::BlogApi;
use crate::services::dashboard::format_date;
use crate::services::models::{BlogRecord, BlogSummary};
use crate::utils::html;
use crate::utils::pdf::{PdfDocument, Rect};
use crate::utils::raster::{wait_for_images, Fragment, FragmentRenderer, ImageLoader};

#[cfg(not(target_arch = "wasm32"))]
use indicatif::{ProgressBar, ProgressStyle};

/// Pulls every summary page until a page comes back empty or the reported
/// total is reached.
pub async fn fetch_all_summaries(api: &dyn BlogApi, page_size: u32) -> Result<Vec<BlogSummary>> {
    let limit = page_size.max(1);
    let mut all = Vec::new();
    let mut page = 1;
    loop {
        let resp = api
            .list_blogs(page, limit)
            .await
            .with_context(|| format!("Failed to load blogs page {}", page))?;
        if resp.items.is_empty() {
            break;
        }
        all.extend(resp.items);
        if let Some(total) = resp.total {
            if all.len() as u64 >= total {
                break;
            }
        }
        page += 1;
    }
    Ok(all)
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

/// Lays out one post. Without a full record only the summary's title, date
/// and status are shown.
pub fn build_fragment(summary: &BlogSummary, record: Option<&BlogRecord>, api_base: &str) -> Fragment {
    let title = record
        .map(|r| r.title())
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(&summary.title);
    let title = if title.trim().is_empty() {
        "Untitled".to_string()
    } else {
        title.to_string()
    };

    let created_at = record
        .and_then(|r| r.created_at.as_deref())
        .or(summary.created_at.as_deref());
    let created_by = match record {
        Some(r) if summary.created_by.trim().is_empty() => r.owner_name.as_str(),
        _ => summary.created_by.as_str(),
    };
    let status = record.map(|r| r.status).unwrap_or(summary.status);

    let meta_lines = vec![
        format!("Created Date: {}", format_date(created_at)),
        format!("Created By: {}", or_dash(created_by)),
        format!("Status: {}", status.label()),
    ];

    let Some(record) = record else {
        return Fragment {
            title,
            meta_lines,
            cover: None,
            body_html: String::new(),
        };
    };

    let cover = Some(record.cover_url())
        .filter(|c| !c.trim().is_empty())
        .map(|c| html::absolutize(c, api_base));

    let raw_body = if record.final_blog.html.trim().is_empty() {
        markdown::to_html(&record.final_blog.markdown)
    } else {
        record.final_blog.html.clone()
    };
    let mut body_html = html::rewrite_images(&html::sanitize(&raw_body), api_base);
    if let Some(cover) = &cover {
        body_html = html::remove_first_image_if(&body_html, cover);
    }

    Fragment {
        title,
        meta_lines,
        cover,
        body_html,
    }
}

/// Window offsets (same unit as the inputs) that slice an image of height
/// `image_height` into pages of height `page_height`. A slice is only added
/// while at least one unit is left unshown.
pub fn paginate(image_height: f64, page_height: f64) -> Vec<f64> {
    let mut offsets = vec![0.0];
    if page_height <= 0.0 {
        return offsets;
    }
    let mut remaining = image_height - page_height;
    let mut offset = 0.0;
    while remaining >= 1.0 {
        offset += page_height;
        offsets.push(offset);
        remaining -= page_height;
    }
    offsets
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutcome {
    pub path: String,
    pub posts: usize,
    pub pages: usize,
    /// Posts exported from their summary only, because the record failed to load.
    pub degraded: Vec<String>,
}

pub struct Exporter<'a> {
    api: &'a dyn BlogApi,
    loader: &'a dyn ImageLoader,
    renderer: &'a dyn FragmentRenderer,
    storage: &'a dyn Storage,
    config: &'a Config,
}

impl<'a> Exporter<'a> {
    pub fn new(
        api: &'a dyn BlogApi,
        loader: &'a dyn ImageLoader,
        renderer: &'a dyn FragmentRenderer,
        storage: &'a dyn Storage,
        config: &'a Config,
    ) -> Self {
        Self {
            api,
            loader,
            renderer,
            storage,
            config,
        }
    }

    /// Renders every post into one document. Posts are handled one at a time
    /// so only a single rasterized fragment is alive.
    pub async fn build(&self, summaries: &[BlogSummary]) -> Result<(PdfDocument, Vec<String>)> {
        let export = &self.config.export;
        let body = Rect {
            x: export.margin,
            y: export.margin,
            width: export.content_width(),
            height: export.page_body_height(),
        };
        if body.width <= 0.0 || body.height <= 0.0 {
            return Err(anyhow!("Page margins leave no room for content"));
        }

        let mut doc = PdfDocument::new(export.page_width, export.page_height);
        let first_page = doc.add_page();
        let mut degraded = Vec::new();

        #[cfg(not(target_arch = "wasm32"))]
        let pb = ProgressBar::new(summaries.len() as u64);
        #[cfg(not(target_arch = "wasm32"))]
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );

        for (i, summary) in summaries.iter().enumerate() {
            let record = match self.api.get_blog(&summary.id).await {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Exporting '{}' from its summary only: {}", summary.id, e);
                    degraded.push(summary.id.clone());
                    None
                }
            };

            let fragment = build_fragment(summary, record.as_ref(), &self.config.api.base_url);
            let images = wait_for_images(&fragment.image_urls(), self.loader).await;
            let bitmap = self
                .renderer
                .render(&fragment, &images)
                .with_context(|| format!("Failed to render '{}'", fragment.title))?;
            drop(images);

            if bitmap.width == 0 || bitmap.height == 0 {
                return Err(anyhow!("Rendered '{}' is empty", fragment.title));
            }
            let scale = body.width / bitmap.width as f64;
            let image_height = bitmap.height as f64;
            let image = doc.add_image(&bitmap)?;
            drop(bitmap);

            for (j, offset) in paginate(image_height, body.height / scale).into_iter().enumerate() {
                let page = if i == 0 && j == 0 {
                    first_page
                } else {
                    doc.add_page()
                };
                let target = Rect {
                    x: body.x,
                    y: body.y - offset * scale,
                    width: body.width,
                    height: image_height * scale,
                };
                doc.draw_image(page, image, target, body)?;
            }

            #[cfg(not(target_arch = "wasm32"))]
            pb.inc(1);
        }

        #[cfg(not(target_arch = "wasm32"))]
        pb.finish_with_message("Rendered");
        Ok((doc, degraded))
    }

    /// Exports every post to `<output_folder>/<file_name>`. Nothing is written
    /// unless every post was placed.
    pub async fn export_all(&self, file_name: &str) -> Result<ExportOutcome> {
        let summaries = fetch_all_summaries(self.api, self.config.export.summary_page_size).await?;
        if summaries.is_empty() {
            return Err(anyhow!("No blogs to export."));
        }
        info!("Exporting {} blogs", summaries.len());

        let (doc, degraded) = self.build(&summaries).await?;
        let path = format!(
            "{}/{}",
            self.config.output_folder.trim_end_matches('/'),
            file_name
        );
        self.storage
            .write(&path, &doc.to_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path))?;

        info!("Wrote {} pages to {}", doc.page_count(), path);
        Ok(ExportOutcome {
            path,
            posts: summaries.len(),
            pages: doc.page_count(),
            degraded,
        })
    }
}

pub fn default_file_name() -> String {
    format!("blogs-{}.pdf", chrono::Local::now().format("%Y%m%d-%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::NativeStorage;
    use crate::core::config::ExportConfig;
    use crate::services::models::{BlogMeta, BlogStatus, FinalBlog};
    use crate::services::testing::MockApi;
    use crate::utils::raster::{Bitmap, LoadedImages};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockRenderer {
        heights: Vec<u32>,
        rendered: Mutex<Vec<Fragment>>,
    }

    impl FragmentRenderer for MockRenderer {
        fn render(&self, fragment: &Fragment, _images: &LoadedImages) -> Result<Bitmap> {
            let mut rendered = self.rendered.lock().unwrap();
            let height = self.heights[rendered.len() % self.heights.len()];
            rendered.push(fragment.clone());
            Ok(Bitmap {
                width: 180,
                height,
                rgb: vec![255; 180 * height as usize * 3],
            })
        }
    }

    struct NoImages;

    #[async_trait]
    impl ImageLoader for NoImages {
        async fn load(&self, url: &str) -> Result<Vec<u8>> {
            Err(anyhow!("offline: {}", url))
        }
    }

    fn summary(id: &str) -> BlogSummary {
        BlogSummary {
            id: id.into(),
            title: format!("Summary {}", id),
            created_by: "Ann".into(),
            created_at: Some("2022-01-22T10:00:00".into()),
            status: BlogStatus::Pending,
            ..Default::default()
        }
    }

    fn record(id: &str) -> BlogRecord {
        BlogRecord {
            id: id.into(),
            meta: BlogMeta {
                title: format!("Record {}", id),
                cover_image_url: "/media/cover.png".into(),
                ..Default::default()
            },
            final_blog: FinalBlog {
                html: r#"<img src="/media/cover.png"><p>Body</p><script>x()</script>"#.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    // 200x300 pages with a 10pt margin leave a 180x280 body; the mock renders
    // 180px wide, so one pixel is one point.
    fn test_config(dir: &tempfile::TempDir) -> Config {
        Config {
            output_folder: dir.path().to_str().unwrap().to_string(),
            export: ExportConfig {
                page_width: 200.0,
                page_height: 300.0,
                margin: 10.0,
                summary_page_size: 2,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_paginate_counts() {
        assert_eq!(paginate(280.0, 280.0).len(), 1);
        assert_eq!(paginate(560.0, 280.0), vec![0.0, 280.0]);
        assert_eq!(paginate(561.0, 280.0).len(), 3);
        // a sub-unit remainder does not open another page
        assert_eq!(paginate(560.5, 280.0).len(), 2);
        assert_eq!(paginate(0.0, 280.0).len(), 1);
        for (h, b) in [(1000.0, 280.0), (2800.0, 280.0), (281.0, 280.0)] {
            assert_eq!(paginate(h, b).len(), (h / b as f64).ceil() as usize);
        }
    }

    #[test]
    fn test_build_fragment_full_record() {
        let fragment = build_fragment(&summary("1"), Some(&record("1")), "http://api.test");
        assert_eq!(fragment.title, "Record 1");
        assert_eq!(
            fragment.meta_lines,
            vec!["Created Date: 22 Jan 2022", "Created By: Ann", "Status: Saved"]
        );
        assert_eq!(fragment.cover.as_deref(), Some("http://api.test/media/cover.png"));
        // the cover is not repeated in the body and scripts are gone
        assert_eq!(fragment.body_html, "<p>Body</p>");
    }

    #[test]
    fn test_build_fragment_summary_only() {
        let mut s = summary("2");
        s.created_at = Some("garbage".into());
        s.created_by = String::new();
        let fragment = build_fragment(&s, None, "http://api.test");
        assert_eq!(fragment.title, "Summary 2");
        assert_eq!(
            fragment.meta_lines,
            vec!["Created Date: -", "Created By: -", "Status: Pending"]
        );
        assert!(fragment.cover.is_none());
        assert!(fragment.body_html.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_all_summaries_pages_until_total() {
        let api = MockApi::new().with_summaries((1..=5).map(|i| summary(&i.to_string())).collect());
        let all = fetch_all_summaries(&api, 2).await.unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(
            api.calls(),
            vec!["list_blogs 1 2", "list_blogs 2 2", "list_blogs 3 2"]
        );
    }

    #[tokio::test]
    async fn test_export_continues_past_failed_record() {
        let api = MockApi::new().with_summaries(vec![summary("a"), summary("b"), summary("c")]);
        api.add_record(record("a"));
        api.add_record(record("c"));
        api.fail_id("b");

        let renderer = MockRenderer {
            heights: vec![280, 560, 100],
            rendered: Mutex::new(Vec::new()),
        };
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let storage = NativeStorage::new();
        let exporter = Exporter::new(&api, &NoImages, &renderer, &storage, &config);

        let outcome = exporter.export_all("out.pdf").await.unwrap();
        assert_eq!(outcome.posts, 3);
        assert_eq!(outcome.degraded, vec!["b"]);
        // 1 + 2 + 1 pages; the first post reuses the opening page
        assert_eq!(outcome.pages, 4);

        let rendered = renderer.rendered.lock().unwrap();
        assert_eq!(rendered.len(), 3);
        assert_eq!(rendered[1].title, "Summary b");

        let bytes = std::fs::read(dir.path().join("out.pdf")).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    struct FailingRenderer;

    impl FragmentRenderer for FailingRenderer {
        fn render(&self, _fragment: &Fragment, _images: &LoadedImages) -> Result<Bitmap> {
            Err(anyhow!("canvas lost"))
        }
    }

    #[tokio::test]
    async fn test_failed_render_writes_nothing() {
        let api = MockApi::new().with_summaries(vec![summary("a")]);
        api.add_record(record("a"));
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let storage = NativeStorage::new();
        let exporter = Exporter::new(&api, &NoImages, &FailingRenderer, &storage, &config);

        assert!(exporter.export_all("out.pdf").await.is_err());
        assert!(!dir.path().join("out.pdf").exists());
    }

    #[tokio::test]
    async fn test_export_with_no_blogs_is_an_error() {
        let api = MockApi::new();
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let storage = NativeStorage::new();
        let renderer = MockRenderer {
            heights: vec![1],
            rendered: Mutex::new(Vec::new()),
        };
        let exporter = Exporter::new(&api, &NoImages, &renderer, &storage, &config);
        let err = exporter.export_all("out.pdf").await.unwrap_err();
        assert_eq!(err.to_string(), "No blogs to export.");
    }
}
