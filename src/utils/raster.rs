use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use futures_util::StreamExt;
use log::{debug, warn};
use std::collections::HashMap;

use crate::utils::html;

/// Opaque RGB pixels, row-major, 3 bytes per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

/// Off-screen document fragment for one post, ready for rasterization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub title: String,
    pub meta_lines: Vec<String>,
    pub cover: Option<String>,
    pub body_html: String,
}

impl Fragment {
    /// Every image the fragment references, cover first, without duplicates.
    pub fn image_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for url in self
            .cover
            .iter()
            .cloned()
            .chain(html::image_sources(&self.body_html))
        {
            if !url.is_empty() && !urls.contains(&url) {
                urls.push(url);
            }
        }
        urls
    }

    pub fn to_html(&self) -> String {
        let mut out = format!("<article><h1>{}</h1>", html::escape(&self.title));
        for line in &self.meta_lines {
            out.push_str(&format!("<p class=\"meta\">{}</p>", html::escape(line)));
        }
        if let Some(cover) = &self.cover {
            out.push_str(&format!(
                "<img class=\"cover\" src=\"{}\" crossorigin=\"anonymous\">",
                html::escape(cover)
            ));
        }
        out.push_str(&self.body_html);
        out.push_str("</article>");
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageStatus {
    Loaded(Vec<u8>),
    Failed,
}

pub type LoadedImages = HashMap<String, ImageStatus>;

#[cfg(target_arch = "wasm32")]
pub trait RasterBounds {}
#[cfg(target_arch = "wasm32")]
impl<T> RasterBounds for T {}

#[cfg(not(target_arch = "wasm32"))]
pub trait RasterBounds: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync> RasterBounds for T {}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait ImageLoader: RasterBounds {
    async fn load(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpImageLoader {
    client: reqwest::Client,
}

impl HttpImageLoader {
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        #[cfg(not(target_arch = "wasm32"))]
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()?;
        #[cfg(target_arch = "wasm32")]
        let client = {
            let _ = timeout_seconds;
            reqwest::Client::new()
        };
        Ok(Self { client })
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl ImageLoader for HttpImageLoader {
    async fn load(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("HTTP {} for {}", resp.status().as_u16(), url));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let (header, data) = uri
        .split_once(',')
        .ok_or_else(|| anyhow!("Malformed data URI"))?;
    if header.ends_with(";base64") {
        Ok(STANDARD.decode(data.trim())?)
    } else {
        Ok(data.as_bytes().to_vec())
    }
}

const IMAGE_CONCURRENCY: usize = 4;

/// Settles every image. A failed load is a finished state, never an error.
pub async fn wait_for_images(urls: &[String], loader: &dyn ImageLoader) -> LoadedImages {
    futures_util::stream::iter(urls.iter().cloned())
        .map(|url| async move {
            let result = if url.starts_with("data:") {
                decode_data_uri(&url)
            } else {
                loader.load(&url).await
            };
            let status = match result {
                Ok(bytes) if !bytes.is_empty() => ImageStatus::Loaded(bytes),
                Ok(_) => ImageStatus::Failed,
                Err(e) => {
                    warn!("Image failed to load, continuing without it: {}", e);
                    ImageStatus::Failed
                }
            };
            (url, status)
        })
        .buffer_unordered(IMAGE_CONCURRENCY)
        .collect()
        .await
}

pub fn mime_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() > 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}

/// Pixel size from a PNG header or a JPEG frame marker.
pub fn image_size(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) && bytes.len() >= 24 {
        let w = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
        let h = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
        return Some((w, h));
    }
    if bytes.starts_with(&[0xFF, 0xD8]) {
        let mut i = 2;
        while i + 9 < bytes.len() {
            if bytes[i] != 0xFF {
                i += 1;
                continue;
            }
            let marker = bytes[i + 1];
            let len = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
            let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
            if is_sof {
                let h = u16::from_be_bytes([bytes[i + 5], bytes[i + 6]]) as u32;
                let w = u16::from_be_bytes([bytes[i + 7], bytes[i + 8]]) as u32;
                return Some((w, h));
            }
            i += 2 + len;
        }
    }
    None
}

/// Turns a fragment into pixels. Swappable so export does not depend on one
/// rendering backend.
pub trait FragmentRenderer: RasterBounds {
    fn render(&self, fragment: &Fragment, images: &LoadedImages) -> Result<Bitmap>;
}

#[cfg(not(target_arch = "wasm32"))]
pub use svg::SvgRenderer;

#[cfg(not(target_arch = "wasm32"))]
mod svg {
    use super::*;
    use std::sync::Arc;

    const PADDING: f32 = 32.0;
    const TITLE_SIZE: f32 = 28.0;
    const TITLE_LINE: f32 = 36.0;
    const META_SIZE: f32 = 13.0;
    const META_LINE: f32 = 20.0;
    const HEADING_SIZE: f32 = 19.0;
    const BODY_SIZE: f32 = 15.0;
    const BODY_LINE: f32 = 24.0;
    const BLOCK_GAP: f32 = 16.0;
    // average advance of a sans-serif glyph relative to its size
    const GLYPH_RATIO: f32 = 0.52;

    /// Lays the fragment out as SVG and rasterizes it with resvg on a white
    /// background.
    pub struct SvgRenderer {
        width: u32,
        pixel_ratio: f32,
        fontdb: Arc<fontdb::Database>,
    }

    impl SvgRenderer {
        pub fn new(width: u32, pixel_ratio: f32) -> Self {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            debug!("Loaded {} font faces", db.len());
            Self {
                width,
                pixel_ratio,
                fontdb: Arc::new(db),
            }
        }

        fn columns(&self, font_size: f32) -> usize {
            let usable = self.width as f32 - PADDING * 2.0;
            ((usable / (font_size * GLYPH_RATIO)) as usize).max(10)
        }

        fn text(out: &mut String, y: f32, size: f32, weight: &str, fill: &str, content: &str) {
            out.push_str(&format!(
                "<text x=\"{}\" y=\"{:.1}\" font-family=\"sans-serif\" font-size=\"{}\" font-weight=\"{}\" fill=\"{}\">{}</text>\n",
                PADDING,
                y,
                size,
                weight,
                fill,
                html::escape(content)
            ));
        }

        fn image(&self, out: &mut String, y: f32, bytes: &[u8]) -> f32 {
            let box_width = self.width as f32 - PADDING * 2.0;
            let box_height = match image_size(bytes) {
                Some((w, h)) if w > 0 => box_width * h as f32 / w as f32,
                _ => box_width * 9.0 / 16.0,
            };
            out.push_str(&format!(
                "<image x=\"{}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" preserveAspectRatio=\"xMidYMid meet\" href=\"data:{};base64,{}\"/>\n",
                PADDING,
                y,
                box_width,
                box_height,
                mime_type(bytes),
                STANDARD.encode(bytes)
            ));
            box_height
        }

        /// SVG source and its height in CSS pixels.
        pub fn layout(&self, fragment: &Fragment, images: &LoadedImages) -> (String, f32) {
            let mut body = String::new();
            let mut y = PADDING;

            for line in textwrap::wrap(&fragment.title, self.columns(TITLE_SIZE)) {
                y += TITLE_LINE;
                Self::text(&mut body, y, TITLE_SIZE, "bold", "#111827", &line);
            }
            y += 8.0;
            for line in &fragment.meta_lines {
                y += META_LINE;
                Self::text(&mut body, y, META_SIZE, "normal", "#6B7280", line);
            }

            let place_image = |body: &mut String, y: &mut f32, src: &str| {
                if let Some(ImageStatus::Loaded(bytes)) = images.get(src) {
                    *y += BLOCK_GAP;
                    *y += self.image(body, *y, bytes);
                }
            };

            if let Some(cover) = &fragment.cover {
                place_image(&mut body, &mut y, cover);
            }

            for segment in html::split_images(&fragment.body_html) {
                match segment {
                    html::Segment::Image(src) => place_image(&mut body, &mut y, &src),
                    html::Segment::Html(markup) => {
                        let text = html2text::from_read(markup.as_bytes(), self.columns(BODY_SIZE))
                            .unwrap_or_default();
                        for line in text.lines() {
                            if line.trim().is_empty() {
                                y += BODY_LINE / 2.0;
                                continue;
                            }
                            if let Some(heading) = line.strip_prefix('#') {
                                y += BODY_LINE + 6.0;
                                let heading = heading.trim_start_matches('#').trim();
                                Self::text(&mut body, y, HEADING_SIZE, "bold", "#111827", heading);
                            } else {
                                y += BODY_LINE;
                                Self::text(&mut body, y, BODY_SIZE, "normal", "#1F2937", line);
                            }
                        }
                    }
                }
            }
            y += PADDING;

            let svg = format!(
                "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h:.1}\" viewBox=\"0 0 {w} {h:.1}\">\n<rect width=\"100%\" height=\"100%\" fill=\"#FFFFFF\"/>\n{body}</svg>",
                w = self.width,
                h = y,
                body = body
            );
            (svg, y)
        }
    }

    impl FragmentRenderer for SvgRenderer {
        fn render(&self, fragment: &Fragment, images: &LoadedImages) -> Result<Bitmap> {
            let (svg, height) = self.layout(fragment, images);
            let options = usvg::Options {
                fontdb: self.fontdb.clone(),
                ..Default::default()
            };
            let tree = usvg::Tree::from_str(&svg, &options)
                .map_err(|e| anyhow!("Failed to parse fragment SVG: {}", e))?;

            let width_px = (self.width as f32 * self.pixel_ratio).ceil() as u32;
            let height_px = (height * self.pixel_ratio).ceil().max(1.0) as u32;
            let mut pixmap = tiny_skia::Pixmap::new(width_px, height_px)
                .ok_or_else(|| anyhow!("Failed to allocate {}x{} canvas", width_px, height_px))?;
            pixmap.fill(tiny_skia::Color::WHITE);
            resvg::render(
                &tree,
                tiny_skia::Transform::from_scale(self.pixel_ratio, self.pixel_ratio),
                &mut pixmap.as_mut(),
            );

            // opaque background, so dropping alpha is exact
            let rgb = pixmap
                .data()
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            Ok(Bitmap {
                width: width_px,
                height: height_px,
                rgb,
            })
        }
    }
}
