use anyhow::{anyhow, Context, Result};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

use crate::utils::raster::Bitmap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRef(usize);

/// Rectangle in PDF user space measured from the top-left corner of the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

struct Page {
    content: Vec<u8>,
    images: Vec<usize>,
}

struct Image {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// Minimal PDF 1.4 writer: pages that draw clipped raster images.
pub struct PdfDocument {
    page_width: f64,
    page_height: f64,
    images: Vec<Image>,
    pages: Vec<Page>,
}

impl PdfDocument {
    pub fn new(page_width: f64, page_height: f64) -> Self {
        Self {
            page_width,
            page_height,
            images: Vec::new(),
            pages: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Embeds an RGB bitmap once; it can then be drawn on any number of pages.
    pub fn add_image(&mut self, bitmap: &Bitmap) -> Result<ImageRef> {
        let expected = bitmap.width as usize * bitmap.height as usize * 3;
        if bitmap.rgb.len() != expected {
            return Err(anyhow!(
                "Bitmap is {} bytes, expected {} for {}x{}",
                bitmap.rgb.len(),
                expected,
                bitmap.width,
                bitmap.height
            ));
        }
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bitmap.rgb)?;
        let data = encoder.finish().context("Failed to compress image")?;

        self.images.push(Image {
            width: bitmap.width,
            height: bitmap.height,
            data,
        });
        Ok(ImageRef(self.images.len() - 1))
    }

    /// Appends an empty page and returns its index.
    pub fn add_page(&mut self) -> usize {
        self.pages.push(Page {
            content: Vec::new(),
            images: Vec::new(),
        });
        self.pages.len() - 1
    }

    /// Draws `image` into `target`, showing only what falls inside `clip`.
    pub fn draw_image(&mut self, page: usize, image: ImageRef, target: Rect, clip: Rect) -> Result<()> {
        if image.0 >= self.images.len() {
            return Err(anyhow!("Unknown image {}", image.0));
        }
        let page_height = self.page_height;
        let page = self
            .pages
            .get_mut(page)
            .ok_or_else(|| anyhow!("Page {} does not exist", page))?;

        // PDF space grows upwards from the bottom-left corner.
        let clip_y = page_height - clip.y - clip.height;
        let target_y = page_height - target.y - target.height;
        writeln!(
            page.content,
            "q\n{:.3} {:.3} {:.3} {:.3} re W n\n{:.3} 0 0 {:.3} {:.3} {:.3} cm\n/Im{} Do\nQ",
            clip.x,
            clip_y,
            clip.width,
            clip.height,
            target.width,
            target.height,
            target.x,
            target_y,
            image.0
        )?;
        if !page.images.contains(&image.0) {
            page.images.push(image.0);
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // 1: catalog, 2: page tree, then images, then (page, content) pairs.
        let image_id = |i: usize| 3 + i;
        let page_id = |p: usize| 3 + self.images.len() + p * 2;

        let mut out: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

        let mut object = |out: &mut Vec<u8>, body: &[u8]| {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n", offsets.len()).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        };

        object(&mut out, b"<< /Type /Catalog /Pages 2 0 R >>");

        let kids: Vec<String> = (0..self.pages.len())
            .map(|p| format!("{} 0 R", page_id(p)))
            .collect();
        object(
            &mut out,
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                self.pages.len()
            )
            .as_bytes(),
        );

        for image in &self.images {
            let mut body = format!(
                "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /FlateDecode /Length {} >>\nstream\n",
                image.width,
                image.height,
                image.data.len()
            )
            .into_bytes();
            body.extend_from_slice(&image.data);
            body.extend_from_slice(b"\nendstream");
            object(&mut out, &body);
        }

        for (p, page) in self.pages.iter().enumerate() {
            let xobjects: Vec<String> = page
                .images
                .iter()
                .map(|i| format!("/Im{} {} 0 R", i, image_id(*i)))
                .collect();
            object(
                &mut out,
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] /Resources << /XObject << {} >> >> /Contents {} 0 R >>",
                    self.page_width,
                    self.page_height,
                    xobjects.join(" "),
                    page_id(p) + 1
                )
                .as_bytes(),
            );

            let mut body = format!("<< /Length {} >>\nstream\n", page.content.len()).into_bytes();
            body.extend_from_slice(&page.content);
            body.extend_from_slice(b"\nendstream");
            object(&mut out, &body);
        }

        let xref_offset = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in &offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                offsets.len() + 1,
                xref_offset
            )
            .as_bytes(),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white(width: u32, height: u32) -> Bitmap {
        Bitmap {
            width,
            height,
            rgb: vec![255; (width * height * 3) as usize],
        }
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    #[test]
    fn test_document_structure_and_xref() {
        let mut doc = PdfDocument::new(200.0, 300.0);
        let img = doc.add_image(&white(4, 8)).unwrap();
        let body = Rect {
            x: 10.0,
            y: 10.0,
            width: 180.0,
            height: 280.0,
        };
        for offset in [0.0, 280.0] {
            let page = doc.add_page();
            let target = Rect {
                y: body.y - offset,
                height: 360.0,
                ..body
            };
            doc.draw_image(page, img, target, body).unwrap();
        }
        assert_eq!(doc.page_count(), 2);

        let bytes = doc.to_bytes();
        assert!(bytes.starts_with(b"%PDF-1.4"));
        assert!(find(&bytes, b"/Count 2").is_some());
        assert!(bytes.ends_with(b"%%EOF\n"));

        // xref entry for object 3 must point at "3 0 obj"
        let xref = find(&bytes, b"xref\n").unwrap();
        let entries = &bytes[xref..];
        let line_start = find(entries, b"0000000000 65535 f \n").unwrap() + 20 * 3;
        let offset: usize = std::str::from_utf8(&entries[line_start..line_start + 10])
            .unwrap()
            .parse()
            .unwrap();
        assert!(bytes[offset..].starts_with(b"3 0 obj"));
    }

    #[test]
    fn test_rejects_mismatched_bitmap_and_unknown_page() {
        let mut doc = PdfDocument::new(100.0, 100.0);
        let bad = Bitmap {
            width: 2,
            height: 2,
            rgb: vec![0; 5],
        };
        assert!(doc.add_image(&bad).is_err());

        let img = doc.add_image(&white(1, 1)).unwrap();
        let r = Rect {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        };
        assert!(doc.draw_image(3, img, r, r).is_err());
    }
}
