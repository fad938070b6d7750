use regex::{Captures, Regex};
use std::sync::OnceLock;
use url::Url;

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($re).expect(stringify!($name)))
        }
    };
}
pub(crate) use pattern;

pattern!(script_block, r"(?is)<script\b[^>]*>.*?</script\s*>");
pattern!(style_block, r"(?is)<style\b[^>]*>.*?</style\s*>");
pattern!(iframe_block, r"(?is)<iframe\b[^>]*>.*?</iframe\s*>|<iframe\b[^>]*/?>");
pattern!(
    event_attr,
    r#"(?i)\s+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#
);
pattern!(img_tag, r"(?is)<img\b[^>]*>");
pattern!(src_attr, r#"(?is)(\s)src\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#);
pattern!(crossorigin_attr, r#"(?i)\s+crossorigin(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+))?"#);

/// Strips script, style and iframe blocks plus inline event handlers.
pub fn sanitize(html: &str) -> String {
    let html = script_block().replace_all(html, "");
    let html = style_block().replace_all(&html, "");
    let html = iframe_block().replace_all(&html, "");
    event_attr().replace_all(&html, "").into_owned()
}

/// Data URIs and absolute http(s) URLs pass through; everything else is
/// resolved against `base`.
pub fn absolutize(src: &str, base: &str) -> String {
    let src = src.trim();
    let lower = src.to_ascii_lowercase();
    if src.is_empty()
        || lower.starts_with("data:")
        || lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("blob:")
    {
        return src.to_string();
    }
    if let Some(rest) = src.strip_prefix("//") {
        return format!("https://{}", rest);
    }

    // Root-relative paths keep the base's own path prefix, as API requests do.
    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        src.trim_start_matches('/')
    );
    match Url::parse(&joined) {
        Ok(url) => url.to_string(),
        Err(_) => src.to_string(),
    }
}

fn src_of(tag: &str) -> Option<String> {
    src_attr().captures(tag).and_then(|c| {
        c.get(2)
            .or_else(|| c.get(3))
            .or_else(|| c.get(4))
            .map(|m| m.as_str().to_string())
    })
}

/// Rewrites every `<img src>` to absolute form and marks it for anonymous
/// cross-origin loading.
pub fn rewrite_images(html: &str, base: &str) -> String {
    img_tag()
        .replace_all(html, |caps: &Captures| {
            let tag = crossorigin_attr().replace_all(&caps[0], "");
            let tag = src_attr().replace(&tag, |c: &Captures| {
                let src = c
                    .get(2)
                    .or_else(|| c.get(3))
                    .or_else(|| c.get(4))
                    .map(|m| m.as_str())
                    .unwrap_or("");
                format!(
                    "{}src=\"{}\"",
                    &c[1],
                    absolutize(src, base).replace('"', "%22")
                )
            });
            let (head, tail) = match tag.strip_suffix("/>") {
                Some(head) => (head.trim_end(), " />"),
                None => (tag.trim_end_matches('>').trim_end(), ">"),
            };
            format!("{} crossorigin=\"anonymous\"{}", head, tail)
        })
        .into_owned()
}

pub fn image_sources(html: &str) -> Vec<String> {
    img_tag()
        .find_iter(html)
        .filter_map(|m| src_of(m.as_str()))
        .collect()
}

pub fn first_image_src(html: &str) -> Option<String> {
    img_tag().find(html).and_then(|m| src_of(m.as_str()))
}

/// Drops the first `<img>` tag when its source equals `src`.
pub fn remove_first_image_if(html: &str, src: &str) -> String {
    match img_tag().find(html) {
        Some(m) if src_of(m.as_str()).as_deref() == Some(src) => {
            format!("{}{}", &html[..m.start()], &html[m.end()..])
        }
        _ => html.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Html(String),
    Image(String),
}

/// Splits HTML into runs of markup and the images between them, in order.
pub fn split_images(html: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;
    for m in img_tag().find_iter(html) {
        if m.start() > last {
            segments.push(Segment::Html(html[last..m.start()].to_string()));
        }
        if let Some(src) = src_of(m.as_str()) {
            segments.push(Segment::Image(src));
        }
        last = m.end();
    }
    if last < html.len() {
        segments.push(Segment::Html(html[last..].to_string()));
    }
    segments
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_removes_active_content() {
        let html = r#"<p onclick="steal()">Hi</p><SCRIPT>alert(1)</SCRIPT><style>p{}</style><iframe src="x"></iframe><img src="a.png" onerror='x()'>"#;
        assert_eq!(sanitize(html), r#"<p>Hi</p><img src="a.png">"#);
    }

    #[test]
    fn test_absolutize() {
        let base = "http://127.0.0.1:8001";
        assert_eq!(absolutize("/media/a.png", base), "http://127.0.0.1:8001/media/a.png");
        assert_eq!(absolutize("media/a.png", base), "http://127.0.0.1:8001/media/a.png");
        assert_eq!(absolutize("https://cdn.x/a.png", base), "https://cdn.x/a.png");
        assert_eq!(absolutize("data:image/png;base64,AAA", base), "data:image/png;base64,AAA");
        assert_eq!(absolutize("//cdn.x/a.png", base), "https://cdn.x/a.png");

        let prefixed = "https://cms.example.com/api/";
        assert_eq!(
            absolutize("/uploads/a.png", prefixed),
            "https://cms.example.com/api/uploads/a.png"
        );
        assert_eq!(
            absolutize("uploads/a.png", prefixed),
            "https://cms.example.com/api/uploads/a.png"
        );
    }

    #[test]
    fn test_rewrite_images_ignores_data_src() {
        let html = r#"<img data-src="lazy.png" src="/m/real.png">"#;
        let out = rewrite_images(html, "http://api.test");
        assert_eq!(
            out,
            r#"<img data-src="lazy.png" src="http://api.test/m/real.png" crossorigin="anonymous">"#
        );
        assert_eq!(image_sources(&out), vec!["http://api.test/m/real.png"]);
        assert_eq!(first_image_src(html).as_deref(), Some("/m/real.png"));
    }

    #[test]
    fn test_rewrite_images() {
        let html = r#"<p>x</p><img alt="a" src='/m/1.png' crossorigin="use-credentials"><img src="https://e.com/2.png"/>"#;
        let out = rewrite_images(html, "http://api.test");
        assert_eq!(
            out,
            r#"<p>x</p><img alt="a" src="http://api.test/m/1.png" crossorigin="anonymous"><img src="https://e.com/2.png" crossorigin="anonymous" />"#
        );
        assert_eq!(
            image_sources(&out),
            vec!["http://api.test/m/1.png", "https://e.com/2.png"]
        );
    }

    #[test]
    fn test_remove_first_image_only_when_matching() {
        let html = r#"<img src="c.png"><p>t</p><img src="c.png">"#;
        assert_eq!(remove_first_image_if(html, "c.png"), r#"<p>t</p><img src="c.png">"#);
        assert_eq!(remove_first_image_if(html, "other.png"), html);
    }

    #[test]
    fn test_split_images_keeps_order() {
        let segments = split_images(r#"<p>a</p><img src="1.png"><p>b</p>"#);
        assert_eq!(
            segments,
            vec![
                Segment::Html("<p>a</p>".into()),
                Segment::Image("1.png".into()),
                Segment::Html("<p>b</p>".into()),
            ]
        );
    }
}
