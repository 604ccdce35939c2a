//! Regex-based HTML-to-text conversion with weak metadata recovery.
//!
//! Good enough for news article bodies; not a general-purpose HTML
//! parser. Metadata comes from the usual suspects: `<title>`, author and
//! date meta tags, `<time datetime>`.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use crate::traits::cleaner::{CleanedDocument, Cleaner};
use crate::types::source::WeakMetadata;

static SCRIPTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid regex"));
static STYLES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("valid regex"));
static COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));
static BLOCK_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(?:p|div|h[1-6]|li|tr|blockquote)>|<br\s*/?>").expect("valid regex")
});
static ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a[^>]*>(.*?)</a>").expect("valid regex"));
static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static MULTI_NEWLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));
static MULTI_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));

static META_AUTHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta[^>]+name\s*=\s*["']author["'][^>]*content\s*=\s*["']([^"']+)["']"#)
        .expect("valid regex")
});

/// Published-date sources, tried in order.
static META_DATES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?is)<meta[^>]+property\s*=\s*["']article:published_time["'][^>]*content\s*=\s*["']([^"']+)["']"#,
        r#"(?is)<meta[^>]+name\s*=\s*["']date["'][^>]*content\s*=\s*["']([^"']+)["']"#,
        r#"(?is)<time[^>]+datetime\s*=\s*["']([^"']+)["']"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&rsquo;", "'")
        .replace("&lsquo;", "'")
        .replace("&mdash;", "-")
}

fn parse_meta_date(value: &str) -> Option<NaiveDate> {
    let head = value.trim();
    let head = head.get(..10).unwrap_or(head);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Production HTML cleaner.
#[derive(Debug, Clone, Default)]
pub struct HtmlCleaner;

impl HtmlCleaner {
    pub fn new() -> Self {
        Self
    }

    fn extract_text(&self, html: &str) -> String {
        let mut text = SCRIPTS.replace_all(html, "").into_owned();
        text = STYLES.replace_all(&text, "").into_owned();
        text = COMMENTS.replace_all(&text, "").into_owned();
        text = ANCHOR.replace_all(&text, "$1").into_owned();
        text = BLOCK_END.replace_all(&text, "\n").into_owned();
        text = TAGS.replace_all(&text, " ").into_owned();
        text = decode_entities(&text);
        text = MULTI_SPACE.replace_all(&text, " ").into_owned();
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        let joined = lines.join("\n");
        MULTI_NEWLINE.replace_all(&joined, "\n\n").trim().to_string()
    }

    fn extract_meta(&self, html: &str) -> WeakMetadata {
        let title = TITLE
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| decode_entities(m.as_str()).trim().to_string())
            .filter(|t| !t.is_empty());

        let author = META_AUTHOR
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|a| !a.is_empty());

        let published = META_DATES
            .iter()
            .find_map(|pattern| pattern.captures(html))
            .and_then(|c| c.get(1).map(|m| m.as_str().to_string()))
            .and_then(|value| parse_meta_date(&value));

        WeakMetadata {
            title,
            author,
            published,
        }
    }
}

impl Cleaner for HtmlCleaner {
    fn clean(&self, html: &str, _url: Option<&str>) -> CleanedDocument {
        CleanedDocument {
            text: self.extract_text(html),
            meta: self.extract_meta(html),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_scripts_and_tags() {
        let cleaner = HtmlCleaner::new();
        let html = r#"<html><head><script>var x = 1;</script></head>
            <body><p>Two climbers died.</p><p>Crews responded.</p></body></html>"#;
        let doc = cleaner.clean(html, None);
        assert!(doc.text.contains("Two climbers died."));
        assert!(doc.text.contains("Crews responded."));
        assert!(!doc.text.contains("var x"));
        assert!(!doc.text.contains('<'));
    }

    #[test]
    fn test_title_and_author_meta() {
        let cleaner = HtmlCleaner::new();
        let html = r#"<html><head>
            <title>Climbers missing on Atwell Peak</title>
            <meta name="author" content="Jane Reporter">
            </head><body><p>Body</p></body></html>"#;
        let doc = cleaner.clean(html, None);
        assert_eq!(
            doc.meta.title.as_deref(),
            Some("Climbers missing on Atwell Peak")
        );
        assert_eq!(doc.meta.author.as_deref(), Some("Jane Reporter"));
    }

    #[test]
    fn test_published_time_meta() {
        let cleaner = HtmlCleaner::new();
        let html = r#"<meta property="article:published_time" content="2021-07-20T08:30:00Z">"#;
        let doc = cleaner.clean(html, None);
        assert_eq!(
            doc.meta.published,
            NaiveDate::from_ymd_opt(2021, 7, 20)
        );
    }

    #[test]
    fn test_time_tag_fallback() {
        let cleaner = HtmlCleaner::new();
        let html = r#"<article><time datetime="2022-09-10">Sept. 10</time><p>Story</p></article>"#;
        let doc = cleaner.clean(html, None);
        assert_eq!(doc.meta.published, NaiveDate::from_ymd_opt(2022, 9, 10));
    }

    #[test]
    fn test_anchor_text_kept_without_href() {
        let cleaner = HtmlCleaner::new();
        let html = r#"<p>Report via <a href="https://x.example">the coroner</a> today.</p>"#;
        let doc = cleaner.clean(html, None);
        assert!(doc.text.contains("the coroner"));
        assert!(!doc.text.contains("x.example"));
    }

    #[test]
    fn test_hopeless_input_yields_empty_document() {
        let cleaner = HtmlCleaner::new();
        let doc = cleaner.clean("", None);
        assert!(doc.text.is_empty());
        assert_eq!(doc.meta, WeakMetadata::default());
    }

    #[test]
    fn test_entities_decoded() {
        let cleaner = HtmlCleaner::new();
        let doc = cleaner.clean("<p>Smith &amp; Jones&nbsp;were found</p>", None);
        assert!(doc.text.contains("Smith & Jones were found"));
    }
}
