//! URL extraction and OpenGraph tag scraping.
//!
//! The pack carries no HTML-parsing crate grounded anywhere, so tag
//! extraction stays regex-based rather than introducing an ungrounded
//! dependency — acceptable here since only a handful of well-known
//! `<meta property="og:...">` / `<title>` shapes need to be read out, not a
//! general DOM.

use regex::Regex;
use std::sync::OnceLock;

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://[^\s<>\x22']+").unwrap())
}

fn og_tag_regex(property: &str) -> Regex {
    Regex::new(&format!(
        r#"<meta[^>]+property=["']og:{property}["'][^>]+content=["']([^"']*)["']"#
    ))
    .unwrap()
}

fn title_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?si)<title[^>]*>(.*?)</title>").unwrap())
}

/// Extract up to `max` distinct URLs from `text`, in first-seen order — the
/// input to `LinkPreviewer::fetch_all`'s bound on `max_urls_outbound`.
pub fn extract_urls(text: &str, max: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for m in url_regex().find_iter(text) {
        let url = m.as_str().trim_end_matches(['.', ',', ')', ']']).to_string();
        if seen.insert(url.clone()) {
            out.push(url);
        }
        if out.len() >= max {
            break;
        }
    }
    out
}

pub struct ScrapedMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub site_name: Option<String>,
}

pub fn scrape_meta(html: &str) -> ScrapedMeta {
    let og_title = og_tag_regex("title").captures(html).map(|c| c[1].to_string());
    let fallback_title = title_tag_regex()
        .captures(html)
        .map(|c| c[1].trim().to_string());
    ScrapedMeta {
        title: og_title.or(fallback_title),
        description: og_tag_regex("description").captures(html).map(|c| c[1].to_string()),
        image_url: og_tag_regex("image").captures(html).map(|c| c[1].to_string()),
        site_name: og_tag_regex("site_name").captures(html).map(|c| c[1].to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_urls_in_order_and_dedupes() {
        let text = "see https://a.test/x and https://b.test/y, also https://a.test/x again";
        let urls = extract_urls(text, 10);
        assert_eq!(urls, vec!["https://a.test/x", "https://b.test/y"]);
    }

    #[test]
    fn respects_max_bound() {
        let text = "https://a.test https://b.test https://c.test";
        assert_eq!(extract_urls(text, 2).len(), 2);
    }

    #[test]
    fn trims_trailing_punctuation() {
        let urls = extract_urls("check this out: https://a.test/page).", 10);
        assert_eq!(urls, vec!["https://a.test/page"]);
    }

    #[test]
    fn scrapes_og_tags() {
        let html = r#"<html><head>
            <meta property="og:title" content="Example Title">
            <meta property="og:description" content="Example description">
            <meta property="og:image" content="https://a.test/img.png">
        </head></html>"#;
        let meta = scrape_meta(html);
        assert_eq!(meta.title.as_deref(), Some("Example Title"));
        assert_eq!(meta.description.as_deref(), Some("Example description"));
        assert_eq!(meta.image_url.as_deref(), Some("https://a.test/img.png"));
    }

    #[test]
    fn falls_back_to_title_tag_when_no_og_title() {
        let html = "<html><head><title>Plain Title</title></head></html>";
        let meta = scrape_meta(html);
        assert_eq!(meta.title.as_deref(), Some("Plain Title"));
    }
}
