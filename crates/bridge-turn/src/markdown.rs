//! Markdown rendering for assistant turn bodies. The chat network renders a
//! `formatted_body` alongside the plain one; `pulldown-cmark` is the crate
//! the pack reaches for wherever Markdown needs turning into HTML, so this
//! module carries no local parser of its own.

use pulldown_cmark::{html, Options, Parser};

/// Render `body` to HTML with tables, strikethrough and footnotes enabled,
/// matching the feature set chat clients generally expect from a rendered
/// Markdown message.
pub fn render(body: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(body, options);
    let mut html_out = String::new();
    html::push_html(&mut html_out, parser);
    html_out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_basic_formatting() {
        let html = render("**bold** and _italic_");
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<em>italic</em>"));
    }

    #[test]
    fn renders_tables() {
        let html = render("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn renders_strikethrough() {
        let html = render("~~gone~~");
        assert!(html.contains("<del>gone</del>"));
    }
}
