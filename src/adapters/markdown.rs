//! Markdown to HTML renderer.
//!
//! Uses pulldown-cmark with tables, footnotes and strikethrough enabled.
//! Raw `<script>` blocks are dropped from the output; everything else in the
//! source passes through.

use pulldown_cmark::{html, Event, Options, Parser};

use super::PageRenderer;

/// Default page renderer for posts
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer {
    keep_scripts: bool,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep raw `<script>` elements in the output
    pub fn with_scripts(mut self, keep: bool) -> Self {
        self.keep_scripts = keep;
        self
    }

    fn options() -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options
    }
}

impl PageRenderer for MarkdownRenderer {
    fn render(&self, canonical: &str, _identity: &str) -> String {
        let parser = Parser::new_ext(canonical, Self::options());
        let mut out = String::with_capacity(canonical.len() * 3 / 2);

        if self.keep_scripts {
            html::push_html(&mut out, parser);
            return out;
        }

        let mut in_script = false;
        let events = parser.filter(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => {
                let lower = raw.to_lowercase();
                if lower.contains("<script") {
                    in_script = !lower.contains("</script");
                    return false;
                }
                if in_script {
                    if lower.contains("</script") {
                        in_script = false;
                    }
                    return false;
                }
                true
            }
            _ => !in_script,
        });

        html::push_html(&mut out, events);
        out
    }
}
