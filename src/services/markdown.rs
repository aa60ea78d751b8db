//! Comment markdown rendering and HTML sanitizing.

use std::collections::{HashMap, HashSet};

use ammonia::{Builder, UrlRelative};
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd, html};

pub const LINK_REL: &str = "nofollow noreferrer";

const ALLOWED_TAGS: [&str; 20] = [
    "p",
    "br",
    "strong",
    "b",
    "em",
    "i",
    "code",
    "pre",
    "blockquote",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "ul",
    "ol",
    "li",
    "a",
    "img",
];

fn comment_sanitizer() -> Builder<'static> {
    let mut builder = Builder::default();
    builder
        .tags(ALLOWED_TAGS.into_iter().collect())
        .generic_attributes(HashSet::new())
        .tag_attributes(HashMap::from([
            ("a", HashSet::from(["href"])),
            ("img", HashSet::from(["src", "alt", "title"])),
        ]))
        .url_schemes(HashSet::from(["http", "https"]))
        .url_relative(UrlRelative::Deny)
        .link_rel(Some(LINK_REL));
    builder
}

/// Markdown without tables. Fenced code blocks degrade to plain paragraphs.
#[must_use]
pub fn render_comment_html(content: &str) -> String {
    let options = Options::ENABLE_STRIKETHROUGH;
    let events = Parser::new_ext(content, options).map(|event| match event {
        Event::Start(Tag::CodeBlock(_)) => Event::Start(Tag::Paragraph),
        Event::End(TagEnd::CodeBlock) => Event::End(TagEnd::Paragraph),
        other => other,
    });

    let mut unsafe_html = String::with_capacity(content.len() * 2);
    html::push_html(&mut unsafe_html, events);

    comment_sanitizer()
        .clean(&unsafe_html)
        .to_string()
        .trim()
        .to_string()
}

/// Removes every tag, keeping text content.
#[must_use]
pub fn strip_markup(input: &str) -> String {
    let stripped = Builder::empty().clean(input).to_string();
    html_escape::decode_html_entities(&stripped).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_basic_markdown() {
        let html = render_comment_html("**bold** and *em*");
        assert_eq!(html, "<p><strong>bold</strong> and <em>em</em></p>");
    }

    #[test]
    fn test_script_is_removed() {
        let html = render_comment_html("hello <script>alert(1)</script> world");
        assert!(!html.contains("<script"));
        assert!(!html.contains("alert(1)"));

        let html = render_comment_html("<SCRIPT src=x></SCRIPT>");
        assert!(!html.to_lowercase().contains("<script"));
    }

    #[test]
    fn test_links_get_rel_and_bad_schemes_dropped() {
        let html = render_comment_html("[site](https://example.com)");
        assert!(html.contains(r#"href="https://example.com""#));
        assert!(html.contains(r#"rel="nofollow noreferrer""#));

        let html = render_comment_html("[x](javascript:alert(1))");
        assert!(!html.contains("javascript"));

        let html = render_comment_html("[x](/relative/path)");
        assert!(!html.contains("href"));
    }

    #[test]
    fn test_fenced_code_becomes_paragraph() {
        let html = render_comment_html("```\nlet x = 1;\n```");
        assert!(html.starts_with("<p>"));
        assert!(!html.contains("<pre>"));
        assert!(html.contains("let x = 1;"));
    }

    #[test]
    fn test_tables_are_not_rendered() {
        let html = render_comment_html("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(!html.contains("<table"));
    }

    #[test]
    fn test_event_handlers_stripped() {
        let html = render_comment_html(r#"<img src="https://x.test/a.png" onerror="alert(1)">"#);
        assert!(!html.contains("onerror"));
        assert!(html.contains(r#"src="https://x.test/a.png""#));
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("<b>Лис</b>"), "Лис");
        assert_eq!(strip_markup("<script>x</script>Ёж"), "Ёж");
        assert_eq!(strip_markup("plain"), "plain");
    }
}
