//! Readable-text extraction from HTML pages.
//!
//! Resolves a title, then collects the own text of each block in the first
//! content container that yields any, falling back to line-filtered document
//! text. Text inside a nested block belongs to that block, so nothing is
//! emitted twice.
//! Script, style and page-chrome elements never contribute text.

use delve_core::config::FetchConfig;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Elements whose text is never part of the page content.
const STRIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "meta", "link",
];

/// Elements that count as text blocks.
const BLOCK_TAGS: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "div"];

/// Content containers, most specific first.
const CONTAINER_SELECTORS: &[&str] = &[
    "article",
    "main",
    ".content",
    ".post-content",
    ".entry-content",
    ".article-content",
    "#content",
    "#main",
    "body",
];

const UNTITLED: &str = "Untitled";

static CONTAINERS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    CONTAINER_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});
static BLOCKS: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse(&BLOCK_TAGS.join(", ")).ok());
static TITLE: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse("title").ok());
static HEADINGS: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").ok());
static OG_TITLE: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:title"]"#).ok());
static PARAGRAPHS: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse("p").ok());

/// Thresholds for extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// A block qualifies when its text is longer than this.
    pub min_block_chars: usize,
    /// A fallback line qualifies when it is longer than this.
    pub min_line_chars: usize,
    /// Content is capped at this many characters, then `...` is appended.
    pub max_content_chars: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

impl From<&FetchConfig> for ExtractOptions {
    fn from(config: &FetchConfig) -> Self {
        Self {
            min_block_chars: config.min_block_chars,
            min_line_chars: config.min_line_chars,
            max_content_chars: config.max_content_chars,
        }
    }
}

/// What [`extract_page`] finds in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: String,
    /// Normalized body text; empty when the page has none.
    pub content: String,
    /// Qualifying `<p>` texts, normalized, in document order.
    pub paragraphs: Vec<String>,
}

/// Extract title, body text and paragraphs from an HTML document.
pub fn extract_page(html: &str, options: &ExtractOptions) -> ExtractedPage {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let parts = match container_blocks(&document, options.min_block_chars) {
        Some(blocks) => blocks,
        None => fallback_lines(&document, options.min_line_chars),
    };
    let content = cap_chars(&normalize_whitespace(&parts.join(" ")), options.max_content_chars);

    ExtractedPage {
        title,
        content,
        paragraphs: paragraphs(&document, options.min_block_chars),
    }
}

/// Collapse every whitespace run to one space and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_title(document: &Html) -> String {
    let from_title = select_first_text(document, &TITLE);
    let from_heading = || select_first_text(document, &HEADINGS);
    let from_og = || {
        OG_TITLE.as_ref().and_then(|sel| {
            document
                .select(sel)
                .filter_map(|meta| meta.value().attr("content"))
                .map(normalize_whitespace)
                .find(|t| !t.is_empty())
        })
    };

    from_title
        .or_else(from_heading)
        .or_else(from_og)
        .unwrap_or_else(|| UNTITLED.to_string())
}

fn select_first_text(document: &Html, selector: &Option<Selector>) -> Option<String> {
    let selector = selector.as_ref()?;
    document
        .select(selector)
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

/// Blocks from the first container selector that yields any.
fn container_blocks(document: &Html, min_chars: usize) -> Option<Vec<String>> {
    let blocks = BLOCKS.as_ref()?;
    for container_selector in CONTAINERS.iter() {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for container in document.select(container_selector) {
            if is_stripped(container) {
                continue;
            }
            for block in container.select(blocks) {
                if !seen.insert(block.id()) || is_stripped(block) {
                    continue;
                }
                let text = normalize_whitespace(&own_text(block));
                if text.chars().count() > min_chars {
                    found.push(text);
                }
            }
        }
        if !found.is_empty() {
            return Some(found);
        }
    }
    None
}

/// Whole-document visible text, split into lines, keeping the longer ones.
fn fallback_lines(document: &Html, min_chars: usize) -> Vec<String> {
    visible_text(document.root_element())
        .lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > min_chars)
        .map(str::to_string)
        .collect()
}

fn paragraphs(document: &Html, min_chars: usize) -> Vec<String> {
    let Some(selector) = PARAGRAPHS.as_ref() else {
        return Vec::new();
    };
    document
        .select(selector)
        .filter(|p| !is_stripped(*p))
        .map(|p| normalize_whitespace(&visible_text(p)))
        .filter(|t| t.chars().count() > min_chars)
        .collect()
}

fn is_block_tag(name: &str) -> bool {
    BLOCK_TAGS.contains(&name)
}

/// Text of a block, excluding text inside nested blocks.
fn own_text(block: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_own_text(block, &mut out);
    out
}

fn collect_own_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if STRIPPED_TAGS.contains(&el.name()) => {}
            // nested blocks are emitted on their own
            Node::Element(el) if is_block_tag(el.name()) => out.push(' '),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_own_text(child, out);
                }
            }
            _ => {}
        }
    }
}

/// Whether the element or one of its ancestors is page chrome.
fn is_stripped(element: ElementRef<'_>) -> bool {
    STRIPPED_TAGS.contains(&element.value().name())
        || element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| STRIPPED_TAGS.contains(&a.value().name()))
}

/// Concatenated text below `element`, skipping stripped subtrees.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if !STRIPPED_TAGS.contains(&el.name()) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }
}

fn cap_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(html: &str) -> ExtractedPage {
        extract_page(html, &ExtractOptions::default())
    }

    #[test]
    fn test_title_precedence() {
        let page = extract(
            "<html><head><title> Main  Title </title></head><body><h1>Heading</h1></body></html>",
        );
        assert_eq!(page.title, "Main Title");

        let page = extract("<html><body><h2>Only a heading</h2></body></html>");
        assert_eq!(page.title, "Only a heading");

        let page = extract(
            r#"<html><head><meta property="og:title" content="OG Title"></head><body></body></html>"#,
        );
        assert_eq!(page.title, "OG Title");

        assert_eq!(extract("<html><body></body></html>").title, "Untitled");
    }

    #[test]
    fn test_article_preferred_over_body() {
        let html = r#"<html><body>
            <div>This sidebar-ish div has more than twenty characters.</div>
            <article><p>The article paragraph is the real content here.</p></article>
        </body></html>"#;
        let page = extract(html);
        assert_eq!(page.content, "The article paragraph is the real content here.");
    }

    #[test]
    fn test_chrome_and_scripts_ignored() {
        let html = r#"<html><body>
            <nav><li>Navigation entry that is quite long indeed</li></nav>
            <script>var tracking = "a very long script string value";</script>
            <main>
              <p>Main content paragraph with enough characters.</p>
              <footer><p>Footer paragraph that should be dropped too.</p></footer>
            </main>
        </body></html>"#;
        let page = extract(html);
        assert_eq!(page.content, "Main content paragraph with enough characters.");
        assert_eq!(page.paragraphs, vec!["Main content paragraph with enough characters."]);
    }

    #[test]
    fn test_nested_blocks_not_duplicated() {
        let html = r#"<html><body><article>
            <div><div><p>Deeply nested paragraph with real content.</p></div></div>
        </article></body></html>"#;
        let page = extract(html);
        assert_eq!(page.content, "Deeply nested paragraph with real content.");
    }

    #[test]
    fn test_block_text_around_nested_blocks_kept() {
        let html = r#"<html><body><article>
            <div>Revenue grew 42 percent year over year to <b>3.1 billion</b> dollars.<p>See chart.</p></div>
            <p>Analysts expect continued growth through the next decade.</p>
        </article></body></html>"#;
        let page = extract(html);
        assert_eq!(
            page.content,
            "Revenue grew 42 percent year over year to 3.1 billion dollars. \
             Analysts expect continued growth through the next decade."
        );
    }

    #[test]
    fn test_short_blocks_skipped_and_whitespace_normalized() {
        let html = r#"<html><body><main>
            <p>Too short.</p>
            <li>A list item   that is
                long enough to keep.</li>
        </main></body></html>"#;
        let page = extract(html);
        assert_eq!(page.content, "A list item that is long enough to keep.");
    }

    #[test]
    fn test_fallback_to_lines() {
        let html = "<html><body><span>tiny</span>\n<span>A line of loose text in a span</span>\n</body></html>";
        let page = extract(html);
        assert_eq!(page.content, "A line of loose text in a span");
    }

    #[test]
    fn test_content_capped_with_marker() {
        let html = format!("<html><body><p>{}</p></body></html>", "word ".repeat(50));
        let page = extract_page(&html, &ExtractOptions {
            max_content_chars: 20,
            ..ExtractOptions::default()
        });
        assert_eq!(page.content, format!("{}...", &"word ".repeat(4)));
    }

    #[test]
    fn test_empty_page_has_no_content() {
        let page = extract("<html><head><style>body{}</style></head><body></body></html>");
        assert!(page.content.is_empty());
        assert!(page.paragraphs.is_empty());
    }
}
