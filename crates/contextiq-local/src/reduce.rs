//! HTML-to-text reduction shared by every web path.
//!
//! The hosted-extraction path and the relay-proxy path both feed arbitrary
//! HTML through this module, so identical input owes identical output no
//! matter which endpoint produced the body.

use crate::normalize;
use scraper::{ElementRef, Html, Selector};

/// Tags whose subtrees never contribute analyzable content. Removed before
/// any text extraction happens.
const STRIP_TAGS: &[&str] = &["script", "style", "noscript", "nav", "header", "footer"];

/// Main-content candidates, tried in order; the first match wins and multiple
/// matches are never merged.
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[class*=\"content\"]",
    "[id*=\"content\"]",
    "[role=\"main\"]",
    ".post-content",
    ".entry-content",
    ".main-content",
    "#main",
];

/// Best-effort stripper for `<tag ...> ... </tag>` blocks.
///
/// Conservative on malformed input: a block is only removed when its close tag
/// exists, and tag names match ASCII-case-insensitively.
fn strip_tag_blocks(html: &str, tag: &str) -> String {
    let tag_lc = tag.to_ascii_lowercase();
    let open_pat = format!("<{}", tag_lc);
    let close_pat = format!("</{}>", tag_lc);

    let mut out = String::new();
    let mut i = 0usize;
    let lower = html.to_ascii_lowercase();
    while let Some(rel_start) = lower[i..].find(&open_pat) {
        let start = i + rel_start;
        let after_open = start + open_pat.len();
        if let Some(rel_end) = lower[after_open..].find(&close_pat) {
            let end = after_open + rel_end + close_pat.len();
            out.push_str(&html[i..start]);
            i = end;
        } else {
            // No close tag; stop stripping.
            break;
        }
    }
    out.push_str(&html[i..]);
    out
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

fn first_content_container(doc: &Html) -> Option<String> {
    for raw in CONTENT_SELECTORS {
        let Ok(sel) = Selector::parse(raw) else {
            continue;
        };
        if let Some(el) = doc.select(&sel).next() {
            return Some(element_text(&el));
        }
    }
    None
}

fn body_text(doc: &Html) -> String {
    if let Ok(sel) = Selector::parse("body") {
        if let Some(el) = doc.select(&sel).next() {
            return element_text(&el);
        }
    }
    doc.root_element().text().collect::<Vec<_>>().join(" ")
}

/// Reduce raw HTML to analysis-ready plain text.
///
/// Boilerplate subtrees are dropped, the first main-content container (if any)
/// is flattened, entity decoding rides on the HTML parser, and whitespace runs
/// collapse to single spaces. Deterministic for identical input.
pub fn html_to_text(html: &str) -> String {
    let mut cleaned = html.to_string();
    for tag in STRIP_TAGS {
        cleaned = strip_tag_blocks(&cleaned, tag);
    }

    let doc = Html::parse_document(&cleaned);
    let container = first_content_container(&doc).filter(|t| !t.trim().is_empty());
    let text = match container {
        Some(t) => t,
        None => body_text(&doc),
    };
    normalize::collapse_ws(&text)
}
