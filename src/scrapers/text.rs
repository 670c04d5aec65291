//! Visible-text extraction from rendered HTML.

use ego_tree::NodeRef;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node};

/// Elements whose whole subtree is dropped before text extraction.
pub const NOISE_ELEMENTS: [&str; 5] = ["header", "footer", "nav", "script", "style"];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Elements that start a new line of text; a space separates their content
/// from the surrounding text. Inline elements (`b`, `span`, `sup`, ...) add
/// nothing, so words split by markup stay whole.
const BLOCK_ELEMENTS: [&str; 30] = [
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt",
    "figcaption", "figure", "form", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li",
    "main", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

enum Step<'a> {
    Visit(NodeRef<'a, Node>),
    Separate,
}

/// Extract the text of `html` outside noise elements, whitespace collapsed.
///
/// Text nodes are copied as they are; block-level boundaries become a single
/// space. Comments, doctype and processing instructions are ignored.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::with_capacity(html.len() / 2);

    // Explicit stack: rendered pages can nest deeply enough to hurt recursion.
    let mut stack = vec![Step::Visit(document.tree.root())];
    while let Some(step) = stack.pop() {
        let node = match step {
            Step::Visit(node) => node,
            Step::Separate => {
                out.push(' ');
                continue;
            }
        };
        match node.value() {
            Node::Element(el) if NOISE_ELEMENTS.contains(&el.name()) => continue,
            Node::Element(el) if BLOCK_ELEMENTS.contains(&el.name()) => {
                out.push(' ');
                stack.push(Step::Separate);
            }
            Node::Text(text) => out.push_str(text),
            _ => {}
        }
        stack.extend(node.children().rev().map(Step::Visit));
    }

    WHITESPACE.replace_all(&out, " ").trim().to_string()
}
