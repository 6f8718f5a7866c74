//! Formatting of completion-service replies.
//!
//! The completion service answers in a small Markdown subset: `**bold**` spans, `##` headings,
//! `- ` / `* ` bullet lines and plain newlines. This module parses that subset into a flat tree
//! of [`Node`]s once, then renders the same tree two ways:
//!
//! - [`FormattedResponse::to_html`] produces escaped HTML for on-screen display.
//! - [`FormattedResponse::to_plain_text`] produces structured plain text for clipboard copy,
//!   `.txt` export and PDF pagination.
//!
//! Neither rendering can fail. Empty input renders as [`NO_INFORMATION_PLACEHOLDER`] in HTML
//! and as an empty string in plain text.
//!
//! Newline handling follows one rule: a newline becomes a [`Node::LineBreak`] unless the line
//! before it is a list item or the line after it is a heading or list item. Those newlines are
//! absorbed by the block structure.

use crate::constants::NO_INFORMATION_PLACEHOLDER;
use regex::Regex;
use std::sync::LazyLock;

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern is valid"));

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("newline pattern is valid"));

static LINE_BREAK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("line break pattern is valid"));

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>?").expect("tag pattern is valid"));

/// A run of text inside a heading or list item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Bold(String),
}

impl Inline {
    fn text(&self) -> &str {
        match self {
            Inline::Text(t) | Inline::Bold(t) => t,
        }
    }
}

/// One bullet of a [`Node::List`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListItem {
    pub content: Vec<Inline>,
}

impl ListItem {
    /// Text content with bold markers dropped.
    pub fn text(&self) -> String {
        inline_text(&self.content)
    }
}

/// Top-level element of a formatted reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Heading(Vec<Inline>),
    Bold(String),
    PlainText(String),
    LineBreak,
    List(Vec<ListItem>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Line<'a> {
    Heading(&'a str),
    Item(&'a str),
    Text(&'a str),
}

impl<'a> Line<'a> {
    fn classify(line: &'a str) -> Self {
        if let Some(rest) = line.strip_prefix("##") {
            Line::Heading(rest.trim_start())
        } else if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            Line::Item(rest)
        } else {
            Line::Text(line)
        }
    }

    fn is_item(&self) -> bool {
        matches!(self, Line::Item(_))
    }

    fn is_block(&self) -> bool {
        matches!(self, Line::Heading(_) | Line::Item(_))
    }
}

/// A completion reply parsed into its node tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormattedResponse {
    nodes: Vec<Node>,
}

impl FormattedResponse {
    /// Parse `source` into a node tree.
    ///
    /// Empty input yields an empty response; whitespace-only input is ordinary text.
    /// Unterminated `**` markers are kept as literal text.
    pub fn parse(source: &str) -> Self {
        if source.is_empty() {
            return Self::default();
        }

        let normalized = source.replace("\r\n", "\n");
        let lines: Vec<Line<'_>> = normalized.split('\n').map(Line::classify).collect();
        let mut nodes: Vec<Node> = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            let prev_is_item = i > 0 && lines[i - 1].is_item();
            if i > 0 && !prev_is_item && !line.is_block() {
                nodes.push(Node::LineBreak);
            }

            match *line {
                Line::Heading(rest) => nodes.push(Node::Heading(parse_inlines(rest))),
                Line::Item(rest) => {
                    let item = ListItem {
                        content: parse_inlines(rest),
                    };
                    match nodes.last_mut() {
                        Some(Node::List(items)) if prev_is_item => items.push(item),
                        _ => nodes.push(Node::List(vec![item])),
                    }
                }
                Line::Text(text) => {
                    nodes.extend(parse_inlines(text).into_iter().map(|inline| match inline {
                        Inline::Text(t) => Node::PlainText(t),
                        Inline::Bold(t) => Node::Bold(t),
                    }));
                }
            }
        }

        Self { nodes }
    }

    /// Parse an optional reply; `None` behaves like empty input.
    pub fn from_optional(source: Option<&str>) -> Self {
        source.map(Self::parse).unwrap_or_default()
    }

    /// Wrap text that should not be interpreted as Markdown, keeping its line breaks.
    pub fn plain(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }

        let mut nodes = Vec::new();
        for (i, line) in text.replace("\r\n", "\n").split('\n').enumerate() {
            if i > 0 {
                nodes.push(Node::LineBreak);
            }
            if !line.is_empty() {
                nodes.push(Node::PlainText(line.to_string()));
            }
        }
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Render as escaped HTML.
    ///
    /// Headings become `<h3><u>…</u></h3>`, bold spans `<strong>…</strong>`, lists a single
    /// `<ul>` of `<li>` items, and remaining newlines `<br/>`.
    pub fn to_html(&self) -> String {
        if self.nodes.is_empty() {
            return NO_INFORMATION_PLACEHOLDER.to_string();
        }

        let mut html = String::new();
        for node in &self.nodes {
            match node {
                Node::Heading(content) => {
                    html.push_str("<h3><u>");
                    push_inlines_html(&mut html, content);
                    html.push_str("</u></h3>");
                }
                Node::Bold(text) => {
                    html.push_str("<strong>");
                    html.push_str(&escape_html(text));
                    html.push_str("</strong>");
                }
                Node::PlainText(text) => html.push_str(&escape_html(text)),
                Node::LineBreak => html.push_str("<br/>"),
                Node::List(items) => {
                    html.push_str("<ul>");
                    for item in items {
                        html.push_str("<li>");
                        push_inlines_html(&mut html, &item.content);
                        html.push_str("</li>");
                    }
                    html.push_str("</ul>");
                }
            }
        }
        html
    }

    /// Render as structured plain text.
    ///
    /// Headings are written as `## text` on their own line, bold spans keep their `**`
    /// markers, and list items are written as `  - text` with a blank line around the list.
    pub fn to_plain_text(&self) -> String {
        let mut writer = PlainTextWriter::default();
        for node in &self.nodes {
            match node {
                Node::Heading(content) => writer.heading(&inline_text(content)),
                Node::Bold(text) => writer.inline(&format!("**{text}**")),
                Node::PlainText(text) => writer.inline(text),
                Node::LineBreak => writer.line_break(),
                Node::List(items) => writer.list(items),
            }
        }
        writer.finish()
    }
}

/// Format a raw completion reply as HTML.
///
/// Missing or empty replies yield the placeholder text.
pub fn format_response(source: Option<&str>) -> String {
    FormattedResponse::from_optional(source).to_html()
}

/// Format a raw completion reply as structured plain text.
///
/// Missing or empty replies yield an empty string.
pub fn response_plain_text(source: Option<&str>) -> String {
    FormattedResponse::from_optional(source).to_plain_text()
}

/// Reduce rendered reply HTML back to text: `<br/>` becomes a newline and every other tag is
/// dropped. Entities are left as they are.
pub fn strip_tags(html: &str) -> String {
    let with_newlines = LINE_BREAK_TAG.replace_all(html, "\n");
    TAG.replace_all(&with_newlines, "").into_owned()
}

fn parse_inlines(line: &str) -> Vec<Inline> {
    let mut inlines = Vec::new();
    let mut last = 0;

    for caps in BOLD.captures_iter(line) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            inlines.push(Inline::Text(line[last..whole.start()].to_string()));
        }
        inlines.push(Inline::Bold(inner.as_str().to_string()));
        last = whole.end();
    }
    if last < line.len() {
        inlines.push(Inline::Text(line[last..].to_string()));
    }

    inlines
}

fn inline_text(content: &[Inline]) -> String {
    content
        .iter()
        .map(Inline::text)
        .collect::<String>()
        .trim()
        .to_string()
}

fn push_inlines_html(html: &mut String, content: &[Inline]) {
    for inline in content {
        match inline {
            Inline::Text(t) => html.push_str(&escape_html(t)),
            Inline::Bold(t) => {
                html.push_str("<strong>");
                html.push_str(&escape_html(t));
                html.push_str("</strong>");
            }
        }
    }
}

fn escape_html(text: &str) -> String {
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

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

#[derive(Default)]
struct PlainTextWriter {
    out: String,
    // The last thing written was a heading or list, which already ended its line.
    after_block: bool,
}

impl PlainTextWriter {
    fn at_line_start(&self) -> bool {
        self.out.is_empty() || self.out.ends_with('\n')
    }

    fn inline(&mut self, text: &str) {
        let collapsed = collapse_whitespace(text);
        let piece = if self.at_line_start() {
            collapsed.trim_start()
        } else {
            collapsed.as_str()
        };
        if piece.is_empty() {
            return;
        }
        self.out.push_str(piece);
        self.after_block = false;
    }

    fn line_break(&mut self) {
        if self.after_block {
            self.after_block = false;
            return;
        }
        self.out.push('\n');
    }

    fn blank_line_before(&mut self) {
        if self.out.is_empty() {
            return;
        }
        while !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    fn heading(&mut self, text: &str) {
        self.blank_line_before();
        self.out.push_str("## ");
        self.out.push_str(text);
        self.out.push('\n');
        self.after_block = true;
    }

    fn list(&mut self, items: &[ListItem]) {
        self.blank_line_before();
        for item in items {
            self.out.push_str("  - ");
            self.out.push_str(&item.text());
            self.out.push('\n');
        }
        self.out.push('\n');
        self.after_block = true;
    }

    fn finish(self) -> String {
        let trimmed_lines = self
            .out
            .split('\n')
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n");
        EXCESS_NEWLINES
            .replace_all(&trimmed_lines, "\n\n")
            .trim_start_matches('\n')
            .trim_end()
            .to_string()
    }
}
