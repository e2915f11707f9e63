//! Find diagram blocks in HTML and Markdown documents and inline them as SVG.

use std::ops::Range;
use std::path::Path;

use log::{debug, info};
use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};

use crate::config::HostConfig;
use crate::mermaid::{RenderOptions, render_diagram_with_outcome};
use crate::xml::unescape_html_lenient;

/// The class token and fence language that mark a diagram block.
pub const DIAGRAM_MARKER: &str = "mermaid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Html,
    Markdown,
}

impl DocumentKind {
    /// Infer the kind from a file extension, `None` for anything else.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "html" | "htm" | "php" => Some(Self::Html),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }
}

/// A diagram found in a document.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramBlock {
    /// Byte range of the whole element or fence, delimiters included.
    pub range: Range<usize>,
    /// Diagram source, already cleaned of markup.
    pub source: String,
}

#[derive(Debug, Clone, Default)]
pub struct HostOptions {
    pub render: RenderOptions,
    pub host: HostConfig,
}

/// Counts for one converted document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostReport {
    pub blocks_found: usize,
    pub converted: usize,
    pub placeholders: usize,
    pub scripts_removed: usize,
}

impl HostReport {
    pub fn changed(&self) -> bool {
        self.converted > 0 || self.scripts_removed > 0
    }
}

#[derive(Debug, Clone)]
pub struct Conversion {
    pub content: String,
    pub report: HostReport,
}

/// Locate every diagram block, in document order.
pub fn find_blocks(content: &str, kind: DocumentKind) -> Vec<DiagramBlock> {
    match kind {
        DocumentKind::Html => find_html_blocks(content),
        DocumentKind::Markdown => find_markdown_blocks(content),
    }
}

/// Replace every diagram block with inline SVG.
///
/// Blocks are spliced back to front so earlier offsets stay valid. Runtime
/// diagram scripts are removed from HTML once at least one block converted.
pub fn convert_document(content: &str, kind: DocumentKind, options: &HostOptions) -> Conversion {
    let blocks = find_blocks(content, kind);
    let mut report = HostReport {
        blocks_found: blocks.len(),
        ..HostReport::default()
    };

    let mut output = content.to_string();
    for block in blocks.iter().rev() {
        let (svg, outcome) = render_diagram_with_outcome(&block.source, &options.render);
        debug!(offset = block.range.start, outcome:?; "Converted diagram block");
        if outcome.is_placeholder() {
            report.placeholders += 1;
        }

        let replacement = match kind {
            DocumentKind::Html => wrap_svg(&svg, &options.host),
            DocumentKind::Markdown => {
                let trailing = if content[block.range.clone()].ends_with('\n') {
                    "\n"
                } else {
                    ""
                };
                format!("{}{trailing}", wrap_svg(&svg, &options.host))
            }
        };
        output.replace_range(block.range.clone(), &replacement);
        report.converted += 1;
    }

    if kind == DocumentKind::Html && report.converted > 0 && options.host.remove_scripts {
        let (stripped, removed) = remove_diagram_scripts(&output);
        output = stripped;
        report.scripts_removed = removed;
    }

    info!(
        found = report.blocks_found,
        converted = report.converted,
        placeholders = report.placeholders,
        scripts_removed = report.scripts_removed;
        "Document processed"
    );

    Conversion {
        content: output,
        report,
    }
}

fn wrap_svg(svg: &str, host: &HostConfig) -> String {
    let mut html = format!(
        r#"<div class="{}" style="{}">"#,
        host.wrapper_class,
        crate::xml::escape_xml(&host.wrapper_style)
    );
    if !host.caption.is_empty() {
        html.push_str(&format!(
            r#"<div style="margin-bottom: 10px; font-size: 12px; color: #6c757d; text-transform: uppercase; letter-spacing: 1px;">{}</div>"#,
            crate::xml::escape_xml(&host.caption)
        ));
    }
    html.push_str(svg);
    html.push_str("</div>");
    html
}

// ============================================
// HTML
// ============================================

/// An opening or closing tag found by [`next_tag`].
#[derive(Debug)]
struct TagSpan<'a> {
    start: usize,
    end: usize,
    name: String,
    closing: bool,
    /// Raw text between the name and `>`.
    attrs: &'a str,
}

/// Next tag at or after `from`, skipping comments.
fn next_tag(html: &str, from: usize) -> Option<TagSpan<'_>> {
    let bytes = html.as_bytes();
    let mut pos = from;

    while let Some(offset) = html.get(pos..)?.find('<') {
        let start = pos + offset;
        if html[start..].starts_with("<!--") {
            pos = match html[start..].find("-->") {
                Some(end) => start + end + 3,
                None => return None,
            };
            continue;
        }

        let closing = bytes.get(start + 1) == Some(&b'/');
        let name_start = start + 1 + usize::from(closing);
        let name_len = html[name_start..]
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric())
            .count();
        if name_len == 0 {
            pos = start + 1;
            continue;
        }

        let end = find_tag_end(html, name_start + name_len)?;
        return Some(TagSpan {
            start,
            end,
            name: html[name_start..name_start + name_len].to_ascii_lowercase(),
            closing,
            attrs: &html[name_start + name_len..end - 1],
        });
    }
    None
}

/// Position just past the `>` closing a tag, honouring quoted attribute values.
fn find_tag_end(html: &str, from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in html[from..].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(from + i + 1),
            _ => {}
        }
    }
    None
}

/// Value of an attribute in a raw attribute string.
fn attribute<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    let lower = attrs.to_ascii_lowercase();
    let mut search = 0;
    while let Some(found) = lower[search..].find(name) {
        let at = search + found;
        search = at + name.len();

        let boundary = at == 0 || lower.as_bytes()[at - 1].is_ascii_whitespace();
        let rest = attrs[search..].trim_start();
        if !boundary || !rest.starts_with('=') {
            continue;
        }
        let value = rest[1..].trim_start();
        return match value.chars().next() {
            Some(q @ ('"' | '\'')) => value[1..].find(q).map(|end| &value[1..1 + end]),
            _ => Some(value.split_whitespace().next().unwrap_or("")),
        };
    }
    None
}

fn has_diagram_class(attrs: &str) -> bool {
    attribute(attrs, "class")
        .is_some_and(|class| class.split_whitespace().any(|token| token == DIAGRAM_MARKER))
}

fn find_html_blocks(html: &str) -> Vec<DiagramBlock> {
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(tag) = next_tag(html, pos) {
        pos = tag.end;
        if tag.closing {
            continue;
        }
        if is_raw_text(&tag.name) {
            if let Some((_, end)) = matching_close(html, &tag.name, tag.end) {
                pos = end;
            }
            continue;
        }
        let is_container = tag.name == "div" || tag.name == "pre";
        if !is_container || !has_diagram_class(tag.attrs) {
            continue;
        }

        let Some((inner_end, block_end)) = matching_close(html, &tag.name, tag.end) else {
            debug!(offset = tag.start; "Diagram element is never closed, leaving it alone");
            continue;
        };

        blocks.push(DiagramBlock {
            range: tag.start..block_end,
            source: clean_html_source(&html[tag.end..inner_end]),
        });
        pos = block_end;
    }

    blocks
}

/// Elements whose body is not markup.
fn is_raw_text(name: &str) -> bool {
    name == "script" || name == "style"
}

/// Start and end of the tag closing an element opened just before `from`.
fn matching_close(html: &str, name: &str, from: usize) -> Option<(usize, usize)> {
    if is_raw_text(name) {
        // ASCII lowercasing keeps byte offsets intact
        let needle = format!("</{name}");
        let start = from + html[from..].to_ascii_lowercase().find(&needle)?;
        let end = find_tag_end(html, start + needle.len())?;
        return Some((start, end));
    }

    let mut depth = 1usize;
    let mut pos = from;
    while let Some(tag) = next_tag(html, pos) {
        pos = tag.end;
        if tag.name != name {
            continue;
        }
        if tag.closing {
            depth -= 1;
            if depth == 0 {
                return Some((tag.start, tag.end));
            }
        } else if !tag.attrs.trim_end().ends_with('/') {
            depth += 1;
        }
    }
    None
}

/// Strip inner markup and resolve entities, leaving plain diagram source.
pub fn clean_html_source(inner: &str) -> String {
    let mut text = String::with_capacity(inner.len());
    let mut pos = 0;
    while let Some(tag) = next_tag(inner, pos) {
        text.push_str(&inner[pos..tag.start]);
        if tag.name == "br" {
            text.push('\n');
        }
        pos = tag.end;
    }
    text.push_str(&inner[pos..]);

    unescape_html_lenient(&text).trim().to_string()
}

/// Remove `<script>` elements that only exist to render diagrams at view time.
///
/// Returns the new content and how many scripts were dropped.
pub fn remove_diagram_scripts(html: &str) -> (String, usize) {
    let mut output = String::with_capacity(html.len());
    let mut removed = 0;
    let mut copied_to = 0;
    let mut pos = 0;

    while let Some(tag) = next_tag(html, pos) {
        pos = tag.end;
        if tag.closing || tag.name != "script" {
            continue;
        }
        let Some((body_end, script_end)) = matching_close(html, "script", tag.end) else {
            break;
        };
        pos = script_end;

        let body = html[tag.end..body_end].to_ascii_lowercase();
        let loads_library = tag.attrs.to_ascii_lowercase().contains(DIAGRAM_MARKER);
        let drives_library = body.contains("mermaid.initialize")
            || body.contains("mermaid.run")
            || has_mermaid_import(&body);
        if !(loads_library || drives_library) {
            continue;
        }

        output.push_str(&html[copied_to..tag.start]);
        copied_to = script_end;
        // drop the line the script sat on when nothing else is on it
        let trimmed = output.trim_end_matches([' ', '\t']).len();
        if output[..trimmed].ends_with('\n') && html[script_end..].starts_with('\n') {
            output.truncate(trimmed);
            copied_to += 1;
        }
        removed += 1;
        debug!(offset = tag.start; "Removed diagram runtime script");
    }

    output.push_str(&html[copied_to..]);
    (output, removed)
}

fn has_mermaid_import(body: &str) -> bool {
    body.match_indices("import").any(|(i, _)| {
        let rest = &body[i + "import".len()..];
        rest.starts_with(char::is_whitespace) && rest.trim_start().starts_with(DIAGRAM_MARKER)
    })
}

// ============================================
// MARKDOWN
// ============================================

fn find_markdown_blocks(markdown: &str) -> Vec<DiagramBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<(Range<usize>, String)> = None;

    for (event, range) in Parser::new(markdown).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                let lang = info.split_whitespace().next().unwrap_or("");
                if lang.eq_ignore_ascii_case(DIAGRAM_MARKER) {
                    current = Some((range, String::new()));
                }
            }
            Event::Text(text) => {
                if let Some((_, source)) = current.as_mut() {
                    source.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((range, source)) = current.take() {
                    blocks.push(DiagramBlock {
                        range,
                        source: source.trim().to_string(),
                    });
                }
            }
            _ => {}
        }
    }

    blocks
}
