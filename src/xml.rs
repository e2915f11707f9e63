use std::borrow::Cow;

use quick_xml::escape::{EscapeError, unescape, unescape_with};

/// XML 1.0 valid char ranges:
/// - 0x09, 0x0A, 0x0D
/// - 0x20..=0xD7FF
/// - 0xE000..=0xFFFD
/// - 0x10000..=0x10FFFF
fn is_valid_xml_char(c: char) -> bool {
    matches!(
        c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF
    )
}

/// Characters left in `text` once escaping drops what XML cannot carry.
pub fn sanitized_char_count(text: &str) -> usize {
    text.chars().filter(|&c| is_valid_xml_char(c)).count()
}

/// Escape the five reserved markup characters, dropping chars XML cannot carry.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if !is_valid_xml_char(c) {
            continue;
        }
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Strict inverse of [`escape_xml`] for the predefined and numeric entities.
pub fn unescape_xml(text: &str) -> Result<String, EscapeError> {
    unescape(text).map(Cow::into_owned)
}

/// Named entities that show up in hand-written HTML diagram blocks.
fn html_entity(name: &str) -> Option<&'static str> {
    match name {
        "nbsp" => Some(" "),
        "ndash" => Some("\u{2013}"),
        "mdash" => Some("\u{2014}"),
        "hellip" => Some("\u{2026}"),
        "rarr" => Some("\u{2192}"),
        "larr" => Some("\u{2190}"),
        "harr" => Some("\u{2194}"),
        "copy" => Some("\u{a9}"),
        "reg" => Some("\u{ae}"),
        "times" => Some("\u{d7}"),
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "quot" => Some("\""),
        "apos" => Some("'"),
        _ => None,
    }
}

/// Unescape entities in HTML text, leaving anything unrecognised untouched.
///
/// Diagram sources embedded in pages are frequently half-escaped (`A --&gt; B & C`),
/// so a bare `&` or an unknown entity is kept verbatim instead of failing the block.
pub fn unescape_html_lenient(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let entity_end = tail
            .char_indices()
            .take(12)
            .find(|&(_, c)| c == ';')
            .map(|(i, _)| i);

        match entity_end {
            Some(end) => {
                let candidate = &tail[..=end];
                match unescape_with(candidate, html_entity) {
                    Ok(resolved) => {
                        out.push_str(&resolved);
                        rest = &tail[end + 1..];
                    }
                    Err(_) => {
                        out.push('&');
                        rest = &tail[1..];
                    }
                }
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}
