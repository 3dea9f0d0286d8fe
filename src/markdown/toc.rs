//! Table of contents extraction from rendered HTML.

/// Heading levels listed in the table of contents.
const TOC_LEVELS: std::ops::RangeInclusive<u8> = 2..=3;

/// One linked heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub level: u8,
    pub id: String,
    /// Heading text, still HTML escaped.
    pub text: String,
}

/// Collects level 2 and 3 headings that carry an id.
///
/// Works on the HTML produced by [`super::MarkdownRenderer`], where comrak
/// places the slug on the permalink anchor inside the heading. Headings
/// without any id (raw HTML in the source) are skipped.
pub fn table_of_contents(html: &str) -> Vec<TocEntry> {
    let mut entries = Vec::new();
    let mut cursor = 0;

    while let Some(found) = html[cursor..].find("<h") {
        let start = cursor + found;
        cursor = start + 2;

        let bytes = html.as_bytes();
        let Some(level) = bytes.get(start + 2).and_then(|b| (*b as char).to_digit(10)) else {
            continue;
        };
        let level = level as u8;
        if !TOC_LEVELS.contains(&level) {
            continue;
        }
        if !matches!(bytes.get(start + 3), Some(b'>' | b' ')) {
            continue;
        }

        let close_tag = format!("</h{}>", level);
        let Some(close) = html[start..].find(&close_tag).map(|p| start + p) else {
            continue;
        };
        let Some(open_end) = html[start..close].find('>').map(|p| start + p + 1) else {
            continue;
        };

        let heading = &html[start..close];
        if let Some(id) = attribute(heading, "id") {
            let text = strip_tags(&html[open_end..close]);
            if !text.is_empty() {
                entries.push(TocEntry {
                    level,
                    id: id.to_string(),
                    text,
                });
            }
        }

        cursor = close + close_tag.len();
    }

    entries
}

/// First double quoted value of `name` within a markup fragment.
fn attribute<'h>(fragment: &'h str, name: &str) -> Option<&'h str> {
    let needle = format!(" {}=\"", name);
    let value_start = fragment.find(&needle)? + needle.len();
    let value_end = fragment[value_start..].find('"')? + value_start;
    Some(&fragment[value_start..value_end])
}

fn strip_tags(fragment: &str) -> String {
    let mut text = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.trim().to_string()
}
