//! Image source rewriting for rendered pages.
//!
//! Every locally hosted image of a page lives in the page's sibling
//! `images/` directory, so any `<img src>` that is not already there and is
//! not external is pointed at `images/<basename>`.

use crate::images::{IMAGES_DIR, is_external};

/// Rewrites `<img>` sources to the flat `images/` layout.
///
/// Other markup is copied byte for byte. Applying the function to its own
/// output changes nothing.
pub fn rewrite_image_sources(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut copied = 0;
    let mut cursor = 0;

    while let Some(found) = find_img_tag(&html[cursor..]) {
        let tag_start = cursor + found;
        let tag_end = html[tag_start..]
            .find('>')
            .map_or(html.len(), |p| tag_start + p + 1);
        let tag = &html[tag_start..tag_end];

        if let Some((value_start, value_end)) = src_value(tag) {
            let src = &tag[value_start..value_end];
            if let Some(rewritten) = rewrite_source(src) {
                result.push_str(&html[copied..tag_start + value_start]);
                result.push_str(&rewritten);
                copied = tag_start + value_end;
            }
        }

        cursor = tag_end;
    }

    result.push_str(&html[copied..]);
    result
}

/// New source for a local image, or None when it stays as is.
///
/// Sources under `images/`, with or without a leading `./`, keep their
/// nested path since the image resolver copies them there unchanged.
pub fn rewrite_source(src: &str) -> Option<String> {
    if src.is_empty() || is_external(src) {
        return None;
    }

    if let Some(stripped) = src.strip_prefix("./") {
        if stripped.starts_with("images/") {
            return Some(stripped.to_string());
        }
    } else if src.starts_with("images/") {
        return None;
    }

    let path = src.split(['?', '#']).next().unwrap_or(src);
    let basename = path.rsplit('/').next().filter(|b| !b.is_empty())?;

    Some(format!("{}/{}", IMAGES_DIR, basename))
}

/// Offset of the next `<img` tag opening, case insensitive.
fn find_img_tag(html: &str) -> Option<usize> {
    let bytes = html.as_bytes();
    let mut from = 0;
    while let Some(p) = html[from..].find('<') {
        let at = from + p;
        let name = bytes.get(at + 1..at + 4);
        let boundary = bytes.get(at + 4);
        if name.is_some_and(|n| n.eq_ignore_ascii_case(b"img"))
            && boundary.is_some_and(|b| b.is_ascii_whitespace() || *b == b'/' || *b == b'>')
        {
            return Some(at);
        }
        from = at + 1;
    }
    None
}

/// Byte range of the `src` attribute value inside one tag.
fn src_value(tag: &str) -> Option<(usize, usize)> {
    let lower = tag.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let mut from = 0;

    while let Some(p) = lower[from..].find("src") {
        let at = from + p;
        from = at + 3;

        if !bytes.get(at.wrapping_sub(1)).is_some_and(|b| b.is_ascii_whitespace()) {
            continue;
        }

        let mut i = at + 3;
        while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
            i += 1;
        }
        if bytes.get(i) != Some(&b'=') {
            continue;
        }
        i += 1;
        while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
            i += 1;
        }

        let quote = *bytes.get(i)?;
        if quote == b'"' || quote == b'\'' {
            let start = i + 1;
            let end = start + lower[start..].find(quote as char)?;
            return Some((start, end));
        }

        let start = i;
        let end = lower[start..]
            .find(|c: char| c.is_ascii_whitespace() || c == '>')
            .map_or(lower.len(), |p| start + p);
        let end = if lower[start..end].ends_with('/') && end == lower.len() - 1 {
            end - 1
        } else {
            end
        };
        return Some((start, end));
    }

    None
}
