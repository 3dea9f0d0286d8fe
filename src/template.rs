//! Page layout for the built-in renderer.

use maud::{DOCTYPE, Markup, PreEscaped, html};

use crate::markdown::TocEntry;

const PAGE_CSS: &str = include_str!("../assets/page.css");

/// Wraps a rendered Markdown fragment in a standalone HTML document.
///
/// Styles are inlined so published pages need no asset directory. The table
/// of contents block is omitted when `toc` is empty.
///
/// # Arguments
///
/// * `title`: Document title (plain text, escaped by maud)
/// * `toc`: Linked headings for the table of contents
/// * `body`: Rendered HTML fragment, inserted verbatim
pub fn page(title: &str, toc: &[TocEntry], body: &str) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(PAGE_CSS)) }
            }
            body {
                @if !toc.is_empty() {
                    nav class="toc-container" {
                        h3 class="toc-header" { "Table of Contents" }
                        ul class="toc-list" {
                            @for entry in toc {
                                li class=(format!("toc-item toc-level-{}", entry.level)) {
                                    a class="toc-link" href=(format!("#{}", entry.id)) {
                                        (PreEscaped(&entry.text))
                                    }
                                }
                            }
                        }
                    }
                }
                article class="markdown-body" {
                    (PreEscaped(body))
                }
            }
        }
    }
}
