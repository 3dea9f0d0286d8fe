//! Markdown rendering with GitHub Flavored Markdown support.
//!
//! This module provides markdown rendering using comrak with GFM extensions
//! (tables, strikethrough, autolinks, task lists), syntect code
//! highlighting, and table of contents extraction from rendered headings.

mod renderer;
mod toc;

pub use renderer::MarkdownRenderer;
pub use toc::{TocEntry, table_of_contents};
