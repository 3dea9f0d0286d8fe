//! Render repository Markdown to HTML and publish it to a docs branch.

mod config;
pub mod discover;
mod git;
pub mod images;
mod markdown;
pub mod postprocess;
pub mod publish;
pub mod render;
pub mod site;
mod template;

pub use config::{Config, UNKNOWN_BRANCH, UNKNOWN_REPOSITORY};
pub use discover::{DiscoverOptions, find_markdown_files};
pub use git::{Git, discover_workdir};
pub use images::{ImageRef, copy_images, find_images};
pub use markdown::{MarkdownRenderer, TocEntry, table_of_contents};
pub use postprocess::rewrite_image_sources;
pub use publish::{GitPublisher, Publish, PublishOutcome, PushTarget, Snapshot};
pub use render::{BuiltinRenderer, CommandRenderer, RenderError, Renderer, document_title};
pub use site::{BuildSummary, Document, RenderedPage, RunReport, build_site, convert_document, run};
