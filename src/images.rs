//! Image reference resolution for Markdown documents.
//!
//! A page's images always end up flat in a sibling `images/` directory of the
//! rendered HTML file. This module decides which files on disk belong there:
//! everything the document references (in Markdown or HTML syntax) that can
//! be found, plus any image sitting next to the document even if nothing
//! references it.

use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// Directory name images are published under, relative to the page.
pub const IMAGES_DIR: &str = "images";

/// Extensions picked up from the document directory without a reference.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp"];

static MARKDOWN_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[[^\]]*\]\(\s*<?([^)\s>]*)>?(?:\s+[^)]*)?\)").expect("valid regex")
});

static HTML_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*(?:"([^"]*)"|'([^']*)')[^>]*>"#).expect("valid regex")
});

/// Image file to publish alongside a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    source: PathBuf,
    destination: PathBuf,
}

impl ImageRef {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Existing file on disk.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Target path relative to the page directory, always under `images/`.
    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

/// Whether a reference points outside the repository.
///
/// Covers absolute web URLs, protocol relative URLs and inline data.
pub fn is_external(reference: &str) -> bool {
    reference.starts_with("http://")
        || reference.starts_with("https://")
        || reference.starts_with("//")
        || reference.starts_with("data:")
}

/// Whether a file name carries one of [`IMAGE_EXTENSIONS`].
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|i| ext.eq_ignore_ascii_case(i)))
}

/// Extracts raw image references in document order.
///
/// Markdown references come first, then HTML `<img>` tags.
pub fn image_references(content: &str) -> Vec<&str> {
    let markdown = MARKDOWN_IMAGE
        .captures_iter(content)
        .filter_map(|c| c.get(1));
    let html = HTML_IMAGE
        .captures_iter(content)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)));

    markdown
        .chain(html)
        .map(|m| m.as_str().trim())
        .filter(|r| !r.is_empty())
        .collect()
}

/// Resolves one reference against the document directory.
///
/// References already under `images/` keep their relative destination; all
/// others are flattened to `images/<basename>`. When the declared path does
/// not exist, a same-named file directly beside the document is tried.
pub fn resolve_reference(reference: &str, document_dir: &Path) -> Option<ImageRef> {
    if is_external(reference) {
        return None;
    }

    let reference = reference.strip_prefix("./").unwrap_or(reference);
    let basename = Path::new(reference).file_name()?;
    let flattened = Path::new(IMAGES_DIR).join(basename);

    let declared = document_dir.join(reference);
    if declared.is_file() {
        let destination = if reference.starts_with("images/") {
            PathBuf::from(reference)
        } else {
            flattened
        };
        return Some(ImageRef::new(declared, destination));
    }

    let beside = document_dir.join(basename);
    if beside.is_file() {
        return Some(ImageRef::new(beside, flattened));
    }

    None
}

/// Collects every image to publish with a document.
///
/// # Arguments
///
/// * `content`: Markdown text of the document
/// * `document_dir`: Directory containing the document on disk
///
/// # Returns
///
/// Resolved references followed by unreferenced images found beside the
/// document. Identical pairs appear once; destination collisions are kept.
pub fn find_images(content: &str, document_dir: &Path) -> Vec<ImageRef> {
    let mut images: Vec<ImageRef> = Vec::new();

    for reference in image_references(content) {
        match resolve_reference(reference, document_dir) {
            Some(image) => {
                debug!(
                    "  Found image: {} at {}",
                    reference,
                    image.source().display()
                );
                if !images.contains(&image) {
                    images.push(image);
                }
            }
            None if !is_external(reference) => {
                debug!("  Image not found: {}", reference);
            }
            None => {}
        }
    }

    for source in sibling_images(document_dir) {
        if images.iter().any(|i| i.source() == source) {
            continue;
        }
        if let Some(name) = source.file_name() {
            debug!("  Found unreferenced image: {}", source.display());
            let destination = Path::new(IMAGES_DIR).join(name);
            images.push(ImageRef::new(source, destination));
        }
    }

    images
}

/// Image files directly inside `dir`, sorted by name.
fn sibling_images(dir: &Path) -> Vec<PathBuf> {
    let read_dir = match fs::read_dir(if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    }) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut found: Vec<PathBuf> = read_dir
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .map(|e| dir.join(e.file_name()))
        .filter(|p| is_image_file(p))
        .collect();
    found.sort();
    found
}

/// Copies images below `page_dir`, creating directories as needed.
///
/// Later entries overwrite earlier ones with the same destination.
///
/// # Errors
///
/// Returns error if a directory cannot be created or a copy fails.
pub fn copy_images(images: &[ImageRef], page_dir: &Path) -> Result<()> {
    for image in images {
        let target = page_dir.join(image.destination());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::copy(image.source(), &target).with_context(|| {
            format!(
                "Failed to copy image {} to {}",
                image.source().display(),
                target.display()
            )
        })?;
        debug!(
            "  Copied image: {} to {}",
            image.source().display(),
            target.display()
        );
    }
    Ok(())
}
