//! Rendering pipeline: discover, convert, summarise, publish.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::discover::{DiscoverOptions, find_markdown_files};
use crate::images::{ImageRef, copy_images, find_images};
use crate::postprocess::rewrite_image_sources;
use crate::publish::{Publish, PublishOutcome};
use crate::render::{Renderer, document_title};

/// Markdown file read from the repository.
#[derive(Debug, Clone)]
pub struct Document {
    path: PathBuf,
    content: String,
}

impl Document {
    /// Reads `rel_path` below `root`.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read as UTF8 text.
    pub fn read(root: &Path, rel_path: impl Into<PathBuf>) -> Result<Self> {
        let path = rel_path.into();
        let content = fs::read_to_string(root.join(&path))
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self { path, content })
    }

    /// Path relative to the repository root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Page title from the first `# ` heading or the file name.
    pub fn title(&self) -> String {
        document_title(&self.path, &self.content)
    }

    /// Output location mirroring the document path with an `.html` extension.
    pub fn html_path(&self) -> PathBuf {
        self.path.with_extension("html")
    }
}

/// Page written to the output directory.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub source: PathBuf,
    pub output: PathBuf,
    pub title: String,
    pub images: Vec<ImageRef>,
}

/// Document that could not be converted.
#[derive(Debug, Clone)]
pub struct Failure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of converting all discovered documents.
#[derive(Debug, Default)]
pub struct BuildSummary {
    pub total: usize,
    pub pages: Vec<RenderedPage>,
    pub failures: Vec<Failure>,
}

impl BuildSummary {
    pub fn succeeded(&self) -> usize {
        self.pages.len()
    }
}

/// Converts one document and writes the page plus its images.
///
/// # Arguments
///
/// * `root`: Repository root the document path is relative to
/// * `rel_path`: Markdown file path relative to `root`
/// * `output_dir`: Site output directory
/// * `renderer`: Markdown to HTML converter
///
/// # Errors
///
/// Returns error if reading, rendering, writing or image copying fails.
pub fn convert_document(
    root: &Path,
    rel_path: &Path,
    output_dir: &Path,
    renderer: &dyn Renderer,
) -> Result<RenderedPage> {
    let document = Document::read(root, rel_path)?;
    let document_dir = root.join(rel_path.parent().unwrap_or_else(|| Path::new("")));

    let images = find_images(document.content(), &document_dir);
    info!(
        "Processing {} ({} images)",
        document.path().display(),
        images.len()
    );

    let title = document.title();
    let html = renderer
        .render(document.content(), &title)
        .with_context(|| format!("Failed to render {}", document.path().display()))?;
    let html = rewrite_image_sources(&html);

    let output = output_dir.join(document.html_path());
    let page_dir = output
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| output_dir.to_path_buf());
    fs::create_dir_all(&page_dir)
        .with_context(|| format!("Failed to create {}", page_dir.display()))?;

    // A page is only written once all of its images are in place.
    if !images.is_empty() {
        copy_images(&images, &page_dir)?;
    }
    fs::write(&output, html).with_context(|| format!("Failed to write {}", output.display()))?;

    Ok(RenderedPage {
        source: document.path().to_path_buf(),
        output,
        title,
        images,
    })
}

/// Converts every document, collecting per-document failures.
pub fn build_site(
    root: &Path,
    files: &[PathBuf],
    output_dir: &Path,
    renderer: &dyn Renderer,
) -> BuildSummary {
    let mut summary = BuildSummary {
        total: files.len(),
        ..Default::default()
    };

    for file in files {
        match convert_document(root, file, output_dir, renderer) {
            Ok(page) => {
                info!("  HTML file created: {}", page.output.display());
                summary.pages.push(page);
            }
            Err(e) => {
                warn!("Skipping {}: {:#}", file.display(), e);
                summary.failures.push(Failure {
                    path: file.clone(),
                    error: format!("{:#}", e),
                });
            }
        }
    }

    summary
}

/// Result of a complete run.
#[derive(Debug)]
pub struct RunReport {
    pub summary: BuildSummary,
    pub publish: Option<PublishOutcome>,
}

/// Runs discovery, conversion and (optionally) publishing.
///
/// # Errors
///
/// Returns error when no Markdown files exist, when no document converted
/// successfully, or when publishing fails. The publisher is never invoked
/// in the first two cases.
pub fn run(config: &Config, renderer: &dyn Renderer, publisher: Option<&dyn Publish>) -> Result<RunReport> {
    let output_dir = config.output_dir();
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let options = DiscoverOptions {
        reserved_prefix: Some(PathBuf::from(&config.branch)),
        output_dir: Some(config.output.clone()),
        extra_excludes: config.excludes.clone(),
    };
    let files = find_markdown_files(&config.root, &options)?;
    info!("Found {} markdown files", files.len());
    if files.is_empty() {
        bail!("No markdown files found in {}", config.root.display());
    }

    let summary = build_site(&config.root, &files, &output_dir, renderer);
    info!(
        "Converted {} of {} markdown files to HTML",
        summary.succeeded(),
        summary.total
    );
    if summary.succeeded() == 0 {
        bail!("None of the {} markdown files could be converted", summary.total);
    }

    let publish = match publisher {
        Some(publisher) => Some(
            publisher
                .publish(&output_dir)
                .context("Failed to publish docs branch")?,
        ),
        None => None,
    };

    Ok(RunReport { summary, publish })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderError;
    use clap::Parser;
    use std::cell::RefCell;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("Path should have parent"))
            .expect("Should create parent");
        fs::write(path, content).expect("Should write file");
    }

    fn config_for(root: &Path) -> Config {
        let root = root.to_str().expect("Temp path should be UTF8");
        Config::try_parse_from(["docbranch", root]).expect("Arguments should parse")
    }

    fn echo_renderer(md: &str, title: &str) -> Result<String, RenderError> {
        Ok(format!("<title>{}</title>\n{}", title, md))
    }

    #[derive(Default)]
    struct RecordingPublisher {
        calls: RefCell<Vec<PathBuf>>,
    }

    impl Publish for RecordingPublisher {
        fn publish(&self, site_dir: &Path) -> Result<PublishOutcome> {
            self.calls.borrow_mut().push(site_dir.to_path_buf());
            Ok(PublishOutcome::NoChanges)
        }
    }

    #[test]
    fn test_document_paths_and_title() {
        // Arrange
        let dir = TempDir::new().expect("Should create temp dir");
        write(dir.path(), "guide/setup.md", b"Intro\n# Setup Guide\n");

        // Act
        let doc = Document::read(dir.path(), "guide/setup.md").expect("Should read");

        // Assert
        assert_eq!(doc.title(), "Setup Guide");
        assert_eq!(doc.html_path(), PathBuf::from("guide/setup.html"));
    }

    #[test]
    fn test_convert_document_writes_page_and_images() {
        // Arrange
        let repo = TempDir::new().expect("Should create temp dir");
        let out = TempDir::new().expect("Should create temp dir");
        write(
            repo.path(),
            "guide/setup.md",
            b"# Setup\n\n![shot](shots/screen.png)\n",
        );
        write(repo.path(), "guide/shots/screen.png", b"png");
        write(repo.path(), "guide/extra.gif", b"gif");

        // Act
        let page = convert_document(
            repo.path(),
            Path::new("guide/setup.md"),
            out.path(),
            &|md: &str, _: &str| -> Result<String, RenderError> {
                Ok(md.replace("![shot](shots/screen.png)", "<img src=\"shots/screen.png\">"))
            },
        )
        .expect("Conversion should succeed");

        // Assert
        assert_eq!(page.output, out.path().join("guide/setup.html"));
        assert_eq!(page.title, "Setup");
        let html = fs::read_to_string(&page.output).expect("Should read page");
        assert!(html.contains("<img src=\"images/screen.png\">"), "{}", html);
        assert!(out.path().join("guide/images/screen.png").is_file());
        assert!(out.path().join("guide/images/extra.gif").is_file());
    }

    #[test]
    fn test_convert_document_keeps_nested_images_path() {
        // Arrange
        let repo = TempDir::new().expect("Should create temp dir");
        let out = TempDir::new().expect("Should create temp dir");
        write(repo.path(), "guide.md", b"![x](./images/sub/a.png)\n");
        write(repo.path(), "images/sub/a.png", b"png");

        // Act
        let page = convert_document(
            repo.path(),
            Path::new("guide.md"),
            out.path(),
            &|_: &str, _: &str| -> Result<String, RenderError> {
                Ok("<img src=\"./images/sub/a.png\">".to_string())
            },
        )
        .expect("Conversion should succeed");

        // Assert
        let html = fs::read_to_string(&page.output).expect("Should read page");
        assert!(html.contains("src=\"images/sub/a.png\""), "{}", html);
        assert!(out.path().join("images/sub/a.png").is_file());
    }

    #[test]
    fn test_failed_image_copy_leaves_no_page() {
        // Arrange
        let repo = TempDir::new().expect("Should create temp dir");
        let out = TempDir::new().expect("Should create temp dir");
        write(repo.path(), "guide/setup.md", b"# Setup\n\n![s](screen.png)\n");
        write(repo.path(), "guide/screen.png", b"png");
        // A file where the images directory should go makes the copy fail.
        write(out.path(), "guide/images", b"");

        // Act
        let result = convert_document(
            repo.path(),
            Path::new("guide/setup.md"),
            out.path(),
            &echo_renderer,
        );

        // Assert
        assert!(result.is_err(), "Image copy into a file should fail");
        assert!(
            !out.path().join("guide/setup.html").exists(),
            "Failed page must not reach the output"
        );
    }

    #[test]
    fn test_zero_markdown_files_never_publishes() {
        // Arrange
        let repo = TempDir::new().expect("Should create temp dir");
        write(repo.path(), "src/lib.rs", b"");
        let config = config_for(repo.path());
        let publisher = RecordingPublisher::default();

        // Act
        let result = run(&config, &echo_renderer, Some(&publisher));

        // Assert
        let err = result.expect_err("Empty repository should fail");
        assert!(format!("{:#}", err).contains("No markdown files"), "{:#}", err);
        assert!(publisher.calls.borrow().is_empty(), "Publisher must not run");
    }

    #[test]
    fn test_partial_success_still_publishes() {
        // Arrange
        let repo = TempDir::new().expect("Should create temp dir");
        write(repo.path(), "good.md", b"# Good\n");
        write(repo.path(), "bad.md", b"# Bad\n");
        let config = config_for(repo.path());
        let publisher = RecordingPublisher::default();
        let renderer = |md: &str, title: &str| -> Result<String, RenderError> {
            if title == "Bad" {
                Err(RenderError::Markdown("converter crashed".to_string()))
            } else {
                Ok(format!("<html>{}</html>", md))
            }
        };

        // Act
        let report = run(&config, &renderer, Some(&publisher)).expect("Run should succeed");

        // Assert
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.succeeded(), 1);
        assert_eq!(report.summary.failures.len(), 1);
        assert_eq!(report.summary.failures[0].path, PathBuf::from("bad.md"));
        assert!(report.summary.failures[0].error.contains("converter crashed"));
        assert_eq!(
            publisher.calls.borrow().as_slice(),
            &[config.output_dir()],
            "Publisher should run once with the output directory"
        );
        assert!(matches!(report.publish, Some(PublishOutcome::NoChanges)));
    }

    #[test]
    fn test_all_renders_failing_aborts_before_publish() {
        // Arrange
        let repo = TempDir::new().expect("Should create temp dir");
        write(repo.path(), "a.md", b"# A\n");
        let config = config_for(repo.path());
        let publisher = RecordingPublisher::default();
        let renderer = |_: &str, _: &str| -> Result<String, RenderError> {
            Err(RenderError::Markdown("nope".to_string()))
        };

        // Act
        let result = run(&config, &renderer, Some(&publisher));

        // Assert
        assert!(result.is_err(), "Zero successes should abort");
        assert!(publisher.calls.borrow().is_empty());
    }

    #[test]
    fn test_output_directory_not_rescanned() {
        // Arrange
        let repo = TempDir::new().expect("Should create temp dir");
        write(repo.path(), "README.md", b"# Readme\n");
        write(repo.path(), "html_output/old/notes.md", b"# Stale\n");
        write(repo.path(), "docs/published.md", b"# Published\n");
        let config = config_for(repo.path());

        // Act
        let report = run(&config, &echo_renderer, None).expect("Run should succeed");

        // Assert
        assert_eq!(report.summary.total, 1);
        assert_eq!(report.summary.pages[0].source, PathBuf::from("README.md"));
        assert!(report.publish.is_none());
        assert!(repo.path().join("html_output/README.html").is_file());
    }
}
